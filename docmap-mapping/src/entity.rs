//! Persistent entity metadata.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::descriptor::TypeDescriptor;
use crate::expression::{BeanExpression, ExpressionContext};
use crate::property::PersistentProperty;

/// Kind of an index derived from property metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Ascending single-field index.
    Ascending,
    /// Two-dimensional geospatial index.
    Geo2d {
        /// Lower coordinate bound.
        min: i32,
        /// Upper coordinate bound.
        max: i32,
        /// Geohash precision.
        bits: i32,
    },
}

/// An index the entity's collection should carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Collection the index belongs to.
    pub collection: String,
    /// Indexed document field.
    pub field: String,
    /// Index kind.
    pub kind: IndexKind,
    /// Reject duplicate values.
    pub unique: bool,
    /// Explicit index name.
    pub name: Option<String>,
}

/// How one mapped type maps to one collection.
///
/// Built once per type by the [`MappingContext`](crate::MappingContext) and
/// immutable afterwards, except for the expression context used to evaluate
/// an `@(bean).property` collection attribute.
pub struct PersistentEntity {
    descriptor: TypeDescriptor,
    collection: String,
    collection_expression: Option<&'static str>,
    properties: Vec<PersistentProperty>,
    id_index: Option<usize>,
    expression_context: RwLock<Option<Arc<dyn ExpressionContext>>>,
}

impl PersistentEntity {
    pub(crate) fn new(
        descriptor: TypeDescriptor,
        collection: String,
        collection_expression: Option<&'static str>,
        properties: Vec<PersistentProperty>,
        expression_context: Option<Arc<dyn ExpressionContext>>,
    ) -> Self {
        let id_index = properties.iter().position(PersistentProperty::is_id);
        Self {
            descriptor,
            collection,
            collection_expression,
            properties,
            id_index,
            expression_context: RwLock::new(expression_context),
        }
    }

    /// The source descriptor.
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Fully qualified type name.
    pub fn type_name(&self) -> &'static str {
        self.descriptor.type_name()
    }

    /// Simple type name.
    pub fn name(&self) -> &'static str {
        self.descriptor.name()
    }

    /// The collection documents of this entity live in.
    ///
    /// An expression attribute is evaluated on every call so that a context
    /// attached after construction takes effect; if it cannot be evaluated
    /// the naming-strategy fallback is returned.
    pub fn collection(&self) -> String {
        if let Some(source) = self.collection_expression {
            if let Some(expr) = BeanExpression::parse(source) {
                let resolved = self
                    .expression_context
                    .read()
                    .as_ref()
                    .and_then(|ctx| expr.evaluate(ctx.as_ref()));
                match resolved {
                    Some(name) => return name,
                    None => warn!(
                        entity = %self.name(),
                        expression = %source,
                        fallback = %self.collection,
                        "collection expression could not be evaluated"
                    ),
                }
            }
        }
        self.collection.clone()
    }

    /// The raw collection expression, if the attribute was one.
    pub fn collection_expression(&self) -> Option<&'static str> {
        self.collection_expression
    }

    /// Attach the context used to evaluate the collection expression.
    pub fn set_expression_context(&self, context: Arc<dyn ExpressionContext>) {
        *self.expression_context.write() = Some(context);
    }

    /// Properties sorted by (order, declaration index).
    pub fn properties(&self) -> &[PersistentProperty] {
        &self.properties
    }

    /// The identity property, if any.
    pub fn id_property(&self) -> Option<&PersistentProperty> {
        self.id_index.map(|i| &self.properties[i])
    }

    /// Whether the entity has an identity property.
    pub fn has_id_property(&self) -> bool {
        self.id_index.is_some()
    }

    /// Look up a property by member name.
    pub fn property(&self, name: &str) -> Option<&PersistentProperty> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Look up a property by document field name.
    pub fn property_for_field(&self, field_name: &str) -> Option<&PersistentProperty> {
        self.properties.iter().find(|p| p.field_name() == field_name)
    }

    /// Resolved field names in property order.
    pub fn field_names(&self) -> Vec<&str> {
        self.properties.iter().map(PersistentProperty::field_name).collect()
    }

    /// Whether the type or one of its flattened bases carries the marker.
    pub fn has_marker(&self, marker: &str) -> bool {
        has_marker_inherited(&self.descriptor, marker)
    }

    /// Indexes declared through property metadata.
    pub fn index_definitions(&self) -> Vec<IndexDefinition> {
        let collection = self.collection();
        let mut definitions = Vec::new();

        for property in &self.properties {
            if let Some(spec) = property.index_spec() {
                definitions.push(IndexDefinition {
                    collection: collection.clone(),
                    field: property.field_name().to_string(),
                    kind: IndexKind::Ascending,
                    unique: spec.unique,
                    name: spec.name.map(String::from),
                });
            }
            if let Some(spec) = property.geo_index_spec() {
                definitions.push(IndexDefinition {
                    collection: collection.clone(),
                    field: property.field_name().to_string(),
                    kind: IndexKind::Geo2d {
                        min: spec.min,
                        max: spec.max,
                        bits: spec.bits,
                    },
                    unique: false,
                    name: spec.name.map(String::from),
                });
            }
        }

        definitions
    }
}

impl fmt::Debug for PersistentEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentEntity")
            .field("type_name", &self.type_name())
            .field("collection", &self.collection)
            .field("collection_expression", &self.collection_expression)
            .field("properties", &self.properties)
            .field("id_index", &self.id_index)
            .finish_non_exhaustive()
    }
}

/// Check a marker on a descriptor and, transitively, its flattened bases.
pub(crate) fn has_marker_inherited(descriptor: &TypeDescriptor, marker: &str) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![descriptor.clone()];

    while let Some(current) = stack.pop() {
        if !visited.insert(current.type_id()) {
            continue;
        }
        if current.has_marker(marker) {
            return true;
        }
        stack.extend(current.bases());
    }

    false
}
