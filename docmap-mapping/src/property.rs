//! Persistent property metadata.

use crate::descriptor::{DescriptorFn, FieldDescriptor, GeoIndexSpec, IndexSpec, TypeDescriptor};

/// Order assigned to properties that declare none; they sort last.
pub const UNORDERED: i32 = i32::MAX;

/// How one member of a persistent entity maps to one document field.
#[derive(Debug, Clone)]
pub struct PersistentProperty {
    name: &'static str,
    type_name: &'static str,
    owner: &'static str,
    field_name: String,
    explicit_field_name: bool,
    order: i32,
    declaration_index: usize,
    id: bool,
    explicit_id: bool,
    reference: bool,
    embedded: bool,
    requires_accessor: bool,
    index: Option<IndexSpec>,
    geo_index: Option<GeoIndexSpec>,
    target: Option<DescriptorFn>,
}

impl PersistentProperty {
    pub(crate) fn from_field(
        field: &FieldDescriptor,
        owner: &'static str,
        declaration_index: usize,
        inherited: bool,
    ) -> Self {
        Self {
            name: field.name(),
            type_name: field.type_name(),
            owner,
            field_name: field.explicit_field_name().unwrap_or_default().to_string(),
            explicit_field_name: field.explicit_field_name().is_some(),
            order: field.explicit_order().unwrap_or(UNORDERED),
            declaration_index,
            id: field.is_id(),
            explicit_id: field.is_id(),
            reference: field.is_reference(),
            embedded: field.is_embedded(),
            requires_accessor: inherited,
            index: field.index_spec(),
            geo_index: field.geo_index_spec(),
            target: field.target_fn(),
        }
    }

    pub(crate) fn set_field_name(&mut self, field_name: String) {
        self.field_name = field_name;
    }

    pub(crate) fn mark_id(&mut self) {
        self.id = true;
    }

    /// Member name as declared.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared type as written in source.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Name of the type that declares the member.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// Resolved document field name.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Whether the field name was set explicitly.
    pub fn has_explicit_field_name(&self) -> bool {
        self.explicit_field_name
    }

    /// Resolved order; [`UNORDERED`] when none was declared.
    pub fn order(&self) -> i32 {
        self.order
    }

    /// Whether an explicit order was declared.
    pub fn is_ordered(&self) -> bool {
        self.order != UNORDERED
    }

    /// Position among the entity's members in declaration order.
    pub fn declaration_index(&self) -> usize {
        self.declaration_index
    }

    /// Whether this is the entity's identity property.
    pub fn is_id(&self) -> bool {
        self.id
    }

    /// Whether the member carries the explicit id marker.
    pub fn is_explicit_id(&self) -> bool {
        self.explicit_id
    }

    /// Whether the member is a document reference.
    pub fn is_reference(&self) -> bool {
        self.reference
    }

    /// Whether the member is an embedded document.
    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    /// Whether access goes through an accessor instead of direct field access.
    ///
    /// True for members inlined from a flattened base type.
    pub fn requires_accessor(&self) -> bool {
        self.requires_accessor
    }

    /// Whether the member holds another mapped type.
    pub fn is_entity(&self) -> bool {
        self.target.is_some()
    }

    /// Index options.
    pub fn index_spec(&self) -> Option<IndexSpec> {
        self.index
    }

    /// Geospatial index options.
    pub fn geo_index_spec(&self) -> Option<GeoIndexSpec> {
        self.geo_index
    }

    /// Descriptor of the held mapped type.
    pub fn target_descriptor(&self) -> Option<TypeDescriptor> {
        self.target.map(|target| target())
    }
}
