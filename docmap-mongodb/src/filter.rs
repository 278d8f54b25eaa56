//! Filter document building.

use std::sync::Arc;

use bson::{Bson, Document, doc, oid::ObjectId};
use docmap_mapping::{ID_FIELD, PersistentEntity};

use crate::geo::{Distance, Point, Shape};

/// Builder for MongoDB filter documents.
///
/// When bound to a [`PersistentEntity`], keys are member names and are
/// translated to their mapped document field names; unknown names and
/// dotted paths pass through unchanged.
///
/// # Example
///
/// ```rust,ignore
/// use docmap_mongodb::FilterBuilder;
///
/// let filter = FilterBuilder::for_entity(person_entity)
///     .eq("first_name", "Ada")
///     .gte("age", 18)
///     .build();
///
/// // Produces: { "fn": "Ada", "age": { "$gte": 18 } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    doc: Document,
    entity: Option<Arc<PersistentEntity>>,
}

impl FilterBuilder {
    /// Create a new empty filter builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder translating member names through `entity`.
    pub fn for_entity(entity: Arc<PersistentEntity>) -> Self {
        Self {
            doc: Document::new(),
            entity: Some(entity),
        }
    }

    /// Create a filter builder from an existing document.
    pub fn from_doc(doc: Document) -> Self {
        Self { doc, entity: None }
    }

    /// Resolve a member name to its document field name.
    pub fn field_name(&self, name: &str) -> String {
        self.entity
            .as_ref()
            .and_then(|entity| entity.property(name))
            .map(|property| property.field_name().to_string())
            .unwrap_or_else(|| name.to_string())
    }

    fn condition(mut self, field: &str, value: impl Into<Bson>) -> Self {
        let key = self.field_name(field);
        self.doc.insert(key, value.into());
        self
    }

    /// Add an equality condition.
    pub fn eq(self, field: &str, value: impl Into<Bson>) -> Self {
        self.condition(field, value)
    }

    /// Add a not-equal condition.
    pub fn ne(self, field: &str, value: impl Into<Bson>) -> Self {
        self.condition(field, doc! { "$ne": value.into() })
    }

    /// Add a greater-than condition.
    pub fn gt(self, field: &str, value: impl Into<Bson>) -> Self {
        self.condition(field, doc! { "$gt": value.into() })
    }

    /// Add a greater-than-or-equal condition.
    pub fn gte(self, field: &str, value: impl Into<Bson>) -> Self {
        self.condition(field, doc! { "$gte": value.into() })
    }

    /// Add a less-than condition.
    pub fn lt(self, field: &str, value: impl Into<Bson>) -> Self {
        self.condition(field, doc! { "$lt": value.into() })
    }

    /// Add a less-than-or-equal condition.
    pub fn lte(self, field: &str, value: impl Into<Bson>) -> Self {
        self.condition(field, doc! { "$lte": value.into() })
    }

    /// Add an "in" condition (value in array).
    pub fn in_array(self, field: &str, values: Vec<impl Into<Bson>>) -> Self {
        let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
        self.condition(field, doc! { "$in": values })
    }

    /// Add a "not in" condition.
    pub fn not_in(self, field: &str, values: Vec<impl Into<Bson>>) -> Self {
        let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
        self.condition(field, doc! { "$nin": values })
    }

    /// Add a regex condition.
    pub fn regex(self, field: &str, pattern: &str) -> Self {
        self.condition(field, doc! { "$regex": pattern })
    }

    /// Add an exists condition.
    pub fn exists(self, field: &str, exists: bool) -> Self {
        self.condition(field, doc! { "$exists": exists })
    }

    /// Match the identity field.
    pub fn by_id(mut self, id: impl Into<Bson>) -> Self {
        self.doc.insert(ID_FIELD, id.into());
        self
    }

    /// Combine with AND ($and).
    pub fn and(mut self, conditions: Vec<Document>) -> Self {
        self.doc.insert("$and", conditions);
        self
    }

    /// Combine with OR ($or).
    pub fn or(mut self, conditions: Vec<Document>) -> Self {
        self.doc.insert("$or", conditions);
        self
    }

    /// Match documents whose location lies within a shape (`$geoWithin`).
    pub fn within(self, field: &str, shape: &dyn Shape) -> Self {
        self.condition(field, doc! { "$geoWithin": shape.as_document() })
    }

    /// Sort by planar distance from a point, optionally bounded.
    pub fn near(self, field: &str, point: Point, max_distance: Option<Distance>) -> Self {
        self.condition(field, near_condition("$near", point, max_distance))
    }

    /// Sort by spherical distance from a point, optionally bounded.
    pub fn near_sphere(self, field: &str, point: Point, max_distance: Option<Distance>) -> Self {
        self.condition(field, near_condition("$nearSphere", point, max_distance))
    }

    /// Merge another filter into this one.
    pub fn merge(mut self, other: Document) -> Self {
        for (k, v) in other {
            self.doc.insert(k, v);
        }
        self
    }

    /// Build the filter document.
    pub fn build(self) -> Document {
        self.doc
    }

    /// Check if the filter is empty.
    pub fn is_empty(&self) -> bool {
        self.doc.is_empty()
    }
}

fn near_condition(operator: &str, point: Point, max_distance: Option<Distance>) -> Document {
    let mut condition = Document::new();
    condition.insert(operator, point.as_bson());
    if let Some(max) = max_distance {
        condition.insert("$maxDistance", max.normalized_value());
    }
    condition
}

/// Create an _id filter.
pub fn by_id(id: ObjectId) -> Document {
    doc! { ID_FIELD: id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Circle, Metric, Metrics};
    use docmap_mapping::{FieldDescriptor, MappedType, MappingContext, TypeDescriptor};
    use pretty_assertions::assert_eq;

    struct Person;

    impl MappedType for Person {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<Person>("Person")
                .with_field(FieldDescriptor::new("key", "ObjectId").id())
                .with_field(FieldDescriptor::new("first_name", "String").field_name("fn"))
                .with_field(FieldDescriptor::new("age", "u32"))
        }
    }

    #[test]
    fn test_filter_builder_eq() {
        let filter = FilterBuilder::new()
            .eq("name", "Alice")
            .eq("age", 30)
            .build();

        assert_eq!(filter, doc! { "name": "Alice", "age": 30 });
    }

    #[test]
    fn test_comparison_replaces_same_field() {
        let filter = FilterBuilder::new().gte("age", 18).lt("age", 65).build();

        let age = filter.get_document("age").unwrap();
        assert!(age.contains_key("$lt"));
        assert!(!age.contains_key("$gte"));
    }

    #[test]
    fn test_entity_translates_member_names() {
        let context = MappingContext::new();
        let entity = context.get_persistent_entity::<Person>().unwrap().unwrap();

        let filter = FilterBuilder::for_entity(entity)
            .eq("first_name", "Ada")
            .gte("age", 18)
            .eq("address.city", "London")
            .build();

        assert_eq!(
            filter,
            doc! { "fn": "Ada", "age": { "$gte": 18 }, "address.city": "London" }
        );
    }

    #[test]
    fn test_entity_id_member_maps_to_id_field() {
        let context = MappingContext::new();
        let entity = context.get_persistent_entity::<Person>().unwrap().unwrap();
        let builder = FilterBuilder::for_entity(entity);
        assert_eq!(builder.field_name("key"), "_id");
    }

    #[test]
    fn test_in_array_and_or() {
        let filter = FilterBuilder::new()
            .in_array("status", vec!["active", "pending"])
            .or(vec![doc! { "priority": "high" }, doc! { "flagged": true }])
            .build();

        assert!(filter.get_document("status").unwrap().contains_key("$in"));
        assert!(filter.contains_key("$or"));
    }

    #[test]
    fn test_by_id() {
        let oid = ObjectId::new();
        assert_eq!(FilterBuilder::new().by_id(oid).build(), by_id(oid));
    }

    #[test]
    fn test_within_shape() {
        let circle = Circle::new(Point::new(1.0, 2.0), 5.0).unwrap();
        let filter = FilterBuilder::new().within("location", &circle).build();

        assert_eq!(
            filter,
            doc! { "location": { "$geoWithin": { "$center": [[1.0, 2.0], 5.0] } } }
        );
    }

    #[test]
    fn test_near_uses_normalized_distance() {
        let max = Distance::new(Metrics::Kilometers.multiplier() * 2.0, Metrics::Kilometers);
        let filter = FilterBuilder::new()
            .near_sphere("location", Point::new(-73.9, 40.7), Some(max))
            .build();

        let location = filter.get_document("location").unwrap();
        assert!(location.contains_key("$nearSphere"));
        let normalized = location.get_f64("$maxDistance").unwrap();
        assert!((normalized - 2.0).abs() < 1e-9);

        let filter = FilterBuilder::new()
            .near("location", Point::new(0.0, 0.0), None)
            .build();
        assert_eq!(filter, doc! { "location": { "$near": [0.0, 0.0] } });
    }
}
