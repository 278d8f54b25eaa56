//! Integration tests for derived mapping metadata.
//!
//! These tests drive `#[derive(Document)]` end to end through the mapping
//! context: field names, ordering, identity resolution, validation,
//! flattened bases, collection naming, warm-up and type filters.

#![allow(dead_code)]

use std::sync::Arc;

use bson::oid::ObjectId;
use docmap::Document;
use docmap::mapping::{
    AssignableTypeFilter, AttributeTypeFilter, BeanRegistry, FieldNaming, IndexKind, MappedType,
    MappingContext, MappingError, NamePatternTypeFilter, TypeFilter, TypeRegistry, UNORDERED,
};
use pretty_assertions::assert_eq;

#[derive(Document)]
#[docmap(collection = "people", implements = "Contact")]
struct Person {
    #[docmap(id)]
    key: ObjectId,
    #[docmap(field = "fn", order = 0)]
    first_name: String,
    #[docmap(order = 1)]
    last_name: String,
    nickname: Option<String>,
    #[docmap(reference)]
    manager: Option<Box<Person>>,
    #[docmap(transient)]
    score: f64,
}

#[derive(Document)]
struct Tag {
    id: String,
    label: String,
}

#[derive(Document)]
struct Note {
    text: String,
}

#[derive(Document)]
#[docmap(marker = "Auditable")]
struct Timestamps {
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

#[derive(Document)]
struct Order {
    #[docmap(id)]
    id: ObjectId,
    total: f64,
    #[docmap(flatten)]
    stamps: Timestamps,
}

#[derive(Document)]
struct Audited {
    #[docmap(id)]
    audit_id: String,
}

#[derive(Document)]
struct Invoice {
    #[docmap(id)]
    number: String,
    #[docmap(flatten)]
    audit: Audited,
}

#[derive(Document)]
struct Ranked {
    #[docmap(order = -1)]
    rank: i32,
}

#[derive(Document)]
#[docmap(collection = "@(settings).auditCollection")]
struct AuditEntry {
    id: String,
}

#[derive(Document)]
struct Node {
    id: ObjectId,
    #[docmap(embedded)]
    children: Vec<Node>,
    #[docmap(reference)]
    parent: Option<Box<Node>>,
    #[docmap(embedded)]
    tags: Vec<Tag>,
}

#[derive(Document)]
struct Place {
    #[docmap(id)]
    id: ObjectId,
    #[docmap(unique)]
    code: String,
    #[docmap(indexed(name = "by_name"))]
    name: String,
    #[docmap(geo_index(min = -90, max = 90, bits = 32))]
    location: [f64; 2],
}

#[derive(Document)]
struct Warehouse {
    code: String,
}

#[derive(Document)]
struct Shipment {
    id: ObjectId,
    origin: Warehouse,
}

#[derive(Document)]
struct Delivery {
    id: ObjectId,
    #[docmap(embedded)]
    origin: Warehouse,
}

#[test]
fn test_field_names_and_order() {
    let context = MappingContext::new();
    let entity = context.get_persistent_entity::<Person>().unwrap().unwrap();

    assert_eq!(entity.collection(), "people");
    assert_eq!(
        entity.field_names(),
        vec!["fn", "last_name", "_id", "nickname", "manager"]
    );
    assert!(entity.property("score").is_none());

    let nickname = entity.property("nickname").unwrap();
    assert_eq!(nickname.order(), UNORDERED);
    assert!(!nickname.is_ordered());
}

#[test]
fn test_explicit_id() {
    let context = MappingContext::new();
    let entity = context.get_persistent_entity::<Person>().unwrap().unwrap();

    let id = entity.id_property().unwrap();
    assert_eq!(id.name(), "key");
    assert!(id.is_explicit_id());
    assert_eq!(id.field_name(), "_id");
}

#[test]
fn test_fallback_id_and_default_collection() {
    let context = MappingContext::new();

    let tag = context.get_persistent_entity::<Tag>().unwrap().unwrap();
    assert_eq!(tag.collection(), "tag");
    assert_eq!(tag.id_property().unwrap().name(), "id");
    assert!(!tag.id_property().unwrap().is_explicit_id());

    let note = context.get_persistent_entity::<Note>().unwrap().unwrap();
    assert!(!note.has_id_property());
}

#[test]
fn test_reference_property() {
    let context = MappingContext::new();
    let entity = context.get_persistent_entity::<Person>().unwrap().unwrap();

    let manager = entity.property("manager").unwrap();
    assert!(manager.is_reference());
    assert_eq!(manager.target_descriptor().unwrap().name(), "Person");
}

#[test]
fn test_multiple_ids_through_flatten_fail() {
    let context = MappingContext::new();
    let err = context.get_persistent_entity::<Invoice>().unwrap_err();

    assert_eq!(
        err,
        MappingError::MultipleIds {
            type_name: "Invoice".into(),
            first: "number".into(),
            second: "audit_id".into(),
        }
    );
    assert!(!context.has_persistent_entity::<Invoice>());
}

#[test]
fn test_negative_order_fails() {
    let context = MappingContext::new();
    let err = context.get_persistent_entity::<Ranked>().unwrap_err();
    assert!(matches!(err, MappingError::NegativeOrder { order: -1, .. }));
}

#[test]
fn test_flattened_base_properties() {
    let context = MappingContext::new();
    let entity = context.get_persistent_entity::<Order>().unwrap().unwrap();

    assert_eq!(
        entity.field_names(),
        vec!["_id", "total", "created_at", "updated_at"]
    );
    assert!(entity.property("created_at").unwrap().requires_accessor());
    assert!(!entity.property("total").unwrap().requires_accessor());
    assert!(entity.has_marker("Auditable"));
}

#[test]
fn test_simple_types_have_no_entity() {
    let context = MappingContext::new();
    assert!(context.get_persistent_entity::<String>().unwrap().is_none());
    assert!(context.get_persistent_entity::<ObjectId>().unwrap().is_none());
    assert!(context.get_persistent_entity::<bson::Document>().unwrap().is_none());
}

#[test]
fn test_extra_simple_type() {
    let context = MappingContext::builder().simple_type::<Note>().build();
    assert!(context.get_persistent_entity::<Note>().unwrap().is_none());
}

#[test]
fn test_field_naming_strategy() {
    let context = MappingContext::builder()
        .field_naming(FieldNaming::CamelCase)
        .build();
    let entity = context.get_persistent_entity::<Person>().unwrap().unwrap();

    assert_eq!(entity.property("last_name").unwrap().field_name(), "lastName");
    assert_eq!(entity.property("first_name").unwrap().field_name(), "fn");
    assert_eq!(entity.property("key").unwrap().field_name(), "_id");
}

#[test]
fn test_collection_naming_callback() {
    let context = MappingContext::builder()
        .collection_naming(|descriptor| format!("tbl_{}", descriptor.name().to_lowercase()))
        .build();

    let tag = context.get_persistent_entity::<Tag>().unwrap().unwrap();
    assert_eq!(tag.collection(), "tbl_tag");

    let person = context.get_persistent_entity::<Person>().unwrap().unwrap();
    assert_eq!(person.collection(), "people");
}

#[test]
fn test_collection_expression() {
    let context = MappingContext::new();
    let entity = context.get_persistent_entity::<AuditEntry>().unwrap().unwrap();

    assert_eq!(entity.collection_expression(), Some("@(settings).auditCollection"));
    assert_eq!(entity.collection(), "auditEntry");

    context.set_expression_context(Arc::new(
        BeanRegistry::new().with_property("settings", "auditCollection", "audit_2024"),
    ));
    assert_eq!(entity.collection(), "audit_2024");
}

#[test]
fn test_warm_up_with_self_references() {
    let context = MappingContext::builder()
        .initial_entity::<Person>()
        .initial_entity::<Node>()
        .build();

    // Person, Node and Tag (reached through Node::tags).
    assert_eq!(context.initialize().unwrap(), 3);
    assert!(context.has_persistent_entity::<Tag>());
    assert_eq!(context.persistent_entities().len(), 3);

    // A second run only hits the cache.
    assert_eq!(context.initialize().unwrap(), 3);
    assert_eq!(context.persistent_entities().len(), 3);
}

#[test]
fn test_warm_up_follows_only_linked_fields() {
    let plain = MappingContext::builder().initial_entity::<Shipment>().build();
    assert_eq!(plain.initialize().unwrap(), 1);
    assert!(!plain.has_persistent_entity::<Warehouse>());
    let shipment = plain.get_persistent_entity::<Shipment>().unwrap().unwrap();
    assert!(shipment.property("origin").unwrap().target_descriptor().is_none());

    let embedded = MappingContext::builder().initial_entity::<Delivery>().build();
    assert_eq!(embedded.initialize().unwrap(), 2);
    assert!(embedded.has_persistent_entity::<Warehouse>());
}

#[test]
fn test_concurrent_lookups_share_one_entity() {
    let context = MappingContext::new();

    let entities: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| context.get_persistent_entity::<Person>().unwrap().unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(entities.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn test_index_definitions() {
    let context = MappingContext::new();
    let entity = context.get_persistent_entity::<Place>().unwrap().unwrap();
    let definitions = entity.index_definitions();

    assert_eq!(definitions.len(), 3);
    assert!(definitions.iter().all(|d| d.collection == "place"));

    assert_eq!(definitions[0].field, "code");
    assert_eq!(definitions[0].kind, IndexKind::Ascending);
    assert!(definitions[0].unique);

    assert_eq!(definitions[1].name.as_deref(), Some("by_name"));
    assert!(!definitions[1].unique);

    assert_eq!(
        definitions[2].kind,
        IndexKind::Geo2d {
            min: -90,
            max: 90,
            bits: 32
        }
    );
}

#[test]
fn test_type_filters() {
    let mut registry = TypeRegistry::new();
    registry
        .register::<Person>()
        .register::<Order>()
        .register::<Timestamps>()
        .register::<Tag>()
        .register::<String>();

    let contacts = AssignableTypeFilter::new("Contact", &registry);
    let auditable = AttributeTypeFilter::new("Auditable", &registry);
    let orders = NamePatternTypeFilter::new(".*::Order");

    let names = |filter: &dyn TypeFilter| -> Vec<&str> {
        registry
            .scan(&[filter], &[])
            .into_iter()
            .map(|d| d.name())
            .collect()
    };

    assert_eq!(names(&contacts), vec!["Person"]);
    assert_eq!(names(&auditable), vec!["Order", "Timestamps"]);
    assert_eq!(names(&orders), vec!["Order"]);

    let direct = AttributeTypeFilter::new("Auditable", &registry).direct_only();
    assert_eq!(names(&direct), vec!["Timestamps"]);

    let base = AssignableTypeFilter::for_type::<Timestamps>();
    assert_eq!(names(&base), vec!["Order", "Timestamps"]);
}

#[test]
fn test_unresolvable_filters_match_nothing() {
    let mut registry = TypeRegistry::new();
    registry.register::<Person>();

    let unknown = AttributeTypeFilter::new("Missing", &registry);
    assert!(unknown.error().is_some());
    assert!(!unknown.matches(&Person::descriptor()));

    let bad_pattern = NamePatternTypeFilter::new("(unclosed");
    assert!(bad_pattern.error().is_some());
    assert!(!bad_pattern.matches(&Person::descriptor()));
}
