//! The mapping context: per-type persistent entity construction and caching.
//!
//! # Example
//!
//! ```rust
//! use docmap_mapping::{FieldDescriptor, MappedType, MappingContext, TypeDescriptor};
//!
//! struct Person;
//!
//! impl MappedType for Person {
//!     fn descriptor() -> TypeDescriptor {
//!         TypeDescriptor::of::<Person>("Person")
//!             .with_field(FieldDescriptor::new("name", "String"))
//!             .with_field(FieldDescriptor::new("id", "ObjectId"))
//!     }
//! }
//!
//! let context = MappingContext::new();
//! let entity = context.get_persistent_entity::<Person>().unwrap().unwrap();
//! assert_eq!(entity.collection(), "person");
//! assert_eq!(entity.id_property().unwrap().field_name(), "_id");
//!
//! // Simple types are never entities.
//! assert!(context.get_persistent_entity::<String>().unwrap().is_none());
//! ```

use std::any::TypeId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::descriptor::{DescriptorFn, MappedType, TypeDescriptor};
use crate::entity::PersistentEntity;
use crate::error::{MappingError, MappingResult};
use crate::expression::{BeanExpression, ExpressionContext};
use crate::naming::{CollectionNaming, FieldNaming, ID_FIELD, uncapitalize};
use crate::property::PersistentProperty;

/// Member names accepted as the identity when no explicit marker exists.
const FALLBACK_ID_NAMES: &[&str] = &["id", "_id"];

/// Outcome of building a type's entity; failures are kept so each type is validated once.
type EntityCell = Arc<OnceCell<MappingResult<Arc<PersistentEntity>>>>;

/// Fully qualified names of additional types treated as simple.
#[derive(Debug, Clone, Default)]
pub struct SimpleTypeHolder {
    names: HashSet<String>,
}

impl SimpleTypeHolder {
    /// Create a holder with no extra types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type as simple.
    pub fn register<T: 'static>(&mut self) {
        self.names.insert(std::any::type_name::<T>().to_string());
    }

    /// Register a fully qualified type name as simple.
    pub fn register_name(&mut self, type_name: impl Into<String>) {
        self.names.insert(type_name.into());
    }

    /// Whether the descriptor describes a simple type.
    pub fn is_simple(&self, descriptor: &TypeDescriptor) -> bool {
        descriptor.is_simple() || self.names.contains(descriptor.type_name())
    }
}

/// Builds and caches one [`PersistentEntity`] per mapped type.
///
/// Concurrent first lookups of the same type are serialized so that each
/// type is built and validated at most once. A failed build is cached too:
/// later lookups return the same error without rebuilding.
pub struct MappingContext {
    entities: RwLock<HashMap<TypeId, EntityCell>>,
    initial_entities: Mutex<Vec<DescriptorFn>>,
    simple_types: SimpleTypeHolder,
    field_naming: FieldNaming,
    collection_naming: Option<CollectionNaming>,
    expression_context: RwLock<Option<Arc<dyn ExpressionContext>>>,
}

impl Default for MappingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingContext {
    /// Create a context with default settings.
    pub fn new() -> Self {
        MappingContextBuilder::new().build()
    }

    /// Create a builder for the context.
    pub fn builder() -> MappingContextBuilder {
        MappingContextBuilder::new()
    }

    /// Get the entity for `T`, building it on first request.
    ///
    /// Returns `Ok(None)` for simple types.
    pub fn get_persistent_entity<T: MappedType>(
        &self,
    ) -> MappingResult<Option<Arc<PersistentEntity>>> {
        if let Some(outcome) = self.outcome(TypeId::of::<T>()) {
            return outcome.map(Some);
        }
        self.persistent_entity_for(T::descriptor())
    }

    /// Get the entity for a descriptor, building it on first request.
    pub fn persistent_entity_for(
        &self,
        descriptor: TypeDescriptor,
    ) -> MappingResult<Option<Arc<PersistentEntity>>> {
        if self.simple_types.is_simple(&descriptor) {
            trace!(type_name = %descriptor.type_name(), "simple type has no entity");
            return Ok(None);
        }

        let cell = self.cell(descriptor.type_id());
        cell.get_or_init(|| self.build_entity(descriptor).map(Arc::new))
            .clone()
            .map(Some)
    }

    /// Whether the entity for `T` has been built.
    pub fn has_persistent_entity<T: MappedType>(&self) -> bool {
        self.cached(TypeId::of::<T>()).is_some()
    }

    /// All entities built so far.
    pub fn persistent_entities(&self) -> Vec<Arc<PersistentEntity>> {
        self.entities
            .read()
            .values()
            .filter_map(|cell| cell.get()?.as_ref().ok().cloned())
            .collect()
    }

    /// Replace the set of types warmed up by [`initialize`](Self::initialize).
    pub fn set_initial_entity_set(&self, types: impl IntoIterator<Item = DescriptorFn>) {
        *self.initial_entities.lock() = types.into_iter().collect();
    }

    /// Add a type to the warm-up set.
    pub fn add_initial_entity<T: MappedType>(&self) {
        self.initial_entities.lock().push(T::descriptor);
    }

    /// Eagerly build the entities of the warm-up set and of every mapped
    /// type reachable from their properties.
    ///
    /// Types are visited breadth-first and at most once, so types that refer
    /// to themselves (directly or through each other) terminate.
    /// Returns the number of entities visited.
    pub fn initialize(&self) -> MappingResult<usize> {
        let initial: Vec<DescriptorFn> = self.initial_entities.lock().clone();
        let mut queue: VecDeque<TypeDescriptor> = initial.iter().map(|f| f()).collect();
        let mut visited = HashSet::new();
        let mut built = 0;

        while let Some(descriptor) = queue.pop_front() {
            if !visited.insert(descriptor.type_id()) {
                trace!(type_name = %descriptor.type_name(), "type already visited");
                continue;
            }

            let Some(entity) = self.persistent_entity_for(descriptor)? else {
                continue;
            };
            built += 1;

            for property in entity.properties() {
                if let Some(nested) = property.target_descriptor() {
                    if visited.contains(&nested.type_id()) {
                        trace!(
                            entity = %entity.name(),
                            property = %property.name(),
                            "self-referencing property, not descending"
                        );
                    } else {
                        queue.push_back(nested);
                    }
                }
            }
        }

        debug!(entities = built, "mapping context initialized");
        Ok(built)
    }

    /// Attach an expression context to this context and all cached entities.
    pub fn set_expression_context(&self, context: Arc<dyn ExpressionContext>) {
        for entity in self.persistent_entities() {
            entity.set_expression_context(Arc::clone(&context));
        }
        *self.expression_context.write() = Some(context);
    }

    /// The configured field naming strategy.
    pub fn field_naming(&self) -> FieldNaming {
        self.field_naming
    }

    /// The simple type registry.
    pub fn simple_types(&self) -> &SimpleTypeHolder {
        &self.simple_types
    }

    fn cached(&self, type_id: TypeId) -> Option<Arc<PersistentEntity>> {
        self.outcome(type_id)?.ok()
    }

    fn outcome(&self, type_id: TypeId) -> Option<MappingResult<Arc<PersistentEntity>>> {
        self.entities
            .read()
            .get(&type_id)
            .and_then(|cell| cell.get().cloned())
    }

    fn cell(&self, type_id: TypeId) -> EntityCell {
        if let Some(cell) = self.entities.read().get(&type_id) {
            return Arc::clone(cell);
        }
        Arc::clone(self.entities.write().entry(type_id).or_default())
    }

    fn build_entity(&self, descriptor: TypeDescriptor) -> MappingResult<PersistentEntity> {
        debug!(type_name = %descriptor.type_name(), "building persistent entity");

        let mut properties = Vec::new();
        let mut visited = HashSet::from([descriptor.type_id()]);
        collect_properties(&descriptor, false, &mut visited, &mut properties)?;

        resolve_id(&descriptor, &mut properties)?;

        for property in &mut properties {
            if !property.has_explicit_field_name() {
                let field_name = if property.is_id() {
                    ID_FIELD.to_string()
                } else {
                    self.field_naming.field_name(property.name())
                };
                property.set_field_name(field_name);
            }
        }

        properties.sort_by_key(|p| (p.order(), p.declaration_index()));

        let fallback = match &self.collection_naming {
            Some(naming) => naming(&descriptor),
            None => uncapitalize(descriptor.name()),
        };
        let (collection, expression) = match descriptor.collection() {
            Some(attr) if BeanExpression::parse(attr).is_some() => (fallback, Some(attr)),
            Some(attr) => (attr.to_string(), None),
            None => (fallback, None),
        };

        Ok(PersistentEntity::new(
            descriptor,
            collection,
            expression,
            properties,
            self.expression_context.read().clone(),
        ))
    }
}

/// Collect properties in declaration order, inlining flattened bases.
fn collect_properties(
    descriptor: &TypeDescriptor,
    inherited: bool,
    visited: &mut HashSet<TypeId>,
    properties: &mut Vec<PersistentProperty>,
) -> MappingResult<()> {
    for field in descriptor.fields() {
        if field.is_flatten() {
            if let Some(target) = field.target_fn() {
                let base = target();
                if visited.insert(base.type_id()) {
                    collect_properties(&base, true, visited, properties)?;
                } else {
                    trace!(base = %base.type_name(), "flattened base already inlined");
                }
                continue;
            }
        }

        if let Some(order) = field.explicit_order() {
            if order < 0 {
                return Err(MappingError::negative_order(
                    descriptor.name(),
                    field.name(),
                    order,
                ));
            }
        }

        let index = properties.len();
        properties.push(PersistentProperty::from_field(
            field,
            descriptor.name(),
            index,
            inherited,
        ));
    }
    Ok(())
}

/// Pick the identity: the single explicit marker, else a member named `id`.
fn resolve_id(
    descriptor: &TypeDescriptor,
    properties: &mut [PersistentProperty],
) -> MappingResult<()> {
    let mut explicit = properties.iter().filter(|p| p.is_explicit_id());
    if let Some(first) = explicit.next() {
        if let Some(second) = explicit.next() {
            return Err(MappingError::multiple_ids(
                descriptor.name(),
                first.name(),
                second.name(),
            ));
        }
        return Ok(());
    }

    if let Some(candidate) = properties
        .iter_mut()
        .find(|p| FALLBACK_ID_NAMES.contains(&p.name()))
    {
        candidate.mark_id();
    }
    Ok(())
}

/// Builder for [`MappingContext`].
#[derive(Default)]
pub struct MappingContextBuilder {
    initial_entities: Vec<DescriptorFn>,
    simple_types: SimpleTypeHolder,
    field_naming: FieldNaming,
    collection_naming: Option<CollectionNaming>,
    expression_context: Option<Arc<dyn ExpressionContext>>,
}

impl MappingContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field naming strategy.
    pub fn field_naming(mut self, naming: FieldNaming) -> Self {
        self.field_naming = naming;
        self
    }

    /// Derive collection names with a callback instead of the type name.
    pub fn collection_naming<F>(mut self, naming: F) -> Self
    where
        F: Fn(&TypeDescriptor) -> String + Send + Sync + 'static,
    {
        self.collection_naming = Some(Arc::new(naming));
        self
    }

    /// Treat an additional type as simple.
    pub fn simple_type<T: 'static>(mut self) -> Self {
        self.simple_types.register::<T>();
        self
    }

    /// Add a type to the warm-up set.
    pub fn initial_entity<T: MappedType>(mut self) -> Self {
        self.initial_entities.push(T::descriptor);
        self
    }

    /// Set the expression context used for collection expressions.
    pub fn expression_context(mut self, context: Arc<dyn ExpressionContext>) -> Self {
        self.expression_context = Some(context);
        self
    }

    /// Build the context.
    pub fn build(self) -> MappingContext {
        MappingContext {
            entities: RwLock::new(HashMap::new()),
            initial_entities: Mutex::new(self.initial_entities),
            simple_types: self.simple_types,
            field_naming: self.field_naming,
            collection_naming: self.collection_naming,
            expression_context: RwLock::new(self.expression_context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldDescriptor, GeoIndexSpec, IndexSpec};
    use crate::entity::IndexKind;
    use crate::expression::BeanRegistry;
    use crate::property::UNORDERED;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Person;
    impl MappedType for Person {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<Person>("Person")
                .with_field(FieldDescriptor::new("name", "String"))
                .with_field(FieldDescriptor::new("key", "String").id())
                .with_field(FieldDescriptor::new("age", "i32").order(1))
                .with_field(FieldDescriptor::new("email", "String").field_name("mail").order(0))
        }
    }

    struct Fallback;
    impl MappedType for Fallback {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<Fallback>("Fallback")
                .with_field(FieldDescriptor::new("title", "String"))
                .with_field(FieldDescriptor::new("id", "String"))
        }
    }

    struct NoId;
    impl MappedType for NoId {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<NoId>("NoId").with_field(FieldDescriptor::new("title", "String"))
        }
    }

    struct TwoIds;
    impl MappedType for TwoIds {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<TwoIds>("TwoIds")
                .with_field(FieldDescriptor::new("first", "String").id())
                .with_field(FieldDescriptor::new("second", "String").id())
        }
    }

    struct ExplicitOverFallback;
    impl MappedType for ExplicitOverFallback {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<ExplicitOverFallback>("ExplicitOverFallback")
                .with_field(FieldDescriptor::new("id", "String"))
                .with_field(FieldDescriptor::new("code", "String").id())
        }
    }

    struct NegativeOrder;
    impl MappedType for NegativeOrder {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<NegativeOrder>("NegativeOrder")
                .with_field(FieldDescriptor::new("value", "i32").order(-1))
        }
    }

    struct Node;
    impl MappedType for Node {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<Node>("Node")
                .with_field(FieldDescriptor::new("id", "ObjectId"))
                .with_field(
                    FieldDescriptor::new("parent", "Option<Box<Node>>")
                        .reference()
                        .target(Node::descriptor),
                )
                .with_field(
                    FieldDescriptor::new("tag", "Tag")
                        .embedded()
                        .target(Tag::descriptor),
                )
        }
    }

    struct Tag;
    impl MappedType for Tag {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<Tag>("Tag")
                .with_field(FieldDescriptor::new("label", "String"))
                .with_field(
                    FieldDescriptor::new("owner", "Node")
                        .reference()
                        .target(Node::descriptor),
                )
        }
    }

    struct Audit;
    impl MappedType for Audit {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<Audit>("Audit")
                .with_marker("Audited")
                .with_field(FieldDescriptor::new("created_by", "String"))
        }
    }

    struct Place;
    impl MappedType for Place {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<Place>("Place")
                .with_collection("places")
                .with_field(FieldDescriptor::new("id", "ObjectId"))
                .with_field(
                    FieldDescriptor::new("audit", "Audit")
                        .flatten()
                        .target(Audit::descriptor),
                )
                .with_field(
                    FieldDescriptor::new("location", "Point").geo_index(GeoIndexSpec {
                        name: Some("loc_2d"),
                        ..GeoIndexSpec::default()
                    }),
                )
                .with_field(FieldDescriptor::new("slug", "String").indexed(IndexSpec {
                    unique: true,
                    name: None,
                }))
        }
    }

    struct Tenanted;
    impl MappedType for Tenanted {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<Tenanted>("Tenanted")
                .with_collection("@(tenant).collection")
                .with_field(FieldDescriptor::new("id", "ObjectId"))
        }
    }

    #[test]
    fn test_explicit_id_and_field_names() {
        let ctx = MappingContext::new();
        let entity = ctx.get_persistent_entity::<Person>().unwrap().unwrap();

        let id = entity.id_property().unwrap();
        assert_eq!(id.name(), "key");
        assert!(id.is_explicit_id());
        assert_eq!(id.field_name(), "_id");
        assert_eq!(entity.property("email").unwrap().field_name(), "mail");
        assert_eq!(entity.collection(), "person");
    }

    #[test]
    fn test_property_ordering_is_stable() {
        let ctx = MappingContext::new();
        let entity = ctx.get_persistent_entity::<Person>().unwrap().unwrap();
        let names: Vec<_> = entity.properties().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["email", "age", "name", "key"]);
        assert_eq!(entity.property("name").unwrap().order(), UNORDERED);
        assert!(!entity.property("name").unwrap().is_ordered());
    }

    #[test]
    fn test_fallback_id() {
        let ctx = MappingContext::new();
        let entity = ctx.get_persistent_entity::<Fallback>().unwrap().unwrap();
        let id = entity.id_property().unwrap();
        assert_eq!(id.name(), "id");
        assert!(!id.is_explicit_id());

        let entity = ctx.get_persistent_entity::<NoId>().unwrap().unwrap();
        assert!(entity.id_property().is_none());

        let entity = ctx
            .get_persistent_entity::<ExplicitOverFallback>()
            .unwrap()
            .unwrap();
        assert_eq!(entity.id_property().unwrap().name(), "code");
        assert_eq!(entity.property("id").unwrap().field_name(), "id");
    }

    #[test]
    fn test_multiple_ids_fail() {
        let ctx = MappingContext::new();
        let err = ctx.get_persistent_entity::<TwoIds>().unwrap_err();
        assert_eq!(err, MappingError::multiple_ids("TwoIds", "first", "second"));
        assert!(!ctx.has_persistent_entity::<TwoIds>());
    }

    #[test]
    fn test_negative_order_fails() {
        let ctx = MappingContext::new();
        let err = ctx.get_persistent_entity::<NegativeOrder>().unwrap_err();
        assert!(err.is_range_error());
    }

    #[test]
    fn test_simple_types_have_no_entity() {
        let ctx = MappingContext::builder().simple_type::<NoId>().build();
        assert!(ctx.get_persistent_entity::<String>().unwrap().is_none());
        assert!(ctx.get_persistent_entity::<i64>().unwrap().is_none());
        assert!(ctx.get_persistent_entity::<bson::oid::ObjectId>().unwrap().is_none());
        assert!(ctx.get_persistent_entity::<NoId>().unwrap().is_none());
    }

    #[test]
    fn test_entities_are_cached() {
        let ctx = MappingContext::new();
        let a = ctx.get_persistent_entity::<Person>().unwrap().unwrap();
        let b = ctx.get_persistent_entity::<Person>().unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(ctx.persistent_entities().len(), 1);
    }

    #[test]
    fn test_concurrent_lookups_build_once() {
        static BUILDS: AtomicUsize = AtomicUsize::new(0);

        struct Counted;
        impl MappedType for Counted {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::of::<Counted>("Counted")
            }
        }

        let ctx = Arc::new(
            MappingContext::builder()
                .collection_naming(|d| {
                    BUILDS.fetch_add(1, Ordering::SeqCst);
                    d.name().to_lowercase()
                })
                .build(),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || ctx.get_persistent_entity::<Counted>().unwrap().unwrap())
            })
            .collect();
        let entities: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
        assert!(entities.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_build_is_cached() {
        static DESCRIBED: AtomicUsize = AtomicUsize::new(0);

        struct Broken;
        impl MappedType for Broken {
            fn descriptor() -> TypeDescriptor {
                DESCRIBED.fetch_add(1, Ordering::SeqCst);
                TypeDescriptor::of::<Broken>("Broken")
                    .with_field(FieldDescriptor::new("a", "String").id())
                    .with_field(FieldDescriptor::new("b", "String").id())
            }
        }

        let ctx = Arc::new(MappingContext::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || ctx.get_persistent_entity::<Broken>().unwrap_err())
            })
            .collect();
        let errors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(errors.windows(2).all(|w| w[0] == w[1]));

        let described = DESCRIBED.load(Ordering::SeqCst);
        assert_eq!(ctx.get_persistent_entity::<Broken>().unwrap_err(), errors[0]);
        assert_eq!(DESCRIBED.load(Ordering::SeqCst), described);
        assert!(!ctx.has_persistent_entity::<Broken>());
        assert!(ctx.persistent_entities().is_empty());
    }

    #[test]
    fn test_initialize_handles_self_references() {
        let ctx = MappingContext::new();
        ctx.add_initial_entity::<Node>();
        let visited = ctx.initialize().unwrap();
        assert_eq!(visited, 2);
        assert!(ctx.has_persistent_entity::<Node>());
        assert!(ctx.has_persistent_entity::<Tag>());
    }

    #[test]
    fn test_initialize_propagates_errors() {
        let ctx = MappingContext::new();
        ctx.set_initial_entity_set([Person::descriptor as DescriptorFn, TwoIds::descriptor]);
        assert!(ctx.initialize().is_err());
    }

    #[test]
    fn test_flattened_base_properties() {
        let ctx = MappingContext::new();
        let entity = ctx.get_persistent_entity::<Place>().unwrap().unwrap();

        assert_eq!(entity.collection(), "places");
        assert_eq!(
            entity.field_names(),
            vec!["_id", "created_by", "location", "slug"]
        );
        let inherited = entity.property("created_by").unwrap();
        assert!(inherited.requires_accessor());
        assert_eq!(inherited.owner(), "Audit");
        assert!(entity.has_marker("Audited"));
    }

    #[test]
    fn test_index_definitions() {
        let ctx = MappingContext::new();
        let entity = ctx.get_persistent_entity::<Place>().unwrap().unwrap();
        let indexes = entity.index_definitions();

        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].field, "location");
        assert_eq!(
            indexes[0].kind,
            IndexKind::Geo2d {
                min: -180,
                max: 180,
                bits: 26
            }
        );
        assert_eq!(indexes[0].name.as_deref(), Some("loc_2d"));
        assert_eq!(indexes[1].field, "slug");
        assert!(indexes[1].unique);
    }

    #[test]
    fn test_field_naming_strategy() {
        let ctx = MappingContext::builder()
            .field_naming(FieldNaming::CamelCase)
            .build();
        let entity = ctx.get_persistent_entity::<Place>().unwrap().unwrap();
        assert_eq!(entity.property("created_by").unwrap().field_name(), "createdBy");
    }

    #[test]
    fn test_collection_expression() {
        let ctx = MappingContext::new();
        let entity = ctx.get_persistent_entity::<Tenanted>().unwrap().unwrap();
        assert_eq!(entity.collection_expression(), Some("@(tenant).collection"));
        assert_eq!(entity.collection(), "tenanted");

        let registry = BeanRegistry::new().with_property("tenant", "collection", "acme");
        ctx.set_expression_context(Arc::new(registry));
        assert_eq!(entity.collection(), "acme");
    }

    #[test]
    fn test_collection_naming_callback() {
        let ctx = MappingContext::builder()
            .collection_naming(|d| format!("{}s", d.name().to_lowercase()))
            .build();
        let entity = ctx.get_persistent_entity::<Person>().unwrap().unwrap();
        assert_eq!(entity.collection(), "persons");
    }
}
