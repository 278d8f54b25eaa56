//! Declarative type metadata.
//!
//! A [`TypeDescriptor`] is the registration-time schema of a mapped type:
//! its name, collection attribute, markers and the ordered list of its
//! members. Descriptors are normally produced by `#[derive(Document)]`, but
//! they can be assembled by hand for types that cannot use the derive:
//!
//! ```rust
//! use docmap_mapping::{FieldDescriptor, MappedType, TypeDescriptor};
//!
//! struct Person {
//!     key: String,
//!     name: String,
//! }
//!
//! impl MappedType for Person {
//!     fn descriptor() -> TypeDescriptor {
//!         TypeDescriptor::of::<Person>("Person")
//!             .with_collection("people")
//!             .with_field(FieldDescriptor::new("key", "String").id())
//!             .with_field(FieldDescriptor::new("name", "String").order(1))
//!     }
//! }
//!
//! let descriptor = Person::descriptor();
//! assert_eq!(descriptor.collection(), Some("people"));
//! assert_eq!(descriptor.fields().len(), 2);
//! ```

use std::any::TypeId;

/// Lazily produces the descriptor of a related type.
///
/// Related types are referenced through function pointers so that a type
/// can point at itself without building an infinite descriptor.
pub type DescriptorFn = fn() -> TypeDescriptor;

/// Marker carried by every derived document type.
pub const DOCUMENT_MARKER: &str = "Document";

/// A type that exposes mapping metadata.
pub trait MappedType: 'static {
    /// Build the descriptor for this type.
    fn descriptor() -> TypeDescriptor;
}

/// Options of a single-field index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexSpec {
    /// Reject duplicate values.
    pub unique: bool,
    /// Explicit index name.
    pub name: Option<&'static str>,
}

/// Options of a two-dimensional geospatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoIndexSpec {
    /// Explicit index name.
    pub name: Option<&'static str>,
    /// Lower coordinate bound.
    pub min: i32,
    /// Upper coordinate bound.
    pub max: i32,
    /// Geohash precision.
    pub bits: i32,
}

impl Default for GeoIndexSpec {
    fn default() -> Self {
        Self {
            name: None,
            min: -180,
            max: 180,
            bits: 26,
        }
    }
}

/// Metadata for one member of a mapped type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: &'static str,
    type_name: &'static str,
    field_name: Option<&'static str>,
    order: Option<i32>,
    id: bool,
    reference: bool,
    embedded: bool,
    flatten: bool,
    index: Option<IndexSpec>,
    geo_index: Option<GeoIndexSpec>,
    target: Option<DescriptorFn>,
}

impl FieldDescriptor {
    /// Create a descriptor for a member with the given declared type.
    pub const fn new(name: &'static str, type_name: &'static str) -> Self {
        Self {
            name,
            type_name,
            field_name: None,
            order: None,
            id: false,
            reference: false,
            embedded: false,
            flatten: false,
            index: None,
            geo_index: None,
            target: None,
        }
    }

    /// Mark the member as the identity.
    pub const fn id(mut self) -> Self {
        self.id = true;
        self
    }

    /// Override the document field name.
    pub const fn field_name(mut self, field_name: &'static str) -> Self {
        self.field_name = Some(field_name);
        self
    }

    /// Set an explicit order.
    pub const fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Mark the member as a reference to another document.
    pub const fn reference(mut self) -> Self {
        self.reference = true;
        self
    }

    /// Mark the member as an embedded document.
    pub const fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    /// Inline the members of the target type into the owning entity.
    pub const fn flatten(mut self) -> Self {
        self.flatten = true;
        self
    }

    /// Index the member.
    pub const fn indexed(mut self, spec: IndexSpec) -> Self {
        self.index = Some(spec);
        self
    }

    /// Add a geospatial index on the member.
    pub const fn geo_index(mut self, spec: GeoIndexSpec) -> Self {
        self.geo_index = Some(spec);
        self
    }

    /// Point at the mapped type the member holds.
    pub const fn target(mut self, target: DescriptorFn) -> Self {
        self.target = Some(target);
        self
    }

    /// Member name as declared.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared type as written in source.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Explicit document field name, if any.
    pub fn explicit_field_name(&self) -> Option<&'static str> {
        self.field_name
    }

    /// Explicit order, if any.
    pub fn explicit_order(&self) -> Option<i32> {
        self.order
    }

    /// Whether the member carries the id marker.
    pub fn is_id(&self) -> bool {
        self.id
    }

    /// Whether the member is a document reference.
    pub fn is_reference(&self) -> bool {
        self.reference
    }

    /// Whether the member is an embedded document.
    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    /// Whether the member is flattened into its owner.
    pub fn is_flatten(&self) -> bool {
        self.flatten
    }

    /// Index options.
    pub fn index_spec(&self) -> Option<IndexSpec> {
        self.index
    }

    /// Geospatial index options.
    pub fn geo_index_spec(&self) -> Option<GeoIndexSpec> {
        self.geo_index
    }

    /// Descriptor function of the held mapped type.
    pub fn target_fn(&self) -> Option<DescriptorFn> {
        self.target
    }
}

/// Metadata for one mapped type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    name: &'static str,
    simple: bool,
    collection: Option<&'static str>,
    markers: Vec<&'static str>,
    implements: Vec<&'static str>,
    fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    /// Start a descriptor for `T` with its simple name.
    pub fn of<T: 'static>(name: &'static str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name,
            simple: false,
            collection: None,
            markers: Vec::new(),
            implements: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Descriptor of a primitive or driver-native type that is never an entity.
    pub fn simple<T: 'static>() -> Self {
        let type_name = std::any::type_name::<T>();
        let name = type_name.rsplit("::").next().unwrap_or(type_name);
        Self {
            simple: true,
            ..Self::of::<T>(name)
        }
    }

    /// Set the collection attribute (a literal or an `@(bean).property` expression).
    pub fn with_collection(mut self, collection: &'static str) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Add a marker attribute.
    pub fn with_marker(mut self, marker: &'static str) -> Self {
        if !self.markers.contains(&marker) {
            self.markers.push(marker);
        }
        self
    }

    /// Declare an implemented interface.
    pub fn with_implements(mut self, interface: &'static str) -> Self {
        if !self.implements.contains(&interface) {
            self.implements.push(interface);
        }
        self
    }

    /// Append a member in declaration order.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Identity of the described type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Simple type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this is a primitive or driver-native type.
    pub fn is_simple(&self) -> bool {
        self.simple
    }

    /// The collection attribute, if declared.
    pub fn collection(&self) -> Option<&'static str> {
        self.collection
    }

    /// Markers declared directly on the type.
    pub fn markers(&self) -> &[&'static str] {
        &self.markers
    }

    /// Whether the type itself declares the marker.
    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| *m == marker)
    }

    /// Interfaces declared directly on the type.
    pub fn implements(&self) -> &[&'static str] {
        &self.implements
    }

    /// Members in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Descriptors of the flattened member types, which act as base types.
    pub fn bases(&self) -> impl Iterator<Item = TypeDescriptor> + '_ {
        self.fields
            .iter()
            .filter(|f| f.is_flatten())
            .filter_map(|f| f.target_fn())
            .map(|target| target())
    }
}

macro_rules! simple_types {
    ($($ty:ty),* $(,)?) => {
        $(
            impl MappedType for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::simple::<$ty>()
                }
            }
        )*
    };
}

simple_types!(
    String,
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    bson::oid::ObjectId,
    bson::Document,
    bson::Bson,
    bson::DateTime,
    bson::Timestamp,
    bson::Decimal128,
    bson::Binary,
);
