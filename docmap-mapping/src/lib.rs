//! # docmap-mapping
//!
//! Entity mapping metadata for docmap.
//!
//! This crate provides:
//! - Type descriptors: the registration-time schema of a mapped type
//! - Persistent entities and properties with resolved field names, order and identity
//! - A mapping context that builds and caches one entity per type
//! - Type filters for selecting candidate types from a registry
//!
//! ## Example
//!
//! ```rust,ignore
//! use docmap::Document;
//! use docmap::mapping::MappingContext;
//!
//! #[derive(Document)]
//! #[docmap(collection = "people")]
//! struct Person {
//!     #[docmap(id)]
//!     key: String,
//!     #[docmap(field = "fn", order = 1)]
//!     first_name: String,
//! }
//!
//! let context = MappingContext::new();
//! let entity = context.get_persistent_entity::<Person>()?.unwrap();
//! assert_eq!(entity.collection(), "people");
//! ```

pub mod context;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod expression;
pub mod filter;
pub mod naming;
pub mod property;

pub use context::{MappingContext, MappingContextBuilder, SimpleTypeHolder};
pub use descriptor::{
    DOCUMENT_MARKER, DescriptorFn, FieldDescriptor, GeoIndexSpec, IndexSpec, MappedType,
    TypeDescriptor,
};
pub use entity::{IndexDefinition, IndexKind, PersistentEntity};
pub use error::{MappingError, MappingResult};
pub use expression::{BeanExpression, BeanRegistry, ExpressionContext};
pub use filter::{
    AssignableTypeFilter, AttributeTypeFilter, NamePatternTypeFilter, TypeFilter, TypeRegistry,
};
pub use naming::{CollectionNaming, FieldNaming, ID_FIELD, uncapitalize};
pub use property::{PersistentProperty, UNORDERED};
