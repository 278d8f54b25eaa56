//! Procedural macros for docmap.
//!
//! # Macros
//!
//! - [`Document`] - Derive mapping metadata for a struct
//!
//! # Example
//!
//! ```rust,ignore
//! #[derive(docmap::Document)]
//! #[docmap(collection = "people", implements = "Contact")]
//! struct Person {
//!     #[docmap(id)]
//!     key: ObjectId,
//!     #[docmap(field = "fn", order = 0)]
//!     first_name: String,
//!     #[docmap(geo_index(bits = 32))]
//!     location: [f64; 2],
//!     #[docmap(reference)]
//!     manager: Option<Box<Person>>,
//!     #[docmap(transient)]
//!     cached_score: f64,
//! }
//! ```

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod derive;

/// Derive `MappedType` for a struct with named fields.
///
/// # Attributes
///
/// ## Struct-level
/// - `#[docmap(collection = "name")]` - Collection name, or an `@(bean).property` expression
/// - `#[docmap(marker = "Name")]` - Add a marker attribute (repeatable)
/// - `#[docmap(implements = "Name")]` - Declare an implemented interface (repeatable)
///
/// ## Field-level
/// - `#[docmap(id)]` - Mark as the identity
/// - `#[docmap(field = "name")]` - Override the document field name
/// - `#[docmap(order = N)]` - Explicit property order
/// - `#[docmap(reference)]` - Reference to another mapped type
/// - `#[docmap(embedded)]` - Embedded mapped type
/// - `#[docmap(flatten)]` - Inline the members of a mapped base type
/// - `#[docmap(transient)]` - Not persisted
/// - `#[docmap(indexed)]`, `#[docmap(indexed(name = "..."))]`, `#[docmap(unique)]` - Single-field index
/// - `#[docmap(geo_index)]`, `#[docmap(geo_index(name = "...", min = -90, max = 90, bits = 26))]` - 2d index
///
/// Only `reference`, `embedded` and `flatten` fields link to the descriptor of
/// the field's type, since the macro cannot tell whether an arbitrary field
/// type implements `MappedType`. A nested mapped struct without one of these
/// attributes is stored as a plain value and is not reached by
/// `MappingContext::initialize`.
#[proc_macro_derive(Document, attributes(docmap))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive::derive_document_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
