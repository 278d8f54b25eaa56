//! # docmap
//!
//! Object-document mapping for MongoDB.
//!
//! docmap provides:
//! - `#[derive(Document)]` to declare how a struct maps to a document
//! - A mapping context that builds, validates and caches one persistent entity per type
//! - Converters between driver types and their string forms
//! - Entity-aware filters, geospatial value objects and index creation
//! - Map-reduce and group results, and transaction-scoped resource binding
//! - An optional `tracing` layer that stores log events in MongoDB (`log-appender` feature)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docmap::prelude::*;
//!
//! #[derive(Document)]
//! #[docmap(collection = "people")]
//! pub struct Person {
//!     #[docmap(id)]
//!     pub key: ObjectId,
//!     #[docmap(field = "fn", order = 0, indexed)]
//!     pub first_name: String,
//!     #[docmap(reference)]
//!     pub manager: Option<Box<Person>>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     docmap::logging::init();
//!
//!     let context = MappingContext::builder().initial_entity::<Person>().build();
//!     context.initialize()?;
//!
//!     let client = MongoClient::builder()
//!         .uri("mongodb://localhost:27017")
//!         .database("mydb")
//!         .build()
//!         .await?;
//!
//!     let entity = context.get_persistent_entity::<Person>()?.unwrap();
//!     client.ensure_indexes(&entity).await?;
//!
//!     let filter = FilterBuilder::for_entity(entity).eq("first_name", "Ada").build();
//!     let ada = client.collection_for::<Person>(&context)?.find_one(filter, None).await?;
//!
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

// Lets `#[derive(Document)]` expand to `::docmap::...` inside this crate's own tests.
extern crate self as docmap;

pub mod logging;

/// Mapping metadata, persistent entities and the mapping context.
pub mod mapping {
    pub use docmap_mapping::*;
}

/// MongoDB driver glue.
pub mod mongodb {
    pub use docmap_mongodb::*;
}

/// Log appender writing `tracing` events to MongoDB.
#[cfg(feature = "log-appender")]
#[cfg_attr(docsrs, doc(cfg(feature = "log-appender")))]
pub mod appender {
    pub use docmap_tracing::*;
}

// Re-export proc macros
pub use docmap_codegen::Document;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::Document;
    pub use crate::mapping::{
        MappedType, MappingContext, MappingError, PersistentEntity, PersistentProperty,
    };
    pub use crate::mongodb::prelude::*;
}

// Re-export key types at the crate root
pub use mapping::{MappingContext, MappingError, MappingResult, PersistentEntity};
pub use mongodb::{MongoClient, MongoError, MongoResult};
