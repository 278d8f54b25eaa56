//! # docmap-mongodb
//!
//! MongoDB driver glue for docmap.
//!
//! This crate provides:
//! - Connection management with the official MongoDB driver (pooling is built in)
//! - Configuration from code or TOML, including read preference and write concern vocabularies
//! - Converters between driver types and their string forms, plus a conversion service
//! - Entity-aware filter building and geospatial value objects
//! - Index creation from entity metadata
//! - Map-reduce and group commands with typed result wrappers
//! - Transaction-scoped resource binding
//!
//! ## Example
//!
//! ```rust,ignore
//! use docmap::Document;
//! use docmap::mapping::MappingContext;
//! use docmap_mongodb::{FilterBuilder, MongoClient};
//!
//! #[derive(Document)]
//! #[docmap(collection = "people")]
//! struct Person {
//!     #[docmap(id)]
//!     id: ObjectId,
//!     #[docmap(field = "fn", indexed)]
//!     first_name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MongoClient::builder()
//!         .uri("mongodb://localhost:27017")
//!         .database("mydb")
//!         .build()
//!         .await?;
//!
//!     let context = MappingContext::new();
//!     let entity = context.get_persistent_entity::<Person>()?.unwrap();
//!     client.ensure_indexes(&entity).await?;
//!
//!     let filter = FilterBuilder::for_entity(entity)
//!         .eq("first_name", "Ada")
//!         .build();
//!     let people = client.collection_for::<Person>(&context)?;
//!     let ada = people.find_one(filter, None).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod filter;
pub mod geo;
pub mod index;
pub mod mapreduce;
pub mod transaction;

pub use bson::oid::ObjectId;
pub use bson::{Bson, Document, doc};
pub use client::{MongoClient, MongoClientBuilder};
pub use config::{MongoConfig, MongoConfigBuilder, ReadPreference, WriteConcern};
pub use convert::{ConversionService, Converter, HostAndPort};
pub use error::{MongoError, MongoResult};
pub use filter::FilterBuilder;
pub use geo::{Circle, Distance, GeoBox, Metric, Metrics, Point, Polygon, Shape, Sphere};
pub use mapreduce::{
    GroupBy, GroupByResults, MapReduceCounts, MapReduceOptions, MapReduceResults,
    MapReduceTiming,
};
pub use transaction::{
    DatabaseHolder, ResourceHolder, ResourceHolderSupport, ResourceHolderSynchronization,
    SynchronizationRegistry, TransactionStatus, TransactionSynchronization,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::{MongoClient, MongoClientBuilder};
    pub use crate::config::{MongoConfig, MongoConfigBuilder, ReadPreference, WriteConcern};
    pub use crate::convert::{ConversionService, Converter};
    pub use crate::document::DocumentExt;
    pub use crate::error::{MongoError, MongoResult};
    pub use crate::filter::FilterBuilder;
    pub use crate::geo::{Circle, Distance, GeoBox, Metric, Metrics, Point, Polygon, Shape, Sphere};
    pub use crate::mapreduce::{GroupBy, MapReduceOptions};
    pub use crate::transaction::{SynchronizationRegistry, TransactionSynchronization};
    pub use bson::oid::ObjectId;
    pub use bson::{Bson, Document, doc};
}
