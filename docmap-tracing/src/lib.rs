//! # docmap-tracing
//!
//! A [`tracing_subscriber::Layer`] that stores log events as MongoDB documents.
//!
//! Each event becomes one document, either with the default field set
//! (`applicationId`, `timestamp`, `level`, `loggerName`, `domain`,
//! `identity`, `message`, `thread`, `userName`, `hostName` and, when
//! present, `properties`, `exception` and `locationInfo`) or with the
//! configured parameters. Documents are handed to a background task over an
//! unbounded channel, so logging never waits on the database.
//!
//! ## Example
//!
//! ```rust,ignore
//! use docmap_tracing::AppenderConfig;
//! use tracing_subscriber::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppenderConfig::new("mongodb://localhost:27017")
//!         .application_id("billing")
//!         .collection_pattern("%property{applicationId}_%property{year}%property{month}");
//!
//!     let (layer, handle) = docmap_tracing::connect(config).await?;
//!     tracing_subscriber::registry().with(layer).init();
//!
//!     tracing::info!(order = "A-17", "payment received");
//!
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod layer;
pub mod layout;
pub mod writer;

use mongodb::Client;
use mongodb::options::ClientOptions;
use tracing::info;

pub use config::{AppenderConfig, DEFAULT_COLLECTION, DEFAULT_DATABASE, ParameterConfig};
pub use error::{AppenderError, AppenderResult};
pub use event::{LogEvent, Location};
pub use layer::MongoLayer;
pub use layout::{PatternLayout, RenderContext};
pub use writer::AppenderHandle;

/// Connect to MongoDB and start the writer task.
///
/// Must be called within a Tokio runtime. The database is the configured
/// one, else the connection string's default database, else
/// [`DEFAULT_DATABASE`].
pub async fn connect(config: AppenderConfig) -> AppenderResult<(MongoLayer, AppenderHandle)> {
    config.validate()?;

    let options = ClientOptions::parse(&config.connection_string).await?;
    let database_name = config.database_name(options.default_database.as_deref());
    let client = Client::with_options(options)?;
    let database = client.database(&database_name);

    let (sender, receiver) = writer::channel();
    let layer = MongoLayer::new(&config, sender.clone())?;
    let handle = AppenderHandle::spawn(database, sender, receiver);

    info!(database = %database_name, "MongoDB log appender started");

    Ok((layer, handle))
}
