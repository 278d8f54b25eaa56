//! MongoDB client wrapper with built-in connection pooling.

use std::sync::Arc;

use bson::{Document, doc};
use docmap_mapping::{MappedType, MappingContext, PersistentEntity};
use futures::TryStreamExt;
use mongodb::{Client, Collection, Database};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::MongoConfig;
use crate::document::{DocumentExt, from_documents};
use crate::error::{MongoError, MongoResult};
use crate::index::index_model;
use crate::mapreduce::{GroupBy, GroupByResults, MapReduceOptions, MapReduceResults};
use crate::transaction::{SynchronizationRegistry, database_utils};

/// A MongoDB client with connection pooling.
///
/// The driver pools connections internally; this wraps its `Client` with
/// entity-aware helpers (collections and indexes from mapping metadata,
/// map-reduce and group commands, transaction-bound database handles).
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    database: Database,
    config: Arc<MongoConfig>,
}

impl MongoClient {
    /// Create a new client from configuration.
    pub async fn new(config: MongoConfig) -> MongoResult<Self> {
        let options = config.to_client_options().await?;

        let client = Client::with_options(options)
            .map_err(|e| MongoError::connection(format!("failed to create client: {}", e)))?;

        let database = client.database(&config.database);

        info!(
            uri = %config.uri,
            database = %config.database,
            "MongoDB client created"
        );

        Ok(Self {
            client,
            database,
            config: Arc::new(config),
        })
    }

    /// Create a builder for the client.
    pub fn builder() -> MongoClientBuilder {
        MongoClientBuilder::new()
    }

    /// Get a typed collection.
    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.database.collection(name)
    }

    /// Get a collection with BSON documents.
    pub fn collection_doc(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }

    /// The collection a mapped type is stored in.
    ///
    /// Fails for simple types, which have no persistent entity.
    pub fn collection_for<T: MappedType>(
        &self,
        context: &MappingContext,
    ) -> MongoResult<Collection<Document>> {
        let entity = context.get_persistent_entity::<T>()?.ok_or_else(|| {
            MongoError::invalid_operation(format!(
                "{} is a simple type and is not stored in a collection",
                std::any::type_name::<T>()
            ))
        })?;
        Ok(self.collection_doc(&entity.collection()))
    }

    /// Get the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Get a different database from the same client.
    pub fn get_database(&self, name: &str) -> Database {
        self.client.database(name)
    }

    /// The configured database, bound to `registry` while a transaction is active.
    pub fn database_for(&self, registry: &SynchronizationRegistry) -> MongoResult<Database> {
        database_utils::get_database(&self.client, &self.config.database, registry)
    }

    /// Get the underlying MongoDB client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the configuration.
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// Check if the client is healthy by pinging the server.
    pub async fn is_healthy(&self) -> bool {
        self.database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .is_ok()
    }

    /// List all collection names in the database.
    pub async fn list_collections(&self) -> MongoResult<Vec<String>> {
        let names = self.database.list_collection_names(None).await?;
        Ok(names)
    }

    /// Drop a collection.
    pub async fn drop_collection(&self, name: &str) -> MongoResult<()> {
        debug!(collection = %name, "Dropping collection");
        self.database
            .collection::<Document>(name)
            .drop(None)
            .await?;
        Ok(())
    }

    /// Create the indexes declared by an entity's properties.
    ///
    /// Returns the names of the created indexes; an entity without index
    /// metadata is a no-op.
    pub async fn ensure_indexes(&self, entity: &PersistentEntity) -> MongoResult<Vec<String>> {
        let definitions = entity.index_definitions();
        if definitions.is_empty() {
            return Ok(Vec::new());
        }

        let collection = entity.collection();
        let models: Vec<_> = definitions.iter().map(index_model).collect();

        debug!(
            entity = %entity.name(),
            collection = %collection,
            count = models.len(),
            "Ensuring indexes"
        );

        let result = self
            .collection_doc(&collection)
            .create_indexes(models, None)
            .await?;

        Ok(result.index_names)
    }

    /// Run a database command.
    pub async fn run_command(&self, command: Document) -> MongoResult<Document> {
        let result = self.database.run_command(command, None).await?;
        Ok(result)
    }

    /// Run a `mapReduce` command and map its results.
    ///
    /// Inline output is read from the reply; otherwise the output collection
    /// is read back in full.
    pub async fn map_reduce<T>(
        &self,
        collection: &str,
        map_function: &str,
        reduce_function: &str,
        options: &MapReduceOptions,
    ) -> MongoResult<MapReduceResults<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let command = options.build_command(collection, map_function, reduce_function);
        debug!(collection = %collection, inline = options.is_inline(), "Running mapReduce");

        let raw = self.run_command(command).await?;

        if options.is_inline() {
            let mapped = match raw.get_array_opt("results") {
                Some(results) => from_documents(results)?,
                None => Vec::new(),
            };
            return Ok(MapReduceResults::new(mapped, raw));
        }

        let results = MapReduceResults::<T>::new(Vec::new(), raw);
        let Some(output) = results.output_collection().map(String::from) else {
            return Err(MongoError::query(
                "mapReduce reply names no output collection",
            ));
        };

        let mapped: Vec<T> = self
            .output_database(&results, options)
            .collection::<T>(&output)
            .find(None, None)
            .await?
            .try_collect()
            .await?;

        Ok(MapReduceResults::new(mapped, results.raw().clone()))
    }

    /// Database holding map-reduce output: the one named in the reply, else
    /// the requested one, else the configured database.
    fn output_database<T>(
        &self,
        results: &MapReduceResults<T>,
        options: &MapReduceOptions,
    ) -> Database {
        match results.output_database().or(options.output_database_name()) {
            Some(name) => self.client.database(name),
            None => self.database.clone(),
        }
    }

    /// Run a `group` command and map its `retval` array.
    pub async fn group<T>(
        &self,
        collection: &str,
        group: &GroupBy,
        condition: Option<Document>,
    ) -> MongoResult<GroupByResults<T>>
    where
        T: DeserializeOwned,
    {
        let command = group.build_command(collection, condition);
        debug!(collection = %collection, "Running group");

        let raw = self.run_command(command).await?;
        let mapped = match raw.get_array_opt("retval") {
            Some(values) => from_documents(values)?,
            None => Vec::new(),
        };

        Ok(GroupByResults::new(mapped, raw))
    }

    /// Start a client session for transactions.
    pub async fn start_session(&self) -> MongoResult<mongodb::ClientSession> {
        let session = self.client.start_session(None).await?;
        Ok(session)
    }
}

impl std::fmt::Debug for MongoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoClient")
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

/// Builder for MongoClient.
#[derive(Debug, Default)]
pub struct MongoClientBuilder {
    uri: Option<String>,
    database: Option<String>,
    app_name: Option<String>,
    max_pool_size: Option<u32>,
    min_pool_size: Option<u32>,
    connect_timeout: Option<std::time::Duration>,
    direct_connection: Option<bool>,
}

impl MongoClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the MongoDB URI.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the maximum pool size.
    pub fn max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Set the minimum pool size.
    pub fn min_pool_size(mut self, size: u32) -> Self {
        self.min_pool_size = Some(size);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, duration: std::time::Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Enable direct connection (bypass replica set discovery).
    pub fn direct_connection(mut self, enabled: bool) -> Self {
        self.direct_connection = Some(enabled);
        self
    }

    /// Build the client.
    pub async fn build(self) -> MongoResult<MongoClient> {
        let mut config_builder = MongoConfig::builder();

        if let Some(uri) = self.uri {
            config_builder = config_builder.uri(uri);
        }

        if let Some(database) = self.database {
            config_builder = config_builder.database(database);
        }

        if let Some(app_name) = self.app_name {
            config_builder = config_builder.app_name(app_name);
        }

        if let Some(max_pool) = self.max_pool_size {
            config_builder = config_builder.max_pool_size(max_pool);
        }

        if let Some(min_pool) = self.min_pool_size {
            config_builder = config_builder.min_pool_size(min_pool);
        }

        if let Some(timeout) = self.connect_timeout {
            config_builder = config_builder.connect_timeout(timeout);
        }

        if let Some(direct) = self.direct_connection {
            config_builder = config_builder.direct_connection(direct);
        }

        let config = config_builder.build()?;
        MongoClient::new(config).await
    }
}
