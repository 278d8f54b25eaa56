//! MongoDB connection configuration.
//!
//! A [`MongoConfig`] is assembled through [`MongoConfigBuilder`] or loaded
//! from TOML:
//!
//! ```toml
//! uri = "mongodb://${MONGO_HOST}:27017"
//! database = "inventory"
//! max_pool_size = 20
//! connect_timeout_ms = 5000
//! read_preference = "secondaryPreferred"
//! write_concern = "WMAJORITY"
//! ```
//!
//! `${VAR}` references are replaced from the environment before parsing.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use mongodb::options::{Acknowledgment, ClientOptions, SelectionCriteria};
use regex_lite::Regex;
use serde::{Deserialize, Deserializer};

use crate::error::{MongoError, MongoResult};

/// MongoDB connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MongoConfig {
    /// MongoDB connection URI.
    pub uri: String,
    /// Database name.
    pub database: String,
    /// Application name (shown in server logs).
    pub app_name: Option<String>,
    /// Minimum connection pool size.
    pub min_pool_size: Option<u32>,
    /// Maximum connection pool size.
    pub max_pool_size: Option<u32>,
    /// Maximum idle time for connections.
    #[serde(rename = "max_idle_time_ms", deserialize_with = "duration_ms")]
    pub max_idle_time: Option<Duration>,
    /// Connection timeout.
    #[serde(rename = "connect_timeout_ms", deserialize_with = "duration_ms")]
    pub connect_timeout: Option<Duration>,
    /// Server selection timeout.
    #[serde(rename = "server_selection_timeout_ms", deserialize_with = "duration_ms")]
    pub server_selection_timeout: Option<Duration>,
    /// Read preference.
    pub read_preference: Option<ReadPreference>,
    /// Write concern.
    pub write_concern: Option<WriteConcern>,
    /// Retry writes.
    pub retry_writes: Option<bool>,
    /// Retry reads.
    pub retry_reads: Option<bool>,
    /// Direct connection (bypass replica set discovery).
    pub direct_connection: Option<bool>,
}

/// MongoDB read preference.
///
/// Parses case-insensitively from `PRIMARY`, `PRIMARYPREFERRED`,
/// `SECONDARY`, `SECONDARYPREFERRED` and `NEAREST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ReadPreference {
    /// Read from primary only.
    #[default]
    Primary,
    /// Read from primary preferred, fallback to secondary.
    PrimaryPreferred,
    /// Read from secondary only.
    Secondary,
    /// Read from secondary preferred, fallback to primary.
    SecondaryPreferred,
    /// Read from nearest member.
    Nearest,
}

impl ReadPreference {
    /// Keyword for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "PRIMARY",
            Self::PrimaryPreferred => "PRIMARYPREFERRED",
            Self::Secondary => "SECONDARY",
            Self::SecondaryPreferred => "SECONDARYPREFERRED",
            Self::Nearest => "NEAREST",
        }
    }

    /// Convert to the driver's selection criteria.
    pub fn to_selection_criteria(&self) -> SelectionCriteria {
        use mongodb::options::ReadPreference as Driver;

        SelectionCriteria::ReadPreference(match self {
            Self::Primary => Driver::Primary,
            Self::PrimaryPreferred => Driver::PrimaryPreferred {
                options: Default::default(),
            },
            Self::Secondary => Driver::Secondary {
                options: Default::default(),
            },
            Self::SecondaryPreferred => Driver::SecondaryPreferred {
                options: Default::default(),
            },
            Self::Nearest => Driver::Nearest {
                options: Default::default(),
            },
        })
    }
}

impl fmt::Display for ReadPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadPreference {
    type Err = MongoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRIMARY" => Ok(Self::Primary),
            "PRIMARYPREFERRED" => Ok(Self::PrimaryPreferred),
            "SECONDARY" => Ok(Self::Secondary),
            "SECONDARYPREFERRED" => Ok(Self::SecondaryPreferred),
            "NEAREST" => Ok(Self::Nearest),
            _ => Err(MongoError::invalid_operation(format!(
                "read preference mode `{s}` is not supported"
            ))),
        }
    }
}

impl TryFrom<String> for ReadPreference {
    type Error = MongoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// MongoDB write concern.
///
/// Parses case-insensitively from `ACKNOWLEDGED`, `NONE`, `UNACKNOWLEDGED`,
/// `NORMAL`, `JOURNALED`, `FSYNCED`, `WMAJORITY`, `W2`, `W3` and `W4`, or
/// from a boolean (`true` is acknowledged).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawWriteConcern")]
pub enum WriteConcern {
    /// Fire and forget.
    Unacknowledged,
    /// Acknowledged by the primary.
    Acknowledged,
    /// Acknowledged after the journal commit.
    Journaled,
    /// Acknowledged after flushing to disk.
    Fsynced,
    /// Acknowledge writes from the specified number of nodes.
    W(u32),
    /// Acknowledge writes from majority of nodes.
    Majority,
    /// Custom tag set.
    Custom(String),
}

impl WriteConcern {
    /// Convert to the driver's write concern.
    pub fn to_driver(&self) -> mongodb::options::WriteConcern {
        use mongodb::options::WriteConcern as Driver;

        match self {
            Self::Unacknowledged => Driver::builder().w(Acknowledgment::Nodes(0)).build(),
            Self::Acknowledged => Driver::builder().w(Acknowledgment::Nodes(1)).build(),
            Self::Journaled => Driver::builder()
                .w(Acknowledgment::Nodes(1))
                .journal(true)
                .build(),
            // The driver has no fsync flag; journaling gives the same guarantee.
            Self::Fsynced => Driver::builder().journal(true).build(),
            Self::W(n) => Driver::builder().w(Acknowledgment::Nodes(*n)).build(),
            Self::Majority => Driver::builder().w(Acknowledgment::Majority).build(),
            Self::Custom(tag) => Driver::builder()
                .w(Acknowledgment::Custom(tag.clone()))
                .build(),
        }
    }
}

impl From<bool> for WriteConcern {
    fn from(acknowledged: bool) -> Self {
        if acknowledged {
            Self::Acknowledged
        } else {
            Self::Unacknowledged
        }
    }
}

impl FromStr for WriteConcern {
    type Err = MongoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACKNOWLEDGED" | "TRUE" => Ok(Self::Acknowledged),
            "NONE" | "UNACKNOWLEDGED" | "NORMAL" | "FALSE" => Ok(Self::Unacknowledged),
            "JOURNALED" => Ok(Self::Journaled),
            "FSYNCED" => Ok(Self::Fsynced),
            "WMAJORITY" | "MAJORITY" => Ok(Self::Majority),
            "W2" => Ok(Self::W(2)),
            "W3" => Ok(Self::W(3)),
            "W4" => Ok(Self::W(4)),
            _ => Err(MongoError::invalid_operation(format!(
                "write concern `{s}` is not supported"
            ))),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawWriteConcern {
    Flag(bool),
    Keyword(String),
}

impl TryFrom<RawWriteConcern> for WriteConcern {
    type Error = MongoError;

    fn try_from(raw: RawWriteConcern) -> Result<Self, Self::Error> {
        match raw {
            RawWriteConcern::Flag(flag) => Ok(flag.into()),
            RawWriteConcern::Keyword(keyword) => keyword.parse(),
        }
    }
}

fn duration_ms<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: String::new(),
            app_name: Some("docmap".to_string()),
            min_pool_size: None,
            max_pool_size: Some(10),
            max_idle_time: Some(Duration::from_secs(300)),
            connect_timeout: Some(Duration::from_secs(10)),
            server_selection_timeout: Some(Duration::from_secs(30)),
            read_preference: Some(ReadPreference::Primary),
            write_concern: None,
            retry_writes: Some(true),
            retry_reads: Some(true),
            direct_connection: None,
        }
    }
}

impl MongoConfig {
    /// Create a new configuration from a MongoDB URI.
    pub fn from_uri(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> MongoConfigBuilder {
        MongoConfigBuilder::new()
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> MongoResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MongoError::config(format!("failed to read {}: {e}", path.display())))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> MongoResult<Self> {
        let expanded = expand_env_vars(content);
        let config: Self = toml::from_str(&expanded)
            .map_err(|e| MongoError::config(format!("invalid configuration: {e}")))?;

        if config.database.trim().is_empty() {
            return Err(MongoError::config("database name is required"));
        }

        Ok(config)
    }

    /// Convert to MongoDB ClientOptions.
    pub async fn to_client_options(&self) -> MongoResult<ClientOptions> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| MongoError::config(format!("failed to parse URI: {}", e)))?;

        if let Some(ref app_name) = self.app_name {
            options.app_name = Some(app_name.clone());
        }

        if let Some(min_pool) = self.min_pool_size {
            options.min_pool_size = Some(min_pool);
        }

        if let Some(max_pool) = self.max_pool_size {
            options.max_pool_size = Some(max_pool);
        }

        if let Some(max_idle) = self.max_idle_time {
            options.max_idle_time = Some(max_idle);
        }

        if let Some(connect_timeout) = self.connect_timeout {
            options.connect_timeout = Some(connect_timeout);
        }

        if let Some(selection_timeout) = self.server_selection_timeout {
            options.server_selection_timeout = Some(selection_timeout);
        }

        if let Some(read_pref) = self.read_preference {
            options.selection_criteria = Some(read_pref.to_selection_criteria());
        }

        if let Some(ref wc) = self.write_concern {
            options.write_concern = Some(wc.to_driver());
        }

        if let Some(retry_writes) = self.retry_writes {
            options.retry_writes = Some(retry_writes);
        }

        if let Some(retry_reads) = self.retry_reads {
            options.retry_reads = Some(retry_reads);
        }

        if let Some(direct) = self.direct_connection {
            options.direct_connection = Some(direct);
        }

        Ok(options)
    }
}

/// Replace `${VAR}` with environment values; unknown variables are left as is.
pub(crate) fn expand_env_vars(content: &str) -> String {
    let Ok(re) = Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Builder for MongoDB configuration.
#[derive(Debug, Default)]
pub struct MongoConfigBuilder {
    uri: Option<String>,
    database: Option<String>,
    app_name: Option<String>,
    min_pool_size: Option<u32>,
    max_pool_size: Option<u32>,
    max_idle_time: Option<Duration>,
    connect_timeout: Option<Duration>,
    server_selection_timeout: Option<Duration>,
    read_preference: Option<ReadPreference>,
    write_concern: Option<WriteConcern>,
    retry_writes: Option<bool>,
    retry_reads: Option<bool>,
    direct_connection: Option<bool>,
}

impl MongoConfigBuilder {
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

    /// Set the minimum pool size.
    pub fn min_pool_size(mut self, size: u32) -> Self {
        self.min_pool_size = Some(size);
        self
    }

    /// Set the maximum pool size.
    pub fn max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Set the maximum idle time for connections.
    pub fn max_idle_time(mut self, duration: Duration) -> Self {
        self.max_idle_time = Some(duration);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Set the server selection timeout.
    pub fn server_selection_timeout(mut self, duration: Duration) -> Self {
        self.server_selection_timeout = Some(duration);
        self
    }

    /// Set the read preference.
    pub fn read_preference(mut self, pref: ReadPreference) -> Self {
        self.read_preference = Some(pref);
        self
    }

    /// Set the write concern.
    pub fn write_concern(mut self, wc: WriteConcern) -> Self {
        self.write_concern = Some(wc);
        self
    }

    /// Enable or disable retry writes.
    pub fn retry_writes(mut self, enabled: bool) -> Self {
        self.retry_writes = Some(enabled);
        self
    }

    /// Enable or disable retry reads.
    pub fn retry_reads(mut self, enabled: bool) -> Self {
        self.retry_reads = Some(enabled);
        self
    }

    /// Enable direct connection (bypass replica set discovery).
    pub fn direct_connection(mut self, enabled: bool) -> Self {
        self.direct_connection = Some(enabled);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> MongoResult<MongoConfig> {
        let database = self
            .database
            .ok_or_else(|| MongoError::config("database name is required"))?;
        let defaults = MongoConfig::default();

        Ok(MongoConfig {
            uri: self.uri.unwrap_or(defaults.uri),
            database,
            app_name: self.app_name.or(defaults.app_name),
            min_pool_size: self.min_pool_size,
            max_pool_size: self.max_pool_size.or(defaults.max_pool_size),
            max_idle_time: self.max_idle_time.or(defaults.max_idle_time),
            connect_timeout: self.connect_timeout.or(defaults.connect_timeout),
            server_selection_timeout: self
                .server_selection_timeout
                .or(defaults.server_selection_timeout),
            read_preference: self.read_preference.or(defaults.read_preference),
            write_concern: self.write_concern,
            retry_writes: self.retry_writes.or(defaults.retry_writes),
            retry_reads: self.retry_reads.or(defaults.retry_reads),
            direct_connection: self.direct_connection,
        })
    }
}
