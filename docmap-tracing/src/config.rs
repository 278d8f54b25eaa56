//! Appender configuration.
//!
//! ```toml
//! connection_string = "mongodb://localhost:27017"
//! database = "logging"
//! collection_pattern = "%property{applicationId}_%property{year}%property{month}"
//! application_id = "billing"
//!
//! [[parameter]]
//! name = "ts"
//! layout = "%date"
//!
//! [[parameter]]
//! name = "msg"
//! layout = "[%level] %message"
//! ```

use std::path::Path;

use regex_lite::Regex;
use serde::Deserialize;

use crate::error::{AppenderError, AppenderResult};

/// Database used when neither the configuration nor the connection string names one.
pub const DEFAULT_DATABASE: &str = "log4net";

/// Collection used when no collection or pattern is configured.
pub const DEFAULT_COLLECTION: &str = "logs";

/// Default connection string.
pub const DEFAULT_CONNECTION_STRING: &str = "mongodb://localhost:27017";

/// One configured document field: a name and the layout rendering its value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterConfig {
    /// Document field name.
    pub name: String,
    /// Layout pattern of the value.
    pub layout: String,
}

/// Log appender configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppenderConfig {
    /// MongoDB connection string.
    pub connection_string: String,
    /// Database name; overrides the connection string's default database.
    pub database: Option<String>,
    /// Fixed collection name.
    pub collection: Option<String>,
    /// Layout pattern rendering the collection name per event.
    pub collection_pattern: Option<String>,
    /// Application identifier stored with every event.
    pub application_id: Option<String>,
    /// Document fields; empty means the default field set.
    #[serde(rename = "parameter")]
    pub parameters: Vec<ParameterConfig>,
}

impl Default for AppenderConfig {
    fn default() -> Self {
        Self {
            connection_string: DEFAULT_CONNECTION_STRING.to_string(),
            database: None,
            collection: None,
            collection_pattern: None,
            application_id: None,
            parameters: Vec::new(),
        }
    }
}

impl AppenderConfig {
    /// Configuration for a connection string with defaults everywhere else.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Self::default()
        }
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set a fixed collection name.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Set the collection pattern.
    pub fn collection_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.collection_pattern = Some(pattern.into());
        self
    }

    /// Set the application identifier.
    pub fn application_id(mut self, id: impl Into<String>) -> Self {
        self.application_id = Some(id.into());
        self
    }

    /// Add a document field.
    pub fn parameter(mut self, name: impl Into<String>, layout: impl Into<String>) -> Self {
        self.parameters.push(ParameterConfig {
            name: name.into(),
            layout: layout.into(),
        });
        self
    }

    /// Load from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> AppenderResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load from a TOML string, expanding `${VAR}` references first.
    pub fn from_toml_str(content: &str) -> AppenderResult<Self> {
        let config: Self = toml::from_str(&expand_env_vars(content))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> AppenderResult<()> {
        if self.connection_string.trim().is_empty() {
            return Err(AppenderError::config("connection_string must not be empty"));
        }
        if let Some(parameter) = self.parameters.iter().find(|p| p.name.trim().is_empty()) {
            return Err(AppenderError::config(format!(
                "parameter with layout `{}` has no name",
                parameter.layout
            )));
        }
        Ok(())
    }

    /// Database name: explicit, else the connection string's default, else [`DEFAULT_DATABASE`].
    pub fn database_name(&self, connection_default: Option<&str>) -> String {
        self.database
            .as_deref()
            .or(connection_default)
            .unwrap_or(DEFAULT_DATABASE)
            .to_string()
    }
}

/// Replace `${VAR}` with environment values; unknown variables are left as is.
fn expand_env_vars(content: &str) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppenderConfig::default();
        assert_eq!(config.connection_string, DEFAULT_CONNECTION_STRING);
        assert_eq!(config.database_name(None), "log4net");
        assert_eq!(config.database_name(Some("fromuri")), "fromuri");
        assert!(config.parameters.is_empty());
    }

    #[test]
    fn test_explicit_database_wins() {
        let config = AppenderConfig::new("mongodb://db").database("audit");
        assert_eq!(config.database_name(Some("fromuri")), "audit");
    }

    #[test]
    fn test_from_toml() {
        let config = AppenderConfig::from_toml_str(
            r#"
            connection_string = "mongodb://logs.internal:27017"
            collection_pattern = "%property{applicationId}_%property{year}"
            application_id = "billing"

            [[parameter]]
            name = "ts"
            layout = "%date"

            [[parameter]]
            name = "msg"
            layout = "%message"
            "#,
        )
        .unwrap();

        assert_eq!(config.application_id.as_deref(), Some("billing"));
        assert_eq!(
            config.parameters,
            vec![
                ParameterConfig {
                    name: "ts".into(),
                    layout: "%date".into()
                },
                ParameterConfig {
                    name: "msg".into(),
                    layout: "%message".into()
                },
            ]
        );
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = AppenderConfig::from_toml_str("colection = \"typo\"").unwrap_err();
        assert!(matches!(err, AppenderError::Toml(_)));
    }

    #[test]
    fn test_unnamed_parameter_rejected() {
        let config = AppenderConfig::default().parameter(" ", "%message");
        assert!(matches!(config.validate(), Err(AppenderError::Config(_))));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connection_string = \"mongodb://file:27017\"").unwrap();
        writeln!(file, "collection = \"events\"").unwrap();

        let config = AppenderConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.connection_string, "mongodb://file:27017");
        assert_eq!(config.collection.as_deref(), Some("events"));
    }
}
