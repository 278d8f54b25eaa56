//! Error types for the log appender.

use thiserror::Error;

/// Result type for appender operations.
pub type AppenderResult<T> = Result<T, AppenderError>;

/// Errors raised while configuring or running the appender.
#[derive(Error, Debug)]
pub enum AppenderError {
    /// Invalid appender configuration.
    #[error("appender configuration error: {0}")]
    Config(String),

    /// The configuration file could not be read.
    #[error("failed to read appender configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML.
    #[error("invalid appender configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A layout pattern could not be parsed.
    #[error("invalid layout pattern `{pattern}`: {message}")]
    Layout { pattern: String, message: String },

    /// MongoDB driver error.
    #[error("mongodb error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// The writer task has stopped.
    #[error("log writer is closed")]
    Closed,
}

impl AppenderError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a layout error.
    pub fn layout(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Layout {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}
