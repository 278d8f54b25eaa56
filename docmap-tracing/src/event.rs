//! Captured log events.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::field::{Field, Visit};
use tracing::{Event, Level};

/// Where an event was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    /// Module path of the call site.
    pub module_path: Option<String>,
    /// Source file.
    pub file: Option<String>,
    /// Source line.
    pub line: Option<u32>,
}

impl Location {
    /// `module (file:line)`, omitting missing parts.
    pub fn full_info(&self) -> String {
        let module = self.module_path.as_deref().unwrap_or("?");
        match (&self.file, self.line) {
            (Some(file), Some(line)) => format!("{module} ({file}:{line})"),
            (Some(file), None) => format!("{module} ({file})"),
            _ => module.to_string(),
        }
    }
}

/// A log event with its fields collected.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: Level,
    /// Event target, used as the logger name.
    pub logger: String,
    /// The `message` field.
    pub message: String,
    /// Name (or id) of the emitting thread.
    pub thread: String,
    /// Every other field, rendered as text.
    pub properties: BTreeMap<String, String>,
    /// An `error` or `exception` field.
    pub exception: Option<String>,
    /// Call site.
    pub location: Option<Location>,
}

impl LogEvent {
    /// An event with only the required parts set.
    pub fn new(level: Level, logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            logger: logger.into(),
            message: message.into(),
            thread: current_thread_name(),
            properties: BTreeMap::new(),
            exception: None,
            location: None,
        }
    }

    /// Capture a `tracing` event.
    pub fn from_tracing(event: &Event<'_>) -> Self {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let location = Location {
            module_path: metadata.module_path().map(String::from),
            file: metadata.file().map(String::from),
            line: metadata.line(),
        };
        let has_location = location != Location::default();

        Self {
            timestamp: Utc::now(),
            level: *metadata.level(),
            logger: metadata.target().to_string(),
            message: visitor.message.unwrap_or_default(),
            thread: current_thread_name(),
            properties: visitor.properties,
            exception: visitor.exception,
            location: has_location.then_some(location),
        }
    }

    /// Attach a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

fn current_thread_name() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    exception: Option<String>,
    properties: BTreeMap<String, String>,
}

impl FieldVisitor {
    fn record_text(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "error" | "exception" => self.exception = Some(value),
            // Bridged `log` records carry their metadata as fields.
            name if name.starts_with("log.") => {}
            name => {
                self.properties.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        let mut text = value.to_string();
        let mut source = value.source();
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        self.record_text(field, text);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_text(field, format!("{value:?}"));
    }
}
