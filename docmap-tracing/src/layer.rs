//! The `tracing` layer turning events into documents.

use bson::{Bson, Document, doc};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::config::{AppenderConfig, DEFAULT_COLLECTION};
use crate::error::AppenderResult;
use crate::event::LogEvent;
use crate::layout::{PatternLayout, RenderContext};
use crate::writer::{WriterMessage, WriterSender};

/// Targets whose events are never stored, so the writer cannot feed itself.
const IGNORED_TARGETS: &[&str] = &["docmap_tracing", "mongodb"];

#[derive(Debug)]
enum Fields {
    Default,
    Parameters(Vec<(String, PatternLayout)>),
}

#[derive(Debug)]
enum CollectionName {
    Fixed(String),
    Pattern(PatternLayout),
}

/// Process-wide values of the default field set, read once.
#[derive(Debug, Clone)]
struct Environment {
    domain: String,
    user_name: String,
    host_name: String,
}

impl Environment {
    fn detect() -> Self {
        let domain = std::env::current_exe()
            .ok()
            .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();
        let user_name = env_any(&["USER", "USERNAME"]).unwrap_or_default();
        let host_name = env_any(&["HOSTNAME", "COMPUTERNAME"])
            .or_else(|| {
                std::fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
            })
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            domain,
            user_name,
            host_name,
        }
    }
}

fn env_any(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
}

/// A [`Layer`] that sends every event to the MongoDB writer task.
#[derive(Debug)]
pub struct MongoLayer {
    fields: Fields,
    collection: CollectionName,
    application_id: Option<String>,
    environment: Environment,
    sender: WriterSender,
}

impl MongoLayer {
    /// Build a layer sending documents through `sender`.
    ///
    /// Fails if a parameter layout or the collection pattern does not parse.
    pub fn new(config: &AppenderConfig, sender: WriterSender) -> AppenderResult<Self> {
        config.validate()?;

        let fields = if config.parameters.is_empty() {
            Fields::Default
        } else {
            let parameters = config
                .parameters
                .iter()
                .map(|p| PatternLayout::parse(&p.layout).map(|layout| (p.name.clone(), layout)))
                .collect::<AppenderResult<Vec<_>>>()?;
            Fields::Parameters(parameters)
        };

        let collection = match (&config.collection_pattern, &config.collection) {
            (Some(pattern), _) => CollectionName::Pattern(PatternLayout::parse(pattern)?),
            (None, Some(name)) => CollectionName::Fixed(name.clone()),
            (None, None) => CollectionName::Fixed(DEFAULT_COLLECTION.to_string()),
        };

        Ok(Self {
            fields,
            collection,
            application_id: config.application_id.clone(),
            environment: Environment::detect(),
            sender,
        })
    }

    /// Collection an event is written to.
    pub fn collection_name(&self, event: &LogEvent) -> String {
        match &self.collection {
            CollectionName::Fixed(name) => name.clone(),
            CollectionName::Pattern(layout) => {
                let context =
                    RenderContext::for_collection(self.application_id.as_deref(), event.timestamp);
                let name = layout.render(event, &context);
                if name.trim().is_empty() {
                    DEFAULT_COLLECTION.to_string()
                } else {
                    name
                }
            }
        }
    }

    /// The document stored for an event.
    pub fn to_document(&self, event: &LogEvent) -> Document {
        match &self.fields {
            Fields::Default => self.default_document(event),
            Fields::Parameters(parameters) => {
                let context = self.render_context();
                parameters
                    .iter()
                    .map(|(name, layout)| (name.clone(), layout.render_bson(event, &context)))
                    .collect()
            }
        }
    }

    fn render_context(&self) -> RenderContext {
        match &self.application_id {
            Some(id) => RenderContext::new().with("applicationId", id.as_str()),
            None => RenderContext::new(),
        }
    }

    fn default_document(&self, event: &LogEvent) -> Document {
        let mut document = Document::new();

        if let Some(id) = &self.application_id {
            document.insert("applicationId", id.as_str());
        }
        document.insert("timestamp", bson::DateTime::from_chrono(event.timestamp));
        document.insert("level", event.level.as_str());
        document.insert("loggerName", event.logger.as_str());
        document.insert("domain", self.environment.domain.as_str());
        document.insert("identity", self.environment.user_name.as_str());
        document.insert("message", event.message.as_str());
        document.insert("thread", event.thread.as_str());
        document.insert("userName", self.environment.user_name.as_str());
        document.insert("hostName", self.environment.host_name.as_str());

        if !event.properties.is_empty() {
            let properties: Document = event
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), Bson::String(v.clone())))
                .collect();
            document.insert("properties", properties);
        }

        if let Some(exception) = &event.exception {
            document.insert("exception", doc! { "message": exception.as_str() });
        }

        if let Some(location) = &event.location {
            let mut info = Document::new();
            if let Some(module) = &location.module_path {
                info.insert("className", module.as_str());
            }
            if let Some(file) = &location.file {
                info.insert("fileName", file.as_str());
            }
            if let Some(line) = location.line {
                info.insert("lineNumber", i64::from(line));
            }
            info.insert("fullInfo", location.full_info());
            document.insert("locationInfo", info);
        }

        document
    }
}

impl<S: Subscriber> Layer<S> for MongoLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();
        if IGNORED_TARGETS.iter().any(|ignored| target.starts_with(ignored)) {
            return;
        }

        let event = LogEvent::from_tracing(event);
        let message = WriterMessage::Insert {
            collection: self.collection_name(&event),
            document: self.to_document(&event),
        };
        // A closed writer drops events rather than failing the caller.
        let _ = self.sender.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{WriterReceiver, channel};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tracing::Level;
    use tracing_subscriber::prelude::*;

    fn layer(config: AppenderConfig) -> (MongoLayer, WriterReceiver) {
        let (sender, receiver) = channel();
        (MongoLayer::new(&config, sender).unwrap(), receiver)
    }

    fn received(receiver: &mut WriterReceiver) -> (String, Document) {
        match receiver.try_recv().unwrap() {
            WriterMessage::Insert {
                collection,
                document,
            } => (collection, document),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_default_fields() {
        let (layer, mut receiver) = layer(AppenderConfig::default().application_id("billing"));
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "app::payments", order = "A-17", "payment failed");
        });

        let (collection, document) = received(&mut receiver);
        assert_eq!(collection, "logs");

        let keys: Vec<&str> = document.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "applicationId",
                "timestamp",
                "level",
                "loggerName",
                "domain",
                "identity",
                "message",
                "thread",
                "userName",
                "hostName",
                "properties",
                "locationInfo",
            ]
        );
        assert_eq!(document.get_str("level").unwrap(), "WARN");
        assert_eq!(document.get_str("loggerName").unwrap(), "app::payments");
        assert_eq!(document.get_str("message").unwrap(), "payment failed");
        assert_eq!(
            document.get_document("properties").unwrap(),
            &doc! { "order": "A-17" }
        );
        assert!(matches!(document.get("timestamp"), Some(Bson::DateTime(_))));
    }

    #[test]
    fn test_exception_field() {
        let (layer, mut receiver) = layer(AppenderConfig::default());
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            let err = std::io::Error::other("disk full");
            tracing::error!(error = &err as &dyn std::error::Error, "write failed");
        });

        let (_, document) = received(&mut receiver);
        assert!(!document.contains_key("applicationId"));
        assert!(!document.contains_key("properties"));
        assert_eq!(
            document.get_document("exception").unwrap(),
            &doc! { "message": "disk full" }
        );
    }

    #[test]
    fn test_parameters_replace_default_fields() {
        let config = AppenderConfig::default()
            .application_id("billing")
            .parameter("ts", "%date")
            .parameter("line", "[%level] %message (%property{applicationId})");
        let (layer, _receiver) = layer(config);

        let event = LogEvent::new(Level::INFO, "app", "ready");
        let document = layer.to_document(&event);

        assert_eq!(document.len(), 2);
        assert!(matches!(document.get("ts"), Some(Bson::DateTime(_))));
        assert_eq!(document.get_str("line").unwrap(), "[INFO] ready (billing)");
    }

    #[test]
    fn test_collection_pattern() {
        let config = AppenderConfig::default()
            .application_id("billing")
            .collection_pattern("%property{applicationId}_%property{year}_%property{month}");
        let (layer, _receiver) = layer(config);

        let mut event = LogEvent::new(Level::INFO, "app", "ready");
        event.timestamp = Utc.with_ymd_and_hms(2023, 11, 2, 0, 0, 0).unwrap();
        assert_eq!(layer.collection_name(&event), "billing_2023_11");
    }

    #[test]
    fn test_empty_pattern_falls_back_to_default_collection() {
        let config = AppenderConfig::default().collection_pattern("%property{applicationId}");
        let (layer, _receiver) = layer(config);

        let event = LogEvent::new(Level::INFO, "app", "ready");
        assert_eq!(layer.collection_name(&event), "logs");
    }

    #[test]
    fn test_fixed_collection() {
        let (layer, _receiver) = layer(AppenderConfig::default().collection("events"));
        let event = LogEvent::new(Level::INFO, "app", "ready");
        assert_eq!(layer.collection_name(&event), "events");
    }

    #[test]
    fn test_invalid_parameter_layout() {
        let (sender, _receiver) = channel();
        let config = AppenderConfig::default().parameter("bad", "%nope");
        assert!(MongoLayer::new(&config, sender).is_err());
    }

    #[test]
    fn test_own_events_are_ignored() {
        let (layer, mut receiver) = layer(AppenderConfig::default());
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "docmap_tracing::writer", "Failed to write log event");
            tracing::info!(target: "mongodb::command", "insert");
        });

        assert!(receiver.try_recv().is_err());
    }
}
