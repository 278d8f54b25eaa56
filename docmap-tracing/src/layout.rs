//! Pattern layouts.
//!
//! A pattern mixes literal text with conversions:
//!
//! | Conversion | Output |
//! |---|---|
//! | `%date`, `%date{fmt}` | event time, `fmt` in `strftime` syntax |
//! | `%level` | severity (`INFO`, `WARN`, ...) |
//! | `%logger` | event target |
//! | `%message` | the `message` field |
//! | `%thread` | emitting thread |
//! | `%property{key}` | a render-context value, else an event field |
//! | `%property` | every event field as `{k=v, ...}` |
//! | `%newline` | `\n` |
//! | `%%` | a literal `%` |

use std::collections::BTreeMap;

use bson::Bson;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::{AppenderError, AppenderResult};
use crate::event::LogEvent;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Date(Option<String>),
    Level,
    Logger,
    Message,
    Thread,
    Property(Option<String>),
    Newline,
}

/// Values a pattern can read besides the event itself.
///
/// Built once per render and never mutated afterwards, so concurrent log
/// calls cannot observe each other's values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    properties: BTreeMap<String, String>,
}

impl RenderContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// The context used for collection names: `applicationId` (when set)
    /// plus `year`, `month`, `day` and `hour` of `at`, zero-padded.
    pub fn for_collection(application_id: Option<&str>, at: DateTime<Utc>) -> Self {
        let mut context = Self::new()
            .with("year", format!("{:04}", at.year()))
            .with("month", format!("{:02}", at.month()))
            .with("day", format!("{:02}", at.day()))
            .with("hour", format!("{:02}", at.hour()));
        if let Some(id) = application_id {
            context = context.with("applicationId", id);
        }
        context
    }

    /// Add a value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A parsed layout pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternLayout {
    pattern: String,
    segments: Vec<Segment>,
}

impl PatternLayout {
    /// Parse a pattern.
    pub fn parse(pattern: &str) -> AppenderResult<Self> {
        let segments = parse_segments(pattern)?;
        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// The source pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Render to text.
    pub fn render(&self, event: &LogEvent, context: &RenderContext) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Date(format) => {
                    let format = format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
                    out.push_str(&event.timestamp.format(format).to_string());
                }
                Segment::Level => out.push_str(event.level.as_str()),
                Segment::Logger => out.push_str(&event.logger),
                Segment::Message => out.push_str(&event.message),
                Segment::Thread => out.push_str(&event.thread),
                Segment::Property(Some(key)) => {
                    let value = context
                        .get(key)
                        .or_else(|| event.properties.get(key).map(String::as_str))
                        .unwrap_or_default();
                    out.push_str(value);
                }
                Segment::Property(None) => {
                    let all: Vec<String> = event
                        .properties
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect();
                    out.push('{');
                    out.push_str(&all.join(", "));
                    out.push('}');
                }
                Segment::Newline => out.push('\n'),
            }
        }
        out
    }

    /// Render to a BSON value: a bare `%date` becomes a BSON date, anything
    /// else a string.
    pub fn render_bson(&self, event: &LogEvent, context: &RenderContext) -> Bson {
        match self.segments.as_slice() {
            [Segment::Date(None)] => Bson::DateTime(bson::DateTime::from_chrono(event.timestamp)),
            _ => Bson::String(self.render(event, context)),
        }
    }
}

fn parse_segments(pattern: &str) -> AppenderResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }

        if chars.peek() == Some(&'%') {
            chars.next();
            literal.push('%');
            continue;
        }

        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if !next.is_ascii_alphabetic() {
                break;
            }
            name.push(next);
            chars.next();
        }
        if name.is_empty() {
            return Err(AppenderError::layout(pattern, "`%` must be followed by a conversion name"));
        }

        let option = if chars.peek() == Some(&'{') {
            chars.next();
            let mut option = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => option.push(c),
                    None => {
                        return Err(AppenderError::layout(
                            pattern,
                            format!("unterminated option of `%{name}`"),
                        ));
                    }
                }
            }
            Some(option)
        } else {
            None
        };

        let segment = match name.as_str() {
            "date" | "d" => {
                if let Some(format) = &option {
                    validate_date_format(pattern, format)?;
                }
                Segment::Date(option)
            }
            "level" | "p" => Segment::Level,
            "logger" | "c" => Segment::Logger,
            "message" | "m" => Segment::Message,
            "thread" | "t" => Segment::Thread,
            "property" | "P" => Segment::Property(option),
            "newline" | "n" => Segment::Newline,
            other => {
                return Err(AppenderError::layout(
                    pattern,
                    format!("unknown conversion `%{other}`"),
                ));
            }
        };

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(segment);
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

fn validate_date_format(pattern: &str, format: &str) -> AppenderResult<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(AppenderError::layout(
            pattern,
            format!("invalid date format `{format}`"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tracing::Level;

    fn event() -> LogEvent {
        let mut event = LogEvent::new(Level::WARN, "app::billing", "payment failed")
            .with_property("order", "A-17");
        event.timestamp = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        event.thread = "worker-1".into();
        event
    }

    #[test]
    fn test_render_conversions() {
        let layout =
            PatternLayout::parse("%date{%Y/%m/%d} [%thread] %level %logger - %message%n").unwrap();
        assert_eq!(
            layout.render(&event(), &RenderContext::new()),
            "2024/03/09 [worker-1] WARN app::billing - payment failed\n"
        );
    }

    #[test]
    fn test_default_date_format() {
        let layout = PatternLayout::parse("%date").unwrap();
        assert_eq!(
            layout.render(&event(), &RenderContext::new()),
            "2024-03-09 07:05:01.000"
        );
    }

    #[test]
    fn test_percent_escape_and_short_names() {
        let layout = PatternLayout::parse("100%% %p %m").unwrap();
        assert_eq!(
            layout.render(&event(), &RenderContext::new()),
            "100% WARN payment failed"
        );
    }

    #[test]
    fn test_property_prefers_context() {
        let layout = PatternLayout::parse("%property{order}/%property{missing}/%property").unwrap();
        let context = RenderContext::new().with("order", "override");
        assert_eq!(layout.render(&event(), &context), "override//{order=A-17}");
    }

    #[test]
    fn test_collection_context() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let context = RenderContext::for_collection(Some("billing"), at);
        let layout = PatternLayout::parse(
            "%property{applicationId}_%property{year}%property{month}%property{day}%property{hour}",
        )
        .unwrap();
        assert_eq!(layout.render(&event(), &context), "billing_2024030907");

        let context = RenderContext::for_collection(None, at);
        assert_eq!(context.get("applicationId"), None);
    }

    #[test]
    fn test_render_bson_date() {
        let layout = PatternLayout::parse("%date").unwrap();
        assert!(matches!(
            layout.render_bson(&event(), &RenderContext::new()),
            Bson::DateTime(_)
        ));

        let layout = PatternLayout::parse("at %date").unwrap();
        assert!(matches!(
            layout.render_bson(&event(), &RenderContext::new()),
            Bson::String(_)
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(PatternLayout::parse("%bogus").is_err());
        assert!(PatternLayout::parse("trailing %").is_err());
        assert!(PatternLayout::parse("%property{open").is_err());
        assert!(PatternLayout::parse("%date{%Q}").is_err());
    }

    #[test]
    fn test_literal_only() {
        let layout = PatternLayout::parse("static").unwrap();
        assert_eq!(layout.pattern(), "static");
        assert_eq!(layout.render(&event(), &RenderContext::new()), "static");
    }
}
