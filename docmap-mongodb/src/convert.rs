//! Type converters between driver-native values and plain representations.
//!
//! Two kinds of conversion live here:
//!
//! - [`Converter`]s are total over their source type and return `None` when a
//!   value has no sensible conversion. "Not applicable" is not an error.
//! - Vocabulary parsers ([`parse_read_preference`], [`parse_write_concern`],
//!   [`parse_server_address`]) fail with [`MongoError::InvalidOperation`] when
//!   given a value outside their keyword set or of the wrong BSON type.
//!
//! [`ConversionService`] collects converters by (source, target) type so that
//! callers holding a type-erased value can look one up at runtime.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bson::{Bson, oid::ObjectId};
use chrono::{DateTime, Utc};
use mongodb::options::ServerAddress;
use num_bigint::BigInt;
use url::Url;
use uuid::Uuid;

use crate::config::{ReadPreference, WriteConcern};
use crate::document::bson_types;
use crate::error::{MongoError, MongoResult};

/// Port used when a server address names only a host.
pub const DEFAULT_PORT: u16 = 27017;

/// A one-way, side-effect free conversion.
pub trait Converter<S, T>: Send + Sync {
    /// Convert `source`, or `None` when the value has no conversion.
    fn convert(&self, source: &S) -> Option<T>;
}

impl<S, T, F> Converter<S, T> for F
where
    F: Fn(&S) -> Option<T> + Send + Sync,
{
    fn convert(&self, source: &S) -> Option<T> {
        self(source)
    }
}

/// Renders object ids as 24-digit hex strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectIdToString;

impl Converter<ObjectId, String> for ObjectIdToString {
    fn convert(&self, source: &ObjectId) -> Option<String> {
        Some(source.to_hex())
    }
}

impl Converter<Bson, String> for ObjectIdToString {
    /// Values that are not object ids become the empty string.
    fn convert(&self, source: &Bson) -> Option<String> {
        match source {
            Bson::ObjectId(oid) => Some(oid.to_hex()),
            _ => Some(String::new()),
        }
    }
}

/// Parses 24-digit hex strings into object ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringToObjectId;

impl Converter<String, ObjectId> for StringToObjectId {
    fn convert(&self, source: &String) -> Option<ObjectId> {
        ObjectId::parse_str(source.trim()).ok()
    }
}

impl Converter<Bson, ObjectId> for StringToObjectId {
    fn convert(&self, source: &Bson) -> Option<ObjectId> {
        match source {
            Bson::String(s) => ObjectId::parse_str(s.trim()).ok(),
            _ => None,
        }
    }
}

/// Parses decimal strings into arbitrary-precision integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringToBigInt;

impl Converter<String, BigInt> for StringToBigInt {
    fn convert(&self, source: &String) -> Option<BigInt> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed.parse().ok()
    }
}

/// Parses absolute URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringToUrl;

impl Converter<String, Url> for StringToUrl {
    fn convert(&self, source: &String) -> Option<Url> {
        Url::parse(source.trim()).ok()
    }
}

/// Serializes URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlToString;

impl Converter<Url, String> for UrlToString {
    fn convert(&self, source: &Url) -> Option<String> {
        Some(source.to_string())
    }
}

/// Converts between UUIDs and BSON binary (subtype 4).
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidConverter;

impl Converter<Uuid, Bson> for UuidConverter {
    fn convert(&self, source: &Uuid) -> Option<Bson> {
        Some(bson_types::uuid_to_bson(*source))
    }
}

impl Converter<Bson, Uuid> for UuidConverter {
    fn convert(&self, source: &Bson) -> Option<Uuid> {
        bson_types::bson_to_uuid(source).ok()
    }
}

/// Converts between chrono timestamps and BSON dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeConverter;

impl Converter<DateTime<Utc>, Bson> for DateTimeConverter {
    fn convert(&self, source: &DateTime<Utc>) -> Option<Bson> {
        Some(bson_types::datetime_to_bson(*source))
    }
}

impl Converter<Bson, DateTime<Utc>> for DateTimeConverter {
    fn convert(&self, source: &Bson) -> Option<DateTime<Utc>> {
        bson_types::bson_to_datetime(source).ok()
    }
}

/// Parse a read preference keyword held in a BSON string.
pub fn parse_read_preference(value: &Bson) -> MongoResult<ReadPreference> {
    match value {
        Bson::String(s) => s.parse(),
        other => Err(type_mismatch("read preference", other)),
    }
}

/// Parse a write concern from a keyword string or a boolean.
pub fn parse_write_concern(value: &Bson) -> MongoResult<WriteConcern> {
    match value {
        Bson::String(s) => s.parse(),
        Bson::Boolean(flag) => Ok(WriteConcern::from(*flag)),
        other => Err(type_mismatch("write concern", other)),
    }
}

/// A parsed `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAndPort {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl HostAndPort {
    /// Convert to the driver's server address.
    pub fn to_server_address(&self) -> MongoResult<ServerAddress> {
        ServerAddress::parse(self.to_string()).map_err(MongoError::from)
    }
}

impl fmt::Display for HostAndPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for HostAndPort {
    type Err = MongoError;

    /// Parse `host:port` or `host`.
    ///
    /// A bare host gets [`DEFAULT_PORT`]. More than one `:`, an empty host,
    /// or a port that is not a `u16` is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            MongoError::invalid_operation(format!(
                "cannot parse server address from String value `{s}`"
            ))
        };

        let mut parts = s.trim().split(':');
        let host = parts.next().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
        let port = match (parts.next(), parts.next()) {
            (None, _) => DEFAULT_PORT,
            (Some(port), None) => port.parse::<u16>().map_err(|_| invalid())?,
            (Some(_), Some(_)) => return Err(invalid()),
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

/// Parse `host:port` or `host` held in a BSON string.
pub fn parse_server_address(value: &Bson) -> MongoResult<HostAndPort> {
    match value {
        Bson::String(s) => s.parse(),
        other => Err(type_mismatch("server address", other)),
    }
}

fn type_mismatch(what: &str, value: &Bson) -> MongoError {
    MongoError::invalid_operation(format!(
        "cannot parse {what} from {:?} value `{value}`",
        value.element_type()
    ))
}

type ErasedConverter = Box<dyn Fn(&dyn Any) -> Option<Box<dyn Any>> + Send + Sync>;

/// Registry of converters keyed by (source type, target type).
#[derive(Default)]
pub struct ConversionService {
    converters: HashMap<(TypeId, TypeId), ErasedConverter>,
}

impl ConversionService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service holding the default converters.
    pub fn with_defaults() -> Self {
        let mut service = Self::new();
        service
            .add_converter::<ObjectId, String, _>(ObjectIdToString)
            .add_converter::<Bson, String, _>(ObjectIdToString)
            .add_converter::<String, ObjectId, _>(StringToObjectId)
            .add_converter::<Bson, ObjectId, _>(StringToObjectId)
            .add_converter::<String, BigInt, _>(StringToBigInt)
            .add_converter::<String, Url, _>(StringToUrl)
            .add_converter::<Url, String, _>(UrlToString)
            .add_converter::<Uuid, Bson, _>(UuidConverter)
            .add_converter::<Bson, Uuid, _>(UuidConverter)
            .add_converter::<DateTime<Utc>, Bson, _>(DateTimeConverter)
            .add_converter::<Bson, DateTime<Utc>, _>(DateTimeConverter);
        service
    }

    /// Register a converter, replacing any previous one for the same pair.
    pub fn add_converter<S, T, C>(&mut self, converter: C) -> &mut Self
    where
        S: 'static,
        T: 'static,
        C: Converter<S, T> + 'static,
    {
        let erased: ErasedConverter = Box::new(move |source: &dyn Any| {
            let source = source.downcast_ref::<S>()?;
            converter
                .convert(source)
                .map(|target| Box::new(target) as Box<dyn Any>)
        });
        self.converters
            .insert((TypeId::of::<S>(), TypeId::of::<T>()), erased);
        self
    }

    /// Whether a converter from `S` to `T` is registered.
    pub fn can_convert<S: 'static, T: 'static>(&self) -> bool {
        self.converters
            .contains_key(&(TypeId::of::<S>(), TypeId::of::<T>()))
    }

    /// Convert a statically typed value.
    pub fn convert<S: 'static, T: 'static>(&self, source: &S) -> Option<T> {
        self.convert_any(source)
    }

    /// Convert a type-erased value; `None` when no converter handles its
    /// runtime type or the converter declines the value.
    pub fn convert_any<T: 'static>(&self, source: &dyn Any) -> Option<T> {
        let converter = self.converters.get(&(source.type_id(), TypeId::of::<T>()))?;
        converter(source)?.downcast::<T>().ok().map(|target| *target)
    }

    /// Number of registered converters.
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// Whether no converter is registered.
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl fmt::Debug for ConversionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionService")
            .field("converters", &self.converters.len())
            .finish()
    }
}
