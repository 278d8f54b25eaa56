//! Document access and conversion utilities.

use bson::{Bson, Document};
use serde::de::DeserializeOwned;

use crate::error::{MongoError, MongoResult};

/// Lenient lookups for command replies.
///
/// Server replies mix numeric widths and omit fields freely; these return
/// `None` instead of failing so callers can substitute their sentinels.
pub trait DocumentExt {
    /// A string value.
    fn get_str_opt(&self, key: &str) -> Option<&str>;

    /// Any numeric value (int32, int64 or double) as an i64.
    ///
    /// Doubles are truncated; anything else is `None`.
    fn get_integer_opt(&self, key: &str) -> Option<i64>;

    /// Any numeric value as an f64.
    fn get_number_opt(&self, key: &str) -> Option<f64>;

    /// A nested document.
    fn get_document_opt(&self, key: &str) -> Option<&Document>;

    /// An array value.
    fn get_array_opt(&self, key: &str) -> Option<&Vec<Bson>>;
}

impl DocumentExt for Document {
    fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.get_str(key).ok()
    }

    fn get_integer_opt(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Bson::Int32(v) => Some(i64::from(*v)),
            Bson::Int64(v) => Some(*v),
            Bson::Double(v) if v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    fn get_number_opt(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Bson::Int32(v) => Some(f64::from(*v)),
            Bson::Int64(v) => Some(*v as f64),
            Bson::Double(v) => Some(*v),
            _ => None,
        }
    }

    fn get_document_opt(&self, key: &str) -> Option<&Document> {
        self.get_document(key).ok()
    }

    fn get_array_opt(&self, key: &str) -> Option<&Vec<Bson>> {
        self.get_array(key).ok()
    }
}

/// Deserialize every document element of an array, skipping other elements.
pub fn from_documents<T: DeserializeOwned>(values: &[Bson]) -> MongoResult<Vec<T>> {
    values
        .iter()
        .filter_map(Bson::as_document)
        .map(|doc| {
            bson::from_document(doc.clone()).map_err(|e| MongoError::serialization(e.to_string()))
        })
        .collect()
}

/// BSON type helpers.
pub mod bson_types {
    use super::*;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    /// Convert a UUID to BSON Binary.
    pub fn uuid_to_bson(uuid: Uuid) -> Bson {
        Bson::Binary(bson::Binary {
            subtype: bson::spec::BinarySubtype::Uuid,
            bytes: uuid.as_bytes().to_vec(),
        })
    }

    /// Convert BSON Binary (or a UUID string) to UUID.
    pub fn bson_to_uuid(bson: &Bson) -> MongoResult<Uuid> {
        match bson {
            Bson::Binary(binary) => {
                let bytes: [u8; 16] = binary
                    .bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| MongoError::serialization("invalid UUID bytes"))?;
                Ok(Uuid::from_bytes(bytes))
            }
            Bson::String(s) => Uuid::parse_str(s)
                .map_err(|e| MongoError::serialization(format!("invalid UUID string: {}", e))),
            _ => Err(MongoError::serialization(
                "expected Binary or String for UUID",
            )),
        }
    }

    /// Convert a DateTime to BSON DateTime.
    pub fn datetime_to_bson(dt: DateTime<Utc>) -> Bson {
        Bson::DateTime(bson::DateTime::from_chrono(dt))
    }

    /// Convert BSON DateTime to chrono DateTime.
    pub fn bson_to_datetime(bson: &Bson) -> MongoResult<DateTime<Utc>> {
        match bson {
            Bson::DateTime(dt) => Ok(dt.to_chrono()),
            _ => Err(MongoError::serialization("expected DateTime")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[test]
    fn test_lenient_lookups() {
        let doc = doc! { "name": "Alice", "age": 30, "sub": { "k": 1 }, "list": [1, 2] };
        assert_eq!(doc.get_str_opt("name"), Some("Alice"));
        assert_eq!(doc.get_str_opt("age"), None);
        assert_eq!(doc.get_document_opt("sub"), Some(&doc! { "k": 1 }));
        assert_eq!(doc.get_document_opt("name"), None);
        assert_eq!(doc.get_array_opt("list").map(Vec::len), Some(2));
        assert_eq!(doc.get_array_opt("missing"), None);
    }

    #[test]
    fn test_numeric_lookups_accept_any_width() {
        let doc = doc! { "a": 7_i32, "b": 9_i64, "c": 2.5, "d": "x" };
        assert_eq!(doc.get_integer_opt("a"), Some(7));
        assert_eq!(doc.get_integer_opt("b"), Some(9));
        assert_eq!(doc.get_integer_opt("c"), Some(2));
        assert_eq!(doc.get_integer_opt("d"), None);
        assert_eq!(doc.get_integer_opt("missing"), None);

        assert_eq!(doc.get_number_opt("c"), Some(2.5));
        assert_eq!(doc.get_number_opt("a"), Some(7.0));
        assert_eq!(doc.get_number_opt("d"), None);
    }

    #[test]
    fn test_from_documents_skips_scalars() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Row {
            v: i32,
        }

        let values = vec![
            Bson::Document(doc! { "v": 1 }),
            Bson::Int32(5),
            Bson::Document(doc! { "v": 2 }),
        ];
        let rows: Vec<Row> = from_documents(&values).unwrap();
        assert_eq!(rows, vec![Row { v: 1 }, Row { v: 2 }]);
    }

    #[test]
    fn test_from_documents_reports_shape_mismatch() {
        #[derive(Debug, serde::Deserialize)]
        struct Row {
            #[allow(dead_code)]
            v: i32,
        }

        let values = vec![Bson::Document(doc! { "v": "text" })];
        let err = from_documents::<Row>(&values).unwrap_err();
        assert!(matches!(err, MongoError::Serialization(_)));
    }

    #[test]
    fn test_uuid_conversion() {
        use bson_types::*;

        let uuid = Uuid::new_v4();
        let bson = uuid_to_bson(uuid);
        assert_eq!(bson_to_uuid(&bson).unwrap(), uuid);
        assert_eq!(bson_to_uuid(&Bson::String(uuid.to_string())).unwrap(), uuid);
        assert!(bson_to_uuid(&Bson::Int32(1)).is_err());
    }
}
