//! Field and collection naming strategies.

use std::sync::Arc;

use convert_case::{Case, Casing};

use crate::descriptor::TypeDescriptor;

/// Document field name used for the identity property.
pub const ID_FIELD: &str = "_id";

/// Derives a collection name from a type descriptor.
pub type CollectionNaming = Arc<dyn Fn(&TypeDescriptor) -> String + Send + Sync>;

/// Default transform applied to member names without an explicit field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldNaming {
    /// Use the member name unchanged.
    #[default]
    AsIs,
    /// `created_at` becomes `createdAt`.
    CamelCase,
    /// `createdAt` becomes `created_at`.
    SnakeCase,
    /// `created_at` becomes `CreatedAt`.
    PascalCase,
}

impl FieldNaming {
    /// Apply the strategy to a member name.
    pub fn field_name(&self, member: &str) -> String {
        match self {
            Self::AsIs => member.to_string(),
            Self::CamelCase => member.to_case(Case::Camel),
            Self::SnakeCase => member.to_case(Case::Snake),
            Self::PascalCase => member.to_case(Case::Pascal),
        }
    }
}

/// Lower-case the first character: `Person` becomes `person`.
pub fn uncapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_naming() {
        assert_eq!(FieldNaming::AsIs.field_name("created_at"), "created_at");
        assert_eq!(FieldNaming::CamelCase.field_name("created_at"), "createdAt");
        assert_eq!(FieldNaming::SnakeCase.field_name("createdAt"), "created_at");
        assert_eq!(FieldNaming::PascalCase.field_name("created_at"), "CreatedAt");
    }

    #[test]
    fn test_uncapitalize() {
        assert_eq!(uncapitalize("Person"), "person");
        assert_eq!(uncapitalize("GeoLocation"), "geoLocation");
        assert_eq!(uncapitalize(""), "");
    }
}
