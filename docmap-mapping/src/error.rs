//! Error types for entity mapping.

use miette::Diagnostic;
use thiserror::Error;

/// Result type for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;

/// Errors raised while building mapping metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum MappingError {
    /// More than one member carries an explicit id marker.
    #[error("entity `{type_name}` declares multiple id properties: `{first}` and `{second}`")]
    #[diagnostic(
        code(docmap::mapping::multiple_ids),
        help("keep `#[docmap(id)]` on exactly one field")
    )]
    MultipleIds {
        type_name: String,
        first: String,
        second: String,
    },

    /// A declared property order is negative.
    #[error("property `{type_name}.{property}` declares negative order {order}")]
    #[diagnostic(
        code(docmap::mapping::negative_order),
        help("property order must be zero or greater")
    )]
    NegativeOrder {
        type_name: String,
        property: String,
        order: i32,
    },

    /// A type filter expression could not be resolved.
    #[error("cannot resolve `{expression}`: {message}")]
    #[diagnostic(code(docmap::mapping::type_resolution))]
    TypeResolution { expression: String, message: String },
}

impl MappingError {
    /// Create a multiple-id error.
    pub fn multiple_ids(
        type_name: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::MultipleIds {
            type_name: type_name.into(),
            first: first.into(),
            second: second.into(),
        }
    }

    /// Create a negative-order error.
    pub fn negative_order(
        type_name: impl Into<String>,
        property: impl Into<String>,
        order: i32,
    ) -> Self {
        Self::NegativeOrder {
            type_name: type_name.into(),
            property: property.into(),
            order,
        }
    }

    /// Create a type resolution error.
    pub fn type_resolution(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TypeResolution {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Check if this error is an out-of-range order.
    pub fn is_range_error(&self) -> bool {
        matches!(self, Self::NegativeOrder { .. })
    }
}
