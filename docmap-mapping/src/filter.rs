//! Candidate type selection over a registry of mapped types.
//!
//! Each filter resolves its target from a string expression when it is
//! constructed. A filter whose target cannot be resolved logs the failure
//! and matches nothing; [`TypeFilter::matches`] never fails.

use std::any::TypeId;

use regex_lite::Regex;
use tracing::error;

use crate::descriptor::{MappedType, TypeDescriptor};
use crate::entity::has_marker_inherited;
use crate::error::MappingError;

/// Decides whether a type is a mapping candidate.
pub trait TypeFilter: Send + Sync {
    /// Check a descriptor against the filter.
    fn matches(&self, descriptor: &TypeDescriptor) -> bool;
}

/// The universe of known mapped types.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`.
    pub fn register<T: MappedType>(&mut self) -> &mut Self {
        self.register_descriptor(T::descriptor())
    }

    /// Register a descriptor; duplicates are ignored.
    pub fn register_descriptor(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        if !self.types.iter().any(|t| t.type_id() == descriptor.type_id()) {
            self.types.push(descriptor);
        }
        self
    }

    /// Find a type by simple or fully qualified name.
    pub fn find(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types
            .iter()
            .find(|t| t.type_name() == name)
            .or_else(|| self.types.iter().find(|t| t.name() == name))
    }

    /// Whether any registered type declares the interface.
    pub fn knows_interface(&self, interface: &str) -> bool {
        self.types
            .iter()
            .any(|t| t.implements().iter().any(|i| *i == interface))
    }

    /// Whether any registered type (or its bases) declares the marker.
    pub fn knows_marker(&self, marker: &str) -> bool {
        self.types.iter().any(|t| has_marker_inherited(t, marker))
    }

    /// All registered types in registration order.
    pub fn types(&self) -> &[TypeDescriptor] {
        &self.types
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Types matching any include filter and no exclude filter.
    pub fn scan<'a>(
        &'a self,
        includes: &[&dyn TypeFilter],
        excludes: &[&dyn TypeFilter],
    ) -> Vec<&'a TypeDescriptor> {
        self.types
            .iter()
            .filter(|t| !t.is_simple())
            .filter(|t| includes.iter().any(|f| f.matches(t)))
            .filter(|t| !excludes.iter().any(|f| f.matches(t)))
            .collect()
    }
}

#[derive(Debug, Clone)]
enum AssignableTarget {
    Type(TypeId),
    Interface(String),
}

/// Matches types assignable to a named type or interface.
///
/// Only the type itself, its declared interfaces and its direct bases are
/// compared; the hierarchy is not walked further.
#[derive(Debug, Clone)]
pub struct AssignableTypeFilter {
    target: Option<AssignableTarget>,
    error: Option<MappingError>,
}

impl AssignableTypeFilter {
    /// Resolve `expression` against the registry.
    pub fn new(expression: &str, registry: &TypeRegistry) -> Self {
        let name = expression.trim();
        if let Some(descriptor) = registry.find(name) {
            return Self::resolved(AssignableTarget::Type(descriptor.type_id()));
        }
        if registry.knows_interface(name) {
            return Self::resolved(AssignableTarget::Interface(name.to_string()));
        }
        Self::unresolved(MappingError::type_resolution(
            expression,
            "no registered type or interface has this name",
        ))
    }

    /// Target a concrete type directly.
    pub fn for_type<T: 'static>() -> Self {
        Self::resolved(AssignableTarget::Type(TypeId::of::<T>()))
    }

    fn resolved(target: AssignableTarget) -> Self {
        Self {
            target: Some(target),
            error: None,
        }
    }

    fn unresolved(err: MappingError) -> Self {
        error!(error = %err, "assignable type filter disabled");
        Self {
            target: None,
            error: Some(err),
        }
    }

    /// The resolution failure, if any.
    pub fn error(&self) -> Option<&MappingError> {
        self.error.as_ref()
    }
}

impl TypeFilter for AssignableTypeFilter {
    fn matches(&self, descriptor: &TypeDescriptor) -> bool {
        match &self.target {
            None => false,
            Some(AssignableTarget::Type(type_id)) => {
                descriptor.type_id() == *type_id
                    || descriptor.bases().any(|b| b.type_id() == *type_id)
            }
            Some(AssignableTarget::Interface(name)) => {
                descriptor.implements().iter().any(|i| *i == name.as_str())
            }
        }
    }
}

/// Matches types carrying a named marker attribute.
#[derive(Debug, Clone)]
pub struct AttributeTypeFilter {
    marker: Option<String>,
    consider_inherited: bool,
    error: Option<MappingError>,
}

impl AttributeTypeFilter {
    /// Resolve `expression` against the markers known to the registry.
    pub fn new(expression: &str, registry: &TypeRegistry) -> Self {
        let marker = expression.trim();
        if registry.knows_marker(marker) {
            return Self {
                marker: Some(marker.to_string()),
                consider_inherited: true,
                error: None,
            };
        }

        let err =
            MappingError::type_resolution(expression, "no registered type declares this marker");
        error!(error = %err, "attribute type filter disabled");
        Self {
            marker: None,
            consider_inherited: true,
            error: Some(err),
        }
    }

    /// Only look at markers declared on the type itself.
    pub fn direct_only(mut self) -> Self {
        self.consider_inherited = false;
        self
    }

    /// The resolution failure, if any.
    pub fn error(&self) -> Option<&MappingError> {
        self.error.as_ref()
    }
}

impl TypeFilter for AttributeTypeFilter {
    fn matches(&self, descriptor: &TypeDescriptor) -> bool {
        let Some(marker) = &self.marker else {
            return false;
        };
        if self.consider_inherited {
            has_marker_inherited(descriptor, marker)
        } else {
            descriptor.has_marker(marker)
        }
    }
}

/// Matches types whose fully qualified name matches a pattern.
#[derive(Debug, Clone)]
pub struct NamePatternTypeFilter {
    pattern: Option<Regex>,
    error: Option<MappingError>,
}

impl NamePatternTypeFilter {
    /// Compile the pattern; it must match the whole name.
    pub fn new(pattern: &str) -> Self {
        match Regex::new(&format!("^(?:{pattern})$")) {
            Ok(regex) => Self {
                pattern: Some(regex),
                error: None,
            },
            Err(e) => {
                let err = MappingError::type_resolution(pattern, e.to_string());
                error!(error = %err, "name pattern type filter disabled");
                Self {
                    pattern: None,
                    error: Some(err),
                }
            }
        }
    }

    /// The resolution failure, if any.
    pub fn error(&self) -> Option<&MappingError> {
        self.error.as_ref()
    }
}

impl TypeFilter for NamePatternTypeFilter {
    fn matches(&self, descriptor: &TypeDescriptor) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|p| p.is_match(descriptor.type_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DOCUMENT_MARKER, FieldDescriptor};

    struct Auditable;
    impl MappedType for Auditable {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<Auditable>("Auditable").with_marker("Audited")
        }
    }

    struct Invoice;
    impl MappedType for Invoice {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<Invoice>("Invoice")
                .with_marker(DOCUMENT_MARKER)
                .with_implements("Billable")
                .with_field(
                    FieldDescriptor::new("audit", "Auditable")
                        .flatten()
                        .target(Auditable::descriptor),
                )
        }
    }

    struct Customer;
    impl MappedType for Customer {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::of::<Customer>("Customer").with_marker(DOCUMENT_MARKER)
        }
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register::<Auditable>()
            .register::<Invoice>()
            .register::<Customer>()
            .register::<String>();
        registry
    }

    #[test]
    fn test_assignable_to_interface() {
        let registry = registry();
        let filter = AssignableTypeFilter::new("Billable", &registry);
        assert!(filter.error().is_none());
        assert!(filter.matches(&Invoice::descriptor()));
        assert!(!filter.matches(&Customer::descriptor()));
    }

    #[test]
    fn test_assignable_to_base_type() {
        let registry = registry();
        let filter = AssignableTypeFilter::new("Auditable", &registry);
        assert!(filter.matches(&Auditable::descriptor()));
        assert!(filter.matches(&Invoice::descriptor()));
        assert!(!filter.matches(&Customer::descriptor()));
    }

    #[test]
    fn test_unresolvable_filters_match_nothing() {
        let registry = registry();
        let filter = AssignableTypeFilter::new("Missing", &registry);
        assert!(filter.error().is_some());
        assert!(!filter.matches(&Invoice::descriptor()));

        let filter = AttributeTypeFilter::new("Unknown", &registry);
        assert!(filter.error().is_some());
        assert!(!filter.matches(&Invoice::descriptor()));

        let filter = NamePatternTypeFilter::new("([unclosed");
        assert!(filter.error().is_some());
        assert!(!filter.matches(&Invoice::descriptor()));
    }

    #[test]
    fn test_attribute_filter_considers_inherited() {
        let registry = registry();
        let filter = AttributeTypeFilter::new("Audited", &registry);
        assert!(filter.matches(&Invoice::descriptor()));
        assert!(!filter.clone().direct_only().matches(&Invoice::descriptor()));
        assert!(!filter.matches(&Customer::descriptor()));
    }

    #[test]
    fn test_name_pattern_filter() {
        let filter = NamePatternTypeFilter::new(r".*::Invoice");
        assert!(filter.matches(&Invoice::descriptor()));
        assert!(!filter.matches(&Customer::descriptor()));
    }

    #[test]
    fn test_scan() {
        let registry = registry();
        let documents = AttributeTypeFilter::new(DOCUMENT_MARKER, &registry).direct_only();
        let billable = AssignableTypeFilter::new("Billable", &registry);

        let found = registry.scan(&[&documents], &[&billable]);
        let names: Vec<_> = found.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Customer"]);
    }
}
