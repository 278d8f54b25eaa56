//! Bean-property expressions for collection names.
//!
//! A collection attribute of the form `@(beanName).propertyName` is not a
//! literal: it is evaluated against an [`ExpressionContext`] supplied by the
//! surrounding application.

use std::collections::HashMap;

use smol_str::SmolStr;

/// Resolves bean properties referenced by collection expressions.
pub trait ExpressionContext: Send + Sync {
    /// Look up `property` on the bean registered as `bean`.
    fn property(&self, bean: &str, property: &str) -> Option<String>;
}

impl<F> ExpressionContext for F
where
    F: Fn(&str, &str) -> Option<String> + Send + Sync,
{
    fn property(&self, bean: &str, property: &str) -> Option<String> {
        self(bean, property)
    }
}

/// A parsed `@(bean).property` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeanExpression<'a> {
    /// Bean name inside the parentheses.
    pub bean: &'a str,
    /// Property read from the bean.
    pub property: &'a str,
}

impl<'a> BeanExpression<'a> {
    /// Parse an expression; returns `None` for literals.
    pub fn parse(source: &'a str) -> Option<Self> {
        let rest = source.trim().strip_prefix("@(")?;
        let close = rest.find(')')?;
        let bean = rest[..close].trim();
        let property = rest[close + 1..].strip_prefix('.')?.trim();

        if bean.is_empty() || !is_identifier(property) {
            return None;
        }

        Some(Self { bean, property })
    }

    /// Evaluate against a context.
    pub fn evaluate(&self, context: &dyn ExpressionContext) -> Option<String> {
        context.property(self.bean, self.property)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// In-memory bean registry: named beans exposing string properties.
#[derive(Debug, Clone, Default)]
pub struct BeanRegistry {
    beans: HashMap<SmolStr, HashMap<SmolStr, String>>,
}

impl BeanRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bean property.
    pub fn with_property(
        mut self,
        bean: impl Into<SmolStr>,
        property: impl Into<SmolStr>,
        value: impl Into<String>,
    ) -> Self {
        self.insert(bean, property, value);
        self
    }

    /// Register a bean property in place.
    pub fn insert(
        &mut self,
        bean: impl Into<SmolStr>,
        property: impl Into<SmolStr>,
        value: impl Into<String>,
    ) {
        self.beans
            .entry(bean.into())
            .or_default()
            .insert(property.into(), value.into());
    }

    /// Whether a bean with this name exists.
    pub fn contains_bean(&self, bean: &str) -> bool {
        self.beans.contains_key(bean)
    }
}

impl ExpressionContext for BeanRegistry {
    fn property(&self, bean: &str, property: &str) -> Option<String> {
        self.beans.get(bean)?.get(property).cloned()
    }
}
