//! Search filter construction.
//!
//! Combines request-level category exclusion with an externally built
//! security filter into the opaque filter expression the search backend
//! consumes. Security filter construction itself (document-level access
//! control from auth claims) is a collaborator behind a trait.

use serde_json::Value;

/// Claims extracted from the caller's authentication token.
pub type AuthClaims = serde_json::Map<String, Value>;

/// Trait for security filter construction.
///
/// Implementations turn auth claims into a document-visibility filter
/// expression, or `None` when access control is disabled.
pub trait SecurityFilterBuilder: Send + Sync {
    /// Build the security filter for the given claims.
    fn build_security_filter(&self, claims: &AuthClaims) -> Option<String>;
}

/// No-op filter builder for deployments without document access control.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecurityFilter;

impl SecurityFilterBuilder for NoSecurityFilter {
    fn build_security_filter(&self, _claims: &AuthClaims) -> Option<String> {
        None
    }
}

/// Combine category exclusion and security filtering into one expression.
///
/// Returns `None` when there is nothing to filter. Single quotes in the
/// category name are doubled so it can be embedded in the expression.
pub fn build_filter(
    exclude_category: Option<&str>,
    security_filter: Option<String>,
) -> Option<String> {
    let mut filters = Vec::new();

    if let Some(category) = exclude_category {
        filters.push(format!("category ne '{}'", category.replace('\'', "''")));
    }

    if let Some(security) = security_filter {
        filters.push(security);
    }

    if filters.is_empty() {
        None
    } else {
        Some(filters.join(" and "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filters() {
        assert_eq!(build_filter(None, None), None);
    }

    #[test]
    fn test_category_only() {
        assert_eq!(
            build_filter(Some("internal"), None),
            Some("category ne 'internal'".to_string())
        );
    }

    #[test]
    fn test_category_quote_escaping() {
        assert_eq!(
            build_filter(Some("bob's docs"), None),
            Some("category ne 'bob''s docs'".to_string())
        );
    }

    #[test]
    fn test_combined_filters() {
        assert_eq!(
            build_filter(Some("internal"), Some("oids/any(g: g eq 'u1')".to_string())),
            Some("category ne 'internal' and oids/any(g: g eq 'u1')".to_string())
        );
    }

    #[test]
    fn test_security_only() {
        assert_eq!(
            build_filter(None, Some("groups/any(g: g eq 'g1')".to_string())),
            Some("groups/any(g: g eq 'g1')".to_string())
        );
    }

    #[test]
    fn test_no_security_filter_builder() {
        let builder = NoSecurityFilter;
        assert_eq!(builder.build_security_filter(&AuthClaims::new()), None);
    }
}
