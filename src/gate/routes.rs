//! Route surface the gate protects.
//!
//! Path checks are literal prefix containment, never pattern matching.

/// Public entry path carrying the login and step-up UI.
pub const ENTRY_PATH: &str = "/";
/// Admin area prefix.
pub const ADMIN_PREFIX: &str = "/admin";
/// Employee area prefix.
pub const EMPLOYEE_PREFIX: &str = "/employee";
/// Default destination for admins; always permitted regardless of allow-list.
pub const ADMIN_DASHBOARD: &str = "/admin/dashboard";
/// Destination for employees after sign-in.
pub const EMPLOYEE_DASHBOARD: &str = "/employee/dashboard";

/// Whether a path falls under either protected area.
#[must_use]
pub fn is_protected(path: &str) -> bool {
    path.starts_with(ADMIN_PREFIX) || path.starts_with(EMPLOYEE_PREFIX)
}

/// Normalize a route path for allow-list membership checks.
///
/// Trailing slashes are stripped so `/admin/orders/` and `/admin/orders`
/// compare equal; the root path stays `/`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.len() > 1 {
        trimmed.trim_end_matches('/').to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_prefixes() {
        assert!(is_protected("/admin"));
        assert!(is_protected("/admin/orders"));
        assert!(is_protected("/employee/dashboard"));
        assert!(!is_protected("/"));
        assert!(!is_protected("/health"));
        assert!(!is_protected("/v1/auth/signin"));
    }

    #[test]
    fn prefix_containment_is_literal() {
        // No pattern matching: these share the literal prefix.
        assert!(is_protected("/administrators"));
    }

    #[test]
    fn normalize_strips_trailing_slash() {
        assert_eq!(normalize_path("/admin/orders/"), "/admin/orders");
        assert_eq!(normalize_path("/admin/orders"), "/admin/orders");
        assert_eq!(normalize_path(" /admin/orders "), "/admin/orders");
        assert_eq!(normalize_path("/"), "/");
    }
}
