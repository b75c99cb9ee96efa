//! Access control evaluation.
//!
//! A pure decision over (principal, step-up state, path). Everything here is
//! synchronous and side-effect free; the middleware applies the outcome.
//!
//! Path checks are literal prefix containment. Allow-list membership uses
//! normalized paths. The admin-without-step-up case is the one deliberate
//! escalation: touching the admin area before completing verification costs
//! the whole session, not just the page.

use super::principal::Principal;
use super::routes;
use super::stepup::StepUpStatus;

/// Outcome of evaluating one request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Access {
    /// Let the request through to its handler.
    Allow,
    /// Send the client elsewhere; no state changes.
    Redirect(String),
    /// Denial escalated to full sign-out: clear all credential state, then
    /// redirect. Produced when an unverified admin touches the admin area.
    Revoke(String),
}

/// Evaluate a request against the route surface.
#[must_use]
pub fn authorize(principal: Option<&Principal>, step_up: StepUpStatus, path: &str) -> Access {
    // Privilege use without completed step-up is punished, not deferred.
    if let Some(principal) = principal {
        if principal.role.requires_step_up()
            && !step_up.verified()
            && path.starts_with(routes::ADMIN_PREFIX)
        {
            return Access::Revoke(routes::ENTRY_PATH.to_string());
        }
    }

    let Some(principal) = principal else {
        if routes::is_protected(path) {
            return Access::Redirect(routes::ENTRY_PATH.to_string());
        }
        return Access::Allow;
    };

    if path == routes::ENTRY_PATH {
        // Authenticated users skip the login page, except admins mid step-up
        // who stay to complete verification.
        return if step_up.verified() {
            Access::Redirect(principal.role.dashboard().to_string())
        } else {
            Access::Allow
        };
    }

    if path.starts_with(routes::ADMIN_PREFIX) {
        return match principal.role {
            crate::identity::Role::Employee => {
                Access::Redirect(routes::EMPLOYEE_DASHBOARD.to_string())
            }
            crate::identity::Role::Superadmin => Access::Allow,
            crate::identity::Role::Admin => {
                let normalized = routes::normalize_path(path);
                if principal.permits(&normalized) {
                    Access::Allow
                } else {
                    Access::Redirect(routes::ADMIN_DASHBOARD.to_string())
                }
            }
        };
    }

    if path.starts_with(routes::EMPLOYEE_PREFIX) {
        return if principal.role == crate::identity::Role::Employee {
            Access::Allow
        } else {
            Access::Redirect(routes::ADMIN_DASHBOARD.to_string())
        };
    }

    Access::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use uuid::Uuid;

    fn principal(role: Role) -> Principal {
        Principal::new(Uuid::new_v4(), role)
    }

    fn admin_with_routes(paths: &[&str]) -> Principal {
        let mut principal = principal(Role::Admin);
        principal.permitted_routes = paths.iter().map(ToString::to_string).collect();
        principal
    }

    #[test]
    fn anonymous_protected_paths_redirect_to_entry() {
        for path in ["/admin", "/admin/dashboard", "/employee/dashboard", "/employee/profile"] {
            assert_eq!(
                authorize(None, StepUpStatus::NotRequired, path),
                Access::Redirect("/".to_string()),
                "path {path}"
            );
        }
    }

    #[test]
    fn anonymous_public_paths_allowed() {
        for path in ["/", "/health", "/v1/auth/signin"] {
            assert_eq!(authorize(None, StepUpStatus::NotRequired, path), Access::Allow);
        }
    }

    #[test]
    fn employee_never_enters_admin_area() {
        let employee = principal(Role::Employee);
        for path in ["/admin", "/admin/dashboard", "/admin/orders"] {
            assert_eq!(
                authorize(Some(&employee), StepUpStatus::NotRequired, path),
                Access::Redirect("/employee/dashboard".to_string()),
                "path {path}"
            );
        }
    }

    #[test]
    fn admin_never_enters_employee_area() {
        let admin = admin_with_routes(&[]);
        assert_eq!(
            authorize(Some(&admin), StepUpStatus::RequiredVerified, "/employee/profile"),
            Access::Redirect("/admin/dashboard".to_string())
        );
        let superadmin = principal(Role::Superadmin);
        assert_eq!(
            authorize(Some(&superadmin), StepUpStatus::RequiredVerified, "/employee/dashboard"),
            Access::Redirect("/admin/dashboard".to_string())
        );
    }

    #[test]
    fn admin_outside_allow_list_falls_back_to_dashboard() {
        let admin = admin_with_routes(&["/admin/orders"]);
        assert_eq!(
            authorize(Some(&admin), StepUpStatus::RequiredVerified, "/admin/orders"),
            Access::Allow
        );
        assert_eq!(
            authorize(Some(&admin), StepUpStatus::RequiredVerified, "/admin/orders/"),
            Access::Allow,
            "trailing slash normalizes into the allow-list"
        );
        assert_eq!(
            authorize(Some(&admin), StepUpStatus::RequiredVerified, "/admin/students"),
            Access::Redirect("/admin/dashboard".to_string())
        );
    }

    #[test]
    fn admin_dashboard_always_reachable_for_verified_admin() {
        let admin = admin_with_routes(&[]);
        assert_eq!(
            authorize(Some(&admin), StepUpStatus::RequiredVerified, "/admin/dashboard"),
            Access::Allow
        );
    }

    #[test]
    fn superadmin_bypasses_allow_lists() {
        let superadmin = principal(Role::Superadmin);
        for path in ["/admin/dashboard", "/admin/accounts", "/admin/uniform-configuration"] {
            assert_eq!(
                authorize(Some(&superadmin), StepUpStatus::RequiredVerified, path),
                Access::Allow,
                "path {path}"
            );
        }
    }

    #[test]
    fn unverified_admin_touching_admin_area_is_revoked() {
        let admin = admin_with_routes(&["/admin/orders"]);
        for path in ["/admin", "/admin/dashboard", "/admin/orders"] {
            assert_eq!(
                authorize(Some(&admin), StepUpStatus::RequiredUnverified, path),
                Access::Revoke("/".to_string()),
                "path {path}"
            );
        }
        let superadmin = principal(Role::Superadmin);
        assert_eq!(
            authorize(Some(&superadmin), StepUpStatus::RequiredUnverified, "/admin/dashboard"),
            Access::Revoke("/".to_string())
        );
    }

    #[test]
    fn unverified_admin_stays_on_entry_path() {
        let admin = admin_with_routes(&[]);
        assert_eq!(
            authorize(Some(&admin), StepUpStatus::RequiredUnverified, "/"),
            Access::Allow
        );
    }

    #[test]
    fn verified_users_skip_the_entry_path() {
        let admin = admin_with_routes(&[]);
        assert_eq!(
            authorize(Some(&admin), StepUpStatus::RequiredVerified, "/"),
            Access::Redirect("/admin/dashboard".to_string())
        );
        let employee = principal(Role::Employee);
        assert_eq!(
            authorize(Some(&employee), StepUpStatus::NotRequired, "/"),
            Access::Redirect("/employee/dashboard".to_string())
        );
    }

    #[test]
    fn authenticated_users_pass_unrelated_paths() {
        let employee = principal(Role::Employee);
        assert_eq!(
            authorize(Some(&employee), StepUpStatus::NotRequired, "/v1/auth/session"),
            Access::Allow
        );
        let admin = admin_with_routes(&[]);
        assert_eq!(
            authorize(Some(&admin), StepUpStatus::RequiredUnverified, "/v1/auth/stepup/finish"),
            Access::Allow,
            "step-up endpoints stay reachable mid-verification"
        );
    }
}
