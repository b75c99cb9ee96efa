//! The resolved identity for the current request.

use std::collections::BTreeSet;
use uuid::Uuid;

use crate::identity::Role;

/// Identity + role derived fresh from transport input on every request.
///
/// Never cached across requests; the middleware inserts it into request
/// extensions and downstream handlers borrow it from there.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    /// Per-admin route allow-list. Populated for `admin` only; `superadmin`
    /// bypasses allow-lists and employees have no admin surface at all.
    pub permitted_routes: BTreeSet<String>,
}

impl Principal {
    #[must_use]
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role,
            permitted_routes: BTreeSet::new(),
        }
    }

    /// Whether a normalized admin path is inside this admin's allow-list.
    /// The admin dashboard is always permitted.
    #[must_use]
    pub fn permits(&self, normalized_path: &str) -> bool {
        normalized_path == crate::gate::routes::ADMIN_DASHBOARD
            || self.permitted_routes.contains(normalized_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_always_permitted() {
        let principal = Principal::new(Uuid::new_v4(), Role::Admin);
        assert!(principal.permits("/admin/dashboard"));
        assert!(!principal.permits("/admin/orders"));
    }

    #[test]
    fn allow_list_membership_is_exact() {
        let mut principal = Principal::new(Uuid::new_v4(), Role::Admin);
        principal.permitted_routes.insert("/admin/orders".to_string());
        assert!(principal.permits("/admin/orders"));
        assert!(!principal.permits("/admin/orders/new"));
    }
}
