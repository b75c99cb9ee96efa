//! Credential and role types resolved from the Identity Store.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use utoipa::ToSchema;
use uuid::Uuid;

/// A credential pair as issued by the Identity Store.
///
/// Held only for the duration of one request; the cookies are the sole
/// persistent copy. `expires_at` is a unix timestamp in seconds.
#[derive(Clone, Debug)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user_id: Uuid,
}

impl Credential {
    /// Seconds until expiry, clamped at zero.
    #[must_use]
    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at - unix_now()).max(0)
    }
}

/// Exactly one role per user. `superadmin` bypasses admin allow-lists.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Admin,
    Superadmin,
}

impl Role {
    /// Parse the role string stored in the Identity Store.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "employee" => Some(Self::Employee),
            "admin" => Some(Self::Admin),
            "superadmin" => Some(Self::Superadmin),
            _ => None,
        }
    }

    /// Admin roles must complete device verification before entering the
    /// admin area.
    #[must_use]
    pub fn requires_step_up(self) -> bool {
        matches!(self, Self::Admin | Self::Superadmin)
    }

    /// The dashboard a role lands on after sign-in.
    #[must_use]
    pub fn dashboard(self) -> &'static str {
        match self {
            Self::Employee => crate::gate::routes::EMPLOYEE_DASHBOARD,
            Self::Admin | Self::Superadmin => crate::gate::routes::ADMIN_DASHBOARD,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
        }
    }
}

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Read the `exp` claim from a JWT access token without verifying it.
///
/// Used only to schedule proactive refresh; validity is always decided by the
/// Identity Store, never by this claim.
#[must_use]
pub fn token_expiry(access_token: &str) -> Option<i64> {
    let payload = access_token.split('.').nth(1)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.as_bytes())
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    claims.get("exp").and_then(serde_json::Value::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn token_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"sub":"x"}}"#).as_bytes());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn role_parse_round_trips() {
        for role in [Role::Employee, Role::Admin, Role::Superadmin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse(" admin "), Some(Role::Admin));
        assert_eq!(Role::parse("owner"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn step_up_required_for_admin_roles_only() {
        assert!(!Role::Employee.requires_step_up());
        assert!(Role::Admin.requires_step_up());
        assert!(Role::Superadmin.requires_step_up());
    }

    #[test]
    fn dashboards_per_role() {
        assert_eq!(Role::Employee.dashboard(), "/employee/dashboard");
        assert_eq!(Role::Admin.dashboard(), "/admin/dashboard");
        assert_eq!(Role::Superadmin.dashboard(), "/admin/dashboard");
    }

    #[test]
    fn token_expiry_reads_exp_claim() {
        assert_eq!(token_expiry(&token_with_exp(1_900_000_000)), Some(1_900_000_000));
    }

    #[test]
    fn token_expiry_rejects_garbage() {
        assert_eq!(token_expiry("not-a-jwt"), None);
        assert_eq!(token_expiry("a.b.c"), None);
        assert_eq!(token_expiry(""), None);
    }

    #[test]
    fn seconds_until_expiry_clamps_at_zero() {
        let expired = Credential {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: unix_now() - 100,
            user_id: Uuid::new_v4(),
        };
        assert_eq!(expired.seconds_until_expiry(), 0);

        let fresh = Credential {
            expires_at: unix_now() + 600,
            ..expired
        };
        assert!(fresh.seconds_until_expiry() > 590);
    }
}
