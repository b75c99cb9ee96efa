//! Identity Store client interface.
//!
//! The Identity Store is an external collaborator: it issues and validates
//! credentials and holds role and permission records. This service treats it
//! as opaque and only talks to the operations below. The production client
//! lives in [`client`]; tests substitute their own implementation.

use async_trait::async_trait;
use std::collections::BTreeSet;
use uuid::Uuid;

pub mod client;
pub mod models;

pub use client::HttpIdentityStore;
pub use models::{Credential, Role};

/// Errors surfaced by the Identity Store.
///
/// Authentication and authorization failures are expected outcomes and map to
/// anonymous/redirect decisions upstream; only `Unreachable` is treated as a
/// genuine backend failure.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Bad email/password at sign-in. Surfaced to the user; no session created.
    #[error("invalid email or password")]
    InvalidCredentials,
    /// The presented access/refresh tokens no longer form a valid session.
    #[error("session expired or invalid")]
    SessionExpired,
    /// The refresh token was rejected while renewing a session.
    #[error("session refresh failed")]
    RefreshFailed,
    /// The user exists but no role record could be resolved.
    #[error("role lookup failed for user {0}")]
    RoleLookupFailed(Uuid),
    /// The store answered with something the client cannot interpret.
    #[error("unexpected identity store response: {0}")]
    Malformed(String),
    /// Transport-level failure talking to the store.
    #[error("identity store unreachable")]
    Unreachable(#[from] reqwest::Error),
}

/// Operations the gate needs from the Identity Store.
///
/// Kept object safe so handlers hold an `Arc<dyn IdentityStore>` and tests
/// can swap in a mock.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Exchange email/password for a credential pair.
    async fn authenticate(&self, email: &str, password: &str)
        -> Result<Credential, IdentityError>;

    /// Renew a session from its refresh token.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Credential, IdentityError>;

    /// Validate and establish a session from transport-level tokens.
    async fn establish(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Credential, IdentityError>;

    /// Resolve the single role attached to a user.
    async fn user_role(&self, user_id: Uuid) -> Result<Role, IdentityError>;

    /// Fetch the per-admin route allow-list.
    async fn admin_permitted_routes(
        &self,
        admin_id: Uuid,
    ) -> Result<BTreeSet<String>, IdentityError>;

    /// Invalidate the session upstream. Best effort; callers never block the
    /// user-visible sign-out on this.
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;
}
