//! Step-up verification gate.
//!
//! Flow Overview:
//! - Password sign-in for an admin role arms the gate: the credential is
//!   issued but no marker exists, so the state is `RequiredUnverified`.
//! - Completing device verification mints a random marker token; the cookie
//!   carries the raw token and the database stores its hash, scoped to the
//!   same lifetime as the access credential.
//! - Sign-out, new sign-in and verification failure all clear markers, so a
//!   marker never survives across sign-in sessions.
//!
//! Security boundaries: the marker is validated against server-side state on
//! every request; a bare cookie value grants nothing. Lookup failures count
//! as unverified.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::HeaderMap;
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use super::cookies;
use crate::gate::Principal;
use crate::identity::models::unix_now;

/// Where the current request stands with respect to step-up verification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepUpStatus {
    /// Role never needs step-up (employee).
    NotRequired,
    /// Admin role signed in but device verification has not completed.
    RequiredUnverified,
    /// Admin role with a valid marker for this sign-in session.
    RequiredVerified,
}

impl StepUpStatus {
    #[must_use]
    pub fn verified(self) -> bool {
        matches!(self, Self::NotRequired | Self::RequiredVerified)
    }
}

/// Server-side storage for step-up markers.
///
/// Split behind a trait so the middleware can run against Postgres in
/// production and an in-memory table in tests.
#[async_trait]
pub trait StepUpStore: Send + Sync {
    /// Record a marker hash for a user, replacing any previous marker.
    async fn insert_marker(
        &self,
        user_id: Uuid,
        token_hash: Vec<u8>,
        expires_at_unix: i64,
    ) -> Result<()>;

    /// Whether an unexpired marker with this hash exists for the user.
    async fn marker_valid(&self, user_id: Uuid, token_hash: &[u8]) -> Result<bool>;

    /// Remove every marker for the user.
    async fn clear_markers(&self, user_id: Uuid) -> Result<()>;
}

/// Postgres-backed marker storage.
pub struct PgStepUpStore {
    pool: PgPool,
}

impl PgStepUpStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StepUpStore for PgStepUpStore {
    async fn insert_marker(
        &self,
        user_id: Uuid,
        token_hash: Vec<u8>,
        expires_at_unix: i64,
    ) -> Result<()> {
        // One marker per user: a fresh verification invalidates older ones.
        let mut tx = self.pool.begin().await.context("begin marker transaction")?;
        sqlx::query("DELETE FROM step_up_markers WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("failed to clear previous step-up markers")?;
        sqlx::query(
            r"
            INSERT INTO step_up_markers (user_id, token_hash, expires_at_unix)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at_unix)
        .execute(&mut *tx)
        .await
        .context("failed to insert step-up marker")?;
        tx.commit().await.context("commit marker transaction")?;
        Ok(())
    }

    async fn marker_valid(&self, user_id: Uuid, token_hash: &[u8]) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            r"
            SELECT expires_at_unix FROM step_up_markers
            WHERE user_id = $1 AND token_hash = $2
            ",
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up step-up marker")?;

        Ok(row.is_some_and(|(expires_at,)| expires_at > unix_now()))
    }

    async fn clear_markers(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM step_up_markers WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("failed to clear step-up markers")?;
        Ok(())
    }
}

/// In-memory marker storage for tests and local development.
#[derive(Default)]
pub struct MemoryStepUpStore {
    markers: Mutex<HashMap<Uuid, (Vec<u8>, i64)>>,
}

#[async_trait]
impl StepUpStore for MemoryStepUpStore {
    async fn insert_marker(
        &self,
        user_id: Uuid,
        token_hash: Vec<u8>,
        expires_at_unix: i64,
    ) -> Result<()> {
        self.markers
            .lock()
            .await
            .insert(user_id, (token_hash, expires_at_unix));
        Ok(())
    }

    async fn marker_valid(&self, user_id: Uuid, token_hash: &[u8]) -> Result<bool> {
        Ok(self
            .markers
            .lock()
            .await
            .get(&user_id)
            .is_some_and(|(hash, expires_at)| hash == token_hash && *expires_at > unix_now()))
    }

    async fn clear_markers(&self, user_id: Uuid) -> Result<()> {
        self.markers.lock().await.remove(&user_id);
        Ok(())
    }
}

/// Create a new step-up marker token.
/// The raw value only travels in the cookie; storage sees the hash.
///
/// # Errors
/// Returns an error if the system RNG fails.
pub fn generate_marker_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate step-up marker token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a marker token so raw values never touch the database.
#[must_use]
pub fn hash_marker_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Derive the request's step-up status from the marker cookie.
///
/// Fail closed: a missing cookie, a lookup error or an expired marker all
/// count as unverified.
pub async fn status(
    store: &dyn StepUpStore,
    principal: &Principal,
    headers: &HeaderMap,
) -> StepUpStatus {
    if !principal.role.requires_step_up() {
        return StepUpStatus::NotRequired;
    }

    let Some(token) = cookies::get(headers, cookies::STEP_UP_COOKIE) else {
        return StepUpStatus::RequiredUnverified;
    };

    let token_hash = hash_marker_token(&token);
    match store.marker_valid(principal.user_id, &token_hash).await {
        Ok(true) => StepUpStatus::RequiredVerified,
        Ok(false) => StepUpStatus::RequiredUnverified,
        Err(err) => {
            warn!("step-up marker lookup failed, treating as unverified: {err}");
            StepUpStatus::RequiredUnverified
        }
    }
}
