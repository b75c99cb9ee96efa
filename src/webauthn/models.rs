use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use uuid::Uuid;

/// A platform credential enrolled for step-up verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceKey {
    pub credential_id: Vec<u8>,
    pub user_id: Uuid,
    pub label: String,
    pub public_key: Vec<u8>,
    pub sign_count: i64,
    pub created_at_unix: i64,
    pub last_used_at_unix: Option<i64>,
}

impl<'r> FromRow<'r, PgRow> for DeviceKey {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            credential_id: row.try_get("credential_id")?,
            user_id: row.try_get("user_id")?,
            label: row.try_get("label")?,
            public_key: row.try_get("public_key")?,
            sign_count: row.try_get("sign_count")?,
            created_at_unix: row.try_get("created_at_unix")?,
            last_used_at_unix: row.try_get("last_used_at_unix")?,
        })
    }
}

/// Why a verification attempt was rejected.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RejectReason {
    /// No pending attempt under that identifier; challenges are single use.
    UnknownAttempt,
    /// The attempt outlived the challenge window.
    Timeout,
    /// The response did not match the attempt's call shape.
    ShapeMismatch,
    /// The authenticator response failed cryptographic verification.
    Protocol(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAttempt => write!(f, "unknown or already-used attempt"),
            Self::Timeout => write!(f, "attempt timed out"),
            Self::ShapeMismatch => write!(f, "response does not match the attempt shape"),
            Self::Protocol(detail) => write!(f, "protocol rejection: {detail}"),
        }
    }
}

/// Final outcome of a verification attempt. The protocol driver reports this;
/// only the step-up gate acts on it.
#[derive(Debug)]
pub enum VerifyOutcome {
    Verified,
    Rejected(RejectReason),
}

impl VerifyOutcome {
    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}
