//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SigninResponse {
    pub role: String,
    /// True for admin roles: the credential is provisional until device
    /// verification completes.
    pub requires_step_up: bool,
    pub redirect_to: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: String,
    pub role: String,
    pub step_up_pending: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct StepUpStartRequest {
    /// Client-declared platform, matched against the operator-configured
    /// lenient list. Advisory only.
    pub platform: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct StepUpStartResponse {
    pub attempt_id: String,
    /// `attest` (registration-style throwaway) or `assert` (enrolled keys).
    pub mode: String,
    /// `required` or `preferred` user-verification strength.
    pub strength: String,
    #[schema(value_type = Object)]
    pub challenge: serde_json::Value,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct StepUpFinishRequest {
    pub attempt_id: String,
    /// The authenticator response. Absent when the client reports a failure
    /// (cancellation, timeout, missing authenticator).
    #[schema(value_type = Object)]
    pub response: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct StepUpFinishResponse {
    pub verified: bool,
    pub redirect_to: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EnrollStartResponse {
    pub attempt_id: String,
    #[schema(value_type = Object)]
    pub challenge: serde_json::Value,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EnrollFinishRequest {
    pub attempt_id: String,
    #[schema(value_type = Object)]
    pub response: serde_json::Value,
    pub label: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EntryResponse {
    pub authenticated: bool,
    pub role: Option<String>,
    pub step_up_pending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn signin_request_round_trips() -> Result<()> {
        let request = SigninRequest {
            email: "alice@example.com".to_string(),
            password: "secret".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let decoded: SigninRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.email, "alice@example.com");
        Ok(())
    }

    #[test]
    fn step_up_finish_request_allows_missing_response() -> Result<()> {
        let decoded: StepUpFinishRequest = serde_json::from_value(serde_json::json!({
            "attempt_id": "b6f0f8e4-0000-0000-0000-000000000000",
            "failure_reason": "user cancelled"
        }))?;
        assert!(decoded.response.is_none());
        assert_eq!(decoded.failure_reason.as_deref(), Some("user cancelled"));
        Ok(())
    }
}
