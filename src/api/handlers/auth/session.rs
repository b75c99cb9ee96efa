//! Session introspection for the frontend.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};

use super::types::SessionResponse;
use crate::gate::{Principal, StepUpStatus};

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(
    principal: Option<Extension<Principal>>,
    step_up: Option<Extension<StepUpStatus>>,
) -> impl IntoResponse {
    // Missing principals are "no session"; auth state is never an error here.
    let Some(Extension(principal)) = principal else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let step_up_pending = step_up.is_some_and(|Extension(status)| !status.verified());

    let response = SessionResponse {
        user_id: principal.user_id.to_string(),
        role: principal.role.as_str().to_string(),
        step_up_pending,
    };
    (StatusCode::OK, Json(response)).into_response()
}
