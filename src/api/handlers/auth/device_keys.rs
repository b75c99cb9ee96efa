//! Device key enrollment.
//!
//! Enrolling a persistent platform credential unlocks the assertion shape for
//! later step-up attempts. Enrollment itself is privileged: the caller must
//! already be step-up verified for the current session, so a stolen password
//! alone cannot plant a new device.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::types::{EnrollFinishRequest, EnrollStartResponse};
use super::utils::extract_client_ip;
use crate::gate::audit::{self, AuditEvent};
use crate::gate::{GateState, Principal, StepUpStatus};
use crate::webauthn::{DeviceKeyRepo, VerifyOutcome};

#[utoipa::path(
    post,
    path = "/v1/auth/device-keys/enroll/start",
    responses(
        (status = 200, description = "Enrollment challenge generated", body = EnrollStartResponse),
        (status = 401, description = "No authenticated session"),
        (status = 403, description = "Step-up verification required first")
    ),
    tag = "stepup"
)]
pub async fn enroll_start(
    pool: Extension<PgPool>,
    state: Extension<Arc<GateState>>,
    principal: Option<Extension<Principal>>,
    step_up: Option<Extension<StepUpStatus>>,
) -> axum::response::Response {
    let Some(Extension(principal)) = principal else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(principal) = require_verified_admin(principal, step_up) else {
        return (StatusCode::FORBIDDEN, "Step-up verification required").into_response();
    };

    let existing = match DeviceKeyRepo::list_user_keys(&pool, principal.user_id).await {
        Ok(keys) => keys,
        Err(err) => {
            error!("failed to list device keys: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match state
        .verifier()
        .enroll_begin(principal.user_id, &principal.user_id.to_string(), &existing)
        .await
    {
        Ok((challenge, attempt_id)) => (
            StatusCode::OK,
            Json(EnrollStartResponse {
                attempt_id: attempt_id.to_string(),
                challenge,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("failed to start device key enrollment: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/device-keys/enroll/finish",
    request_body = EnrollFinishRequest,
    responses(
        (status = 204, description = "Device key enrolled"),
        (status = 400, description = "Invalid enrollment response"),
        (status = 401, description = "No authenticated session"),
        (status = 403, description = "Step-up verification required first")
    ),
    tag = "stepup"
)]
pub async fn enroll_finish(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<GateState>>,
    principal: Option<Extension<Principal>>,
    step_up: Option<Extension<StepUpStatus>>,
    payload: Option<Json<EnrollFinishRequest>>,
) -> axum::response::Response {
    let Some(Extension(principal)) = principal else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(principal) = require_verified_admin(principal, step_up) else {
        return (StatusCode::FORBIDDEN, "Step-up verification required").into_response();
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    let Ok(attempt_id) = Uuid::parse_str(&request.attempt_id) else {
        return (StatusCode::BAD_REQUEST, "Invalid attempt ID").into_response();
    };
    let label = request.label.trim();
    if label.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing device label").into_response();
    }

    match state
        .verifier()
        .enroll_finish(attempt_id, request.response, principal.user_id, label)
        .await
    {
        Ok(VerifyOutcome::Verified) => {
            let client_ip = extract_client_ip(&headers);
            audit::record(
                &pool,
                principal.user_id,
                AuditEvent::DeviceKeyEnrolled,
                client_ip.as_deref(),
                Some(label),
            )
            .await;
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(VerifyOutcome::Rejected(reason)) => {
            (StatusCode::BAD_REQUEST, format!("Enrollment failed: {reason}")).into_response()
        }
        Err(err) => {
            error!("failed to finish device key enrollment: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Enrollment needs an admin role with step-up already verified this session.
fn require_verified_admin(
    principal: Principal,
    step_up: Option<Extension<StepUpStatus>>,
) -> Option<Principal> {
    if !principal.role.requires_step_up() {
        return None;
    }
    match step_up {
        Some(Extension(StepUpStatus::RequiredVerified)) => Some(principal),
        _ => None,
    }
}
