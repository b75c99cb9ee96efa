//! Password sign-in: the entry point that arms the rest of the pipeline.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::types::{SigninRequest, SigninResponse};
use super::utils::{extract_client_ip, normalize_email, valid_email};
use crate::gate::audit::{self, AuditEvent};
use crate::gate::{GateState, cookies, routes};
use crate::identity::IdentityError;

#[utoipa::path(
    post,
    path = "/v1/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in; cookies set", body = SigninResponse),
        (status = 400, description = "Invalid credentials or unresolvable role"),
        (status = 500, description = "Identity store failure")
    ),
    tag = "auth"
)]
pub async fn signin(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<GateState>>,
    payload: Option<Json<SigninRequest>>,
) -> axum::response::Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) || request.password.is_empty() {
        return (StatusCode::BAD_REQUEST, "Email and password are required").into_response();
    }

    let credential = match state.store().authenticate(&email, &request.password).await {
        Ok(credential) => credential,
        Err(IdentityError::InvalidCredentials) => {
            return (StatusCode::BAD_REQUEST, "Invalid email or password").into_response();
        }
        Err(err) => {
            error!("sign-in failed against identity store: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // Fail closed: a user who cannot be role-resolved gets no session at all.
    let role = match state.store().user_role(credential.user_id).await {
        Ok(role) => role,
        Err(err) => {
            warn!("role lookup failed at sign-in for {}: {err}", credential.user_id);
            return (StatusCode::BAD_REQUEST, "Failed to resolve user role").into_response();
        }
    };

    let requires_step_up = role.requires_step_up();
    if requires_step_up {
        // A marker from a previous sign-in must never carry over.
        if let Err(err) = state.step_up().clear_markers(credential.user_id).await {
            warn!("failed to clear stale step-up markers: {err}");
        }
    }

    let mut response_headers = HeaderMap::new();
    cookies::append_credential(
        &mut response_headers,
        &credential,
        state.config().refresh_cookie_ttl_seconds(),
        state.config().cookie_secure(),
    );

    let client_ip = extract_client_ip(&headers);
    audit::record(
        &pool,
        credential.user_id,
        AuditEvent::SignIn,
        client_ip.as_deref(),
        Some(role.as_str()),
    )
    .await;

    info!(user_id = %credential.user_id, role = role.as_str(), "sign-in succeeded");

    let response = SigninResponse {
        role: role.as_str().to_string(),
        requires_step_up,
        // Admin roles stay on the entry path until device verification is done.
        redirect_to: if requires_step_up {
            routes::ENTRY_PATH.to_string()
        } else {
            role.dashboard().to_string()
        },
    };

    (StatusCode::OK, response_headers, Json(response)).into_response()
}
