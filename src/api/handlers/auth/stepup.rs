//! Step-up verification endpoints.
//!
//! Flow Overview:
//! - `start` picks the call shape for this attempt: assertion over enrolled
//!   device keys when any exist, otherwise an attestation-act registration
//!   with a throwaway credential. Strength is strict unless the declared
//!   platform is on the operator-configured lenient list.
//! - `finish` consumes the protocol outcome. Success mints the step-up
//!   marker; explicit failure revokes the whole session, not just the admin
//!   area.
//! - `skip` is the audited escape hatch: it needs the operator flag AND the
//!   superadmin role; client intent alone never suffices.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use super::types::{
    StepUpFinishRequest, StepUpFinishResponse, StepUpStartRequest, StepUpStartResponse,
};
use super::utils::extract_client_ip;
use crate::gate::audit::{self, AuditEvent};
use crate::gate::{GateState, Principal, cookies, routes, stepup};
use crate::identity::Credential;
use crate::webauthn::{DeviceKeyRepo, VerificationStrength, VerifyOutcome};

#[utoipa::path(
    post,
    path = "/v1/auth/stepup/start",
    request_body = StepUpStartRequest,
    responses(
        (status = 200, description = "Verification challenge generated", body = StepUpStartResponse),
        (status = 401, description = "No authenticated session"),
        (status = 403, description = "Role does not use step-up"),
        (status = 500, description = "Challenge generation failed")
    ),
    tag = "stepup"
)]
pub async fn start(
    pool: Extension<PgPool>,
    state: Extension<Arc<GateState>>,
    principal: Option<Extension<Principal>>,
    payload: Option<Json<StepUpStartRequest>>,
) -> axum::response::Response {
    let Some(Extension(principal)) = principal else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if !principal.role.requires_step_up() {
        return (StatusCode::FORBIDDEN, "Step-up not required for this role").into_response();
    }

    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let strength = match request.platform.as_deref() {
        Some(platform) if state.config().platform_is_lenient(platform) => {
            VerificationStrength::Preferred
        }
        _ => VerificationStrength::Required,
    };

    // Enrolled keys get the assertion shape; everyone else proves possession
    // through a throwaway registration. Never both in one attempt.
    let keys = match DeviceKeyRepo::list_user_keys(&pool, principal.user_id).await {
        Ok(keys) => keys,
        Err(err) => {
            warn!("device key lookup failed, falling back to attestation: {err}");
            Vec::new()
        }
    };

    let started = if keys.is_empty() {
        state
            .verifier()
            .attest_begin(principal.user_id, strength)
            .await
            .map(|(challenge, attempt_id)| (challenge, attempt_id, "attest"))
    } else {
        state
            .verifier()
            .assert_begin(&keys)
            .await
            .map(|(challenge, attempt_id)| (challenge, attempt_id, "assert"))
    };

    match started {
        Ok((challenge, attempt_id, mode)) => (
            StatusCode::OK,
            Json(StepUpStartResponse {
                attempt_id: attempt_id.to_string(),
                mode: mode.to_string(),
                strength: match strength {
                    VerificationStrength::Required => "required".to_string(),
                    VerificationStrength::Preferred => "preferred".to_string(),
                },
                challenge,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("failed to start step-up verification: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/stepup/finish",
    request_body = StepUpFinishRequest,
    responses(
        (status = 200, description = "Device verified; marker issued", body = StepUpFinishResponse),
        (status = 401, description = "Verification rejected; session revoked", body = StepUpFinishResponse),
        (status = 400, description = "Malformed request")
    ),
    tag = "stepup"
)]
pub async fn finish(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<GateState>>,
    principal: Option<Extension<Principal>>,
    credential: Option<Extension<Credential>>,
    payload: Option<Json<StepUpFinishRequest>>,
) -> axum::response::Response {
    let (Some(Extension(principal)), Some(Extension(credential))) = (principal, credential) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if !principal.role.requires_step_up() {
        return (StatusCode::FORBIDDEN, "Step-up not required for this role").into_response();
    }

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    let Ok(attempt_id) = Uuid::parse_str(&request.attempt_id) else {
        return (StatusCode::BAD_REQUEST, "Invalid attempt ID").into_response();
    };

    let client_ip = extract_client_ip(&headers);

    // Client-reported failure (cancellation, timeout, missing authenticator):
    // the attempt is dead and so is the session.
    let Some(response) = request.response else {
        state.verifier().abandon(attempt_id).await;
        let reason = request.failure_reason.unwrap_or_else(|| "unspecified".to_string());
        return revoke(&state, &pool, &principal, &credential, client_ip.as_deref(), &reason)
            .await;
    };

    match state.verifier().verify_finish(attempt_id, response).await {
        Ok(VerifyOutcome::Verified) => {
            grant(&state, &pool, &principal, &credential, client_ip.as_deref()).await
        }
        Ok(VerifyOutcome::Rejected(reason)) => {
            revoke(
                &state,
                &pool,
                &principal,
                &credential,
                client_ip.as_deref(),
                &reason.to_string(),
            )
            .await
        }
        Err(err) => {
            error!("step-up verification errored: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/stepup/skip",
    responses(
        (status = 200, description = "Step-up bypassed; audited", body = StepUpFinishResponse),
        (status = 403, description = "Bypass not authorized")
    ),
    tag = "stepup"
)]
pub async fn skip(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<GateState>>,
    principal: Option<Extension<Principal>>,
    credential: Option<Extension<Credential>>,
) -> axum::response::Response {
    let (Some(Extension(principal)), Some(Extension(credential))) = (principal, credential) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let client_ip = extract_client_ip(&headers);

    // The bypass needs the operator flag AND the highest-privilege role; a
    // client-supplied flag on its own buys nothing.
    let authorized = state.config().allow_step_up_skip()
        && principal.role == crate::identity::Role::Superadmin;
    if !authorized {
        audit::record(
            &pool,
            principal.user_id,
            AuditEvent::StepUpSkipRefused,
            client_ip.as_deref(),
            Some(principal.role.as_str()),
        )
        .await;
        return (StatusCode::FORBIDDEN, "Step-up bypass not authorized").into_response();
    }

    warn!(
        user_id = %principal.user_id,
        "step-up verification bypassed by operator escape hatch"
    );
    audit::record(
        &pool,
        principal.user_id,
        AuditEvent::StepUpSkip,
        client_ip.as_deref(),
        Some(principal.role.as_str()),
    )
    .await;

    issue_marker(&state, &principal, &credential).await
}

/// Mint the step-up marker after a verified attempt.
async fn grant(
    state: &Arc<GateState>,
    pool: &PgPool,
    principal: &Principal,
    credential: &Credential,
    client_ip: Option<&str>,
) -> axum::response::Response {
    audit::record(
        pool,
        principal.user_id,
        AuditEvent::StepUpSuccess,
        client_ip,
        None,
    )
    .await;
    issue_marker(state, principal, credential).await
}

/// The marker cookie carries a random token; storage keeps its hash, scoped
/// to the access credential's remaining lifetime.
async fn issue_marker(
    state: &Arc<GateState>,
    principal: &Principal,
    credential: &Credential,
) -> axum::response::Response {
    let token = match stepup::generate_marker_token() {
        Ok(token) => token,
        Err(err) => {
            error!("failed to generate step-up marker: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Err(err) = state
        .step_up()
        .insert_marker(
            principal.user_id,
            stepup::hash_marker_token(&token),
            credential.expires_at,
        )
        .await
    {
        error!("failed to store step-up marker: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let mut response_headers = HeaderMap::new();
    match cookies::build(
        cookies::STEP_UP_COOKIE,
        &token,
        credential.seconds_until_expiry(),
        state.config().cookie_secure(),
    ) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("failed to build step-up marker cookie: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let response = StepUpFinishResponse {
        verified: true,
        redirect_to: routes::ADMIN_DASHBOARD.to_string(),
    };
    (StatusCode::OK, response_headers, Json(response)).into_response()
}

/// Failed step-up forces full sign-out, not just denial of the admin area.
async fn revoke(
    state: &Arc<GateState>,
    pool: &PgPool,
    principal: &Principal,
    credential: &Credential,
    client_ip: Option<&str>,
    reason: &str,
) -> axum::response::Response {
    warn!(user_id = %principal.user_id, reason, "step-up verification failed, revoking session");
    audit::record(
        pool,
        principal.user_id,
        AuditEvent::StepUpFailure,
        client_ip,
        Some(reason),
    )
    .await;

    crate::gate::middleware::revoke_session(state, credential).await;

    let mut response_headers = HeaderMap::new();
    cookies::append_clear_all(&mut response_headers, state.config().cookie_secure());

    let response = StepUpFinishResponse {
        verified: false,
        redirect_to: routes::ENTRY_PATH.to_string(),
    };
    (StatusCode::UNAUTHORIZED, response_headers, Json(response)).into_response()
}
