//! Sign-out: unconditionally effective, even with the Identity Store down.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

use super::utils::extract_client_ip;
use crate::gate::audit::{self, AuditEvent};
use crate::gate::{GateState, cookies};
use crate::identity::Credential;

#[utoipa::path(
    post,
    path = "/v1/auth/signout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn signout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<GateState>>,
    credential: Option<Extension<Credential>>,
) -> axum::response::Response {
    let cleared = perform_signout(&state, &pool, &headers, credential.map(|c| c.0)).await;
    (StatusCode::NO_CONTENT, cleared).into_response()
}

/// Browser-facing sign-out kept for frontend parity: clears cookies and sends
/// the client back to the entry path.
pub async fn signout_redirect(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<GateState>>,
    credential: Option<Extension<Credential>>,
) -> axum::response::Response {
    let cleared = perform_signout(&state, &pool, &headers, credential.map(|c| c.0)).await;
    (cleared, Redirect::to(crate::gate::routes::ENTRY_PATH)).into_response()
}

/// Clear cookies and markers synchronously; the upstream sign-out call is a
/// detached task whose failure never reaches the user.
async fn perform_signout(
    state: &Arc<GateState>,
    pool: &PgPool,
    headers: &HeaderMap,
    credential: Option<Credential>,
) -> HeaderMap {
    // Always clear the cookies, even without a resolvable session.
    let mut response_headers = HeaderMap::new();
    cookies::append_clear_all(&mut response_headers, state.config().cookie_secure());

    if let Some(credential) = credential {
        if let Err(err) = state.step_up().clear_markers(credential.user_id).await {
            warn!("failed to clear step-up markers at sign-out: {err}");
        }

        let client_ip = extract_client_ip(headers);
        audit::record(
            pool,
            credential.user_id,
            AuditEvent::SignOut,
            client_ip.as_deref(),
            None,
        )
        .await;

        let store = state.store().clone();
        tokio::spawn(async move {
            if let Err(err) = store.sign_out(&credential.access_token).await {
                warn!("best-effort upstream sign-out failed: {err}");
            }
        });
    }

    response_headers
}
