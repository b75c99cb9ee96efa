//! The per-request gate: resolve, check step-up, authorize, then forward.
//!
//! Applied across the whole router. API and health endpoints fall through the
//! evaluator's catch-all `Allow`; the protected page prefixes and the entry
//! path get the full state machine. The resolved [`Principal`], the request
//! credential and the step-up status are inserted into request extensions for
//! downstream handlers.

use axum::{
    extract::{Extension, Request},
    http::{HeaderValue, header::CACHE_CONTROL},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::access::{self, Access};
use super::cookies;
use super::routes;
use super::session::SessionResolver;
use super::state::GateState;
use super::stepup::{self, StepUpStatus};
use crate::identity::Credential;

pub async fn gate(
    Extension(state): Extension<Arc<GateState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let resolver = SessionResolver::new(
        state.store().clone(),
        state.config().refresh_threshold_seconds(),
    );
    let resolution = resolver.resolve(request.headers()).await;

    let step_up = match &resolution {
        Some(resolution) => {
            stepup::status(
                state.step_up().as_ref(),
                &resolution.principal,
                request.headers(),
            )
            .await
        }
        None => StepUpStatus::NotRequired,
    };

    let decision = access::authorize(
        resolution.as_ref().map(|resolution| &resolution.principal),
        step_up,
        &path,
    );

    let mut response = match decision {
        Access::Allow => {
            if let Some(resolution) = &resolution {
                request.extensions_mut().insert(resolution.principal.clone());
                request.extensions_mut().insert(resolution.credential.clone());
            }
            request.extensions_mut().insert(step_up);
            next.run(request).await
        }
        Access::Redirect(target) => {
            debug!("redirecting {path} to {target}");
            Redirect::to(&target).into_response()
        }
        Access::Revoke(target) => {
            // Privileged path touched without completed step-up: tear the
            // whole session down, not just this request.
            warn!("revoking session for unverified privileged access to {path}");
            let mut response = Redirect::to(&target).into_response();
            cookies::append_clear_all(response.headers_mut(), state.config().cookie_secure());
            if let Some(resolution) = resolution {
                revoke_session(&state, &resolution.credential).await;
            }
            return no_store(response);
        }
    };

    // A proactively refreshed credential must reach the client or the old
    // cookies outlive their tokens.
    if let Some(resolution) = &resolution {
        if resolution.renewed {
            cookies::append_credential(
                response.headers_mut(),
                &resolution.credential,
                state.config().refresh_cookie_ttl_seconds(),
                state.config().cookie_secure(),
            );
        }
    }

    if routes::is_protected(&path) {
        response = no_store(response);
    }

    response
}

/// Clear server-side markers and fire the upstream sign-out without blocking
/// the response.
pub(crate) async fn revoke_session(state: &Arc<GateState>, credential: &Credential) {
    if let Err(err) = state.step_up().clear_markers(credential.user_id).await {
        warn!("failed to clear step-up markers during revocation: {err}");
    }

    let store = state.store().clone();
    let access_token = credential.access_token.clone();
    tokio::spawn(async move {
        if let Err(err) = store.sign_out(&access_token).await {
            warn!("best-effort upstream sign-out failed: {err}");
        }
    });
}

/// Protected pages must never come from a cache shared with the next user.
fn no_store(mut response: Response) -> Response {
    response.headers_mut().insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
    );
    response
}
