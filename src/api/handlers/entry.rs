//! The public entry path: login plus step-up UI state.
//!
//! The middleware already redirects fully-verified users to their dashboard,
//! so this handler only ever sees anonymous visitors and admins mid step-up.

use axum::{Json, extract::Extension, response::IntoResponse};

use super::auth::types::EntryResponse;
use crate::gate::{Principal, StepUpStatus};

pub async fn entry(
    principal: Option<Extension<Principal>>,
    step_up: Option<Extension<StepUpStatus>>,
) -> impl IntoResponse {
    let step_up_pending = step_up.is_some_and(|Extension(status)| !status.verified());
    let response = match principal {
        Some(Extension(principal)) => EntryResponse {
            authenticated: true,
            role: Some(principal.role.as_str().to_string()),
            step_up_pending,
        },
        None => EntryResponse {
            authenticated: false,
            role: None,
            step_up_pending: false,
        },
    };
    Json(response)
}
