//! Gated area stubs.
//!
//! The portal's dashboards and CRUD pages live in the frontend and its data
//! backend; these handlers only give the gate a route surface to protect and
//! report who made it through. A request reaching them has already passed
//! session resolution, access control and the step-up gate.

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::gate::Principal;

#[derive(Serialize, ToSchema, Debug)]
pub struct AreaResponse {
    pub area: String,
    pub page: String,
    pub user_id: String,
    pub role: String,
}

fn area_response(principal: Option<Extension<Principal>>, area: &str, page: &str) -> axum::response::Response {
    // The middleware inserts the principal for every allowed protected path;
    // its absence means the gate was bypassed somehow, which is a bug.
    let Some(Extension(principal)) = principal else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let response = AreaResponse {
        area: area.to_string(),
        page: page.to_string(),
        user_id: principal.user_id.to_string(),
        role: principal.role.as_str().to_string(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

pub async fn admin_dashboard(principal: Option<Extension<Principal>>) -> axum::response::Response {
    area_response(principal, "admin", "dashboard")
}

pub async fn admin_section(
    Path(section): Path<String>,
    principal: Option<Extension<Principal>>,
) -> axum::response::Response {
    area_response(principal, "admin", &section)
}

pub async fn employee_dashboard(
    principal: Option<Extension<Principal>>,
) -> axum::response::Response {
    area_response(principal, "employee", "dashboard")
}

pub async fn employee_section(
    Path(section): Path<String>,
    principal: Option<Extension<Principal>>,
) -> axum::response::Response {
    area_response(principal, "employee", &section)
}
