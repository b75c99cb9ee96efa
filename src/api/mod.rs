use crate::{
    cli::globals::GlobalArgs,
    gate::{self, GateConfig, GateState, PgStepUpStore},
    identity::HttpIdentityStore,
    webauthn::DeviceVerifier,
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, options},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs, config: GateConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(
        HttpIdentityStore::new(&globals.identity_url, globals.identity_service_key.clone())
            .context("Failed to build identity store client")?,
    );
    let step_up = Arc::new(PgStepUpStore::new(pool.clone()));
    let verifier = Arc::new(
        DeviceVerifier::new(
            pool.clone(),
            config.rp_id(),
            config.rp_origin(),
            config.rp_name(),
            Duration::from_secs(config.challenge_ttl_seconds()),
        )
        .context("Failed to build device verifier")?,
    );
    let gate_state = Arc::new(GateState::new(config, store, step_up, verifier));

    let app = app(gate_state, pool)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Assemble the full application: documented API routes, the gated page
/// surface and the middleware stack with the gate innermost so every route is
/// evaluated, page surface and API alike.
///
/// # Errors
/// Returns an error if the frontend origin cannot form a CORS header.
pub fn app(gate_state: Arc<GateState>, pool: sqlx::PgPool) -> Result<axum::Router> {
    let frontend_origin = frontend_origin(gate_state.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    // Build the router from OpenAPI-wired routes, then extend it with the
    // page surface the gate protects: the entry path, the gated areas and
    // the browser sign-out. The spec stays in openapi.rs.
    let (router, _openapi) = router().split_for_parts();
    Ok(router
        .route("/", get(handlers::entry::entry))
        .route("/signout", get(handlers::auth::signout::signout_redirect))
        .route("/admin/dashboard", get(handlers::area::admin_dashboard))
        .route("/admin/*section", get(handlers::area::admin_section))
        .route("/employee/dashboard", get(handlers::area::employee_dashboard))
        .route("/employee/*section", get(handlers::area::employee_section))
        .route("/health", options(handlers::health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(gate_state))
                .layer(Extension(pool.clone()))
                .layer(axum::middleware::from_fn(gate::middleware::gate)),
        )
        .layer(Extension(pool)))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::frontend_origin;

    #[test]
    fn frontend_origin_strips_path_and_keeps_port() {
        let origin = frontend_origin("https://joms.scgdress.shop/app/").expect("origin");
        assert_eq!(origin.to_str().expect("ascii"), "https://joms.scgdress.shop");

        let origin = frontend_origin("http://localhost:5173").expect("origin");
        assert_eq!(origin.to_str().expect("ascii"), "http://localhost:5173");
    }

    #[test]
    fn frontend_origin_rejects_hostless_urls() {
        assert!(frontend_origin("not a url").is_err());
    }
}
