//! Mole API - lesion tracking and remote dermatology consultations.

pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod query;
pub mod services;

use service_core::axum::{
    handler::Handler,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    make_request_span, metrics_middleware, request_id_middleware, security_headers_middleware,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::db::Database;
use crate::handlers::{catalog, doctor, media, users};
use crate::middleware::{access_middleware, AccessGuard};
use crate::services::policy::{
    BODY_PARTS_WRITE, LESIONS_READ, OWNED_LESIONS_READ, OWNED_LESIONS_WRITE,
    OWNED_REQUESTS_CREATE, QUESTIONS_WRITE, REPORTS_READ, REQUESTS_READ, REQUESTS_RESPOND,
};
use crate::services::{ObjectStorage, PermissionTable, ProfileSynchronizer, PushProvider, TokenValidator};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub db: Database,
    pub validator: Arc<TokenValidator>,
    pub permissions: Arc<PermissionTable>,
    pub profiles: ProfileSynchronizer,
    pub storage: Arc<dyn ObjectStorage>,
    /// `None` when push notifications are disabled.
    pub push: Option<Arc<dyn PushProvider>>,
}

// Permission sets demanded by the guarded routes.
const AUTHENTICATED: &[&str] = &[];
const CATALOG_BODY_PARTS: &[&str] = &[BODY_PARTS_WRITE];
const CATALOG_QUESTIONS: &[&str] = &[QUESTIONS_WRITE];
const OWN_READ: &[&str] = &[OWNED_LESIONS_READ];
const OWN_WRITE: &[&str] = &[OWNED_LESIONS_WRITE];
const OWN_REQUEST_CREATE: &[&str] = &[OWNED_LESIONS_WRITE, OWNED_REQUESTS_CREATE];
const DOCTOR_REQUESTS: &[&str] = &[REQUESTS_READ];
const DOCTOR_RESPOND: &[&str] = &[REQUESTS_RESPOND];
const DOCTOR_REPORTS: &[&str] = &[REPORTS_READ];
const DOCTOR_LESIONS: &[&str] = &[LESIONS_READ];

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let timeout = state.config.http.request_timeout_seconds;
    if timeout == 0 {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "REQUEST_TIMEOUT_SECONDS must be positive"
        )));
    }

    // Each guarded handler carries its own access layer, so sibling methods
    // on one path can demand different permissions.
    let guard = |required: &'static [&'static str]| {
        from_fn_with_state(AccessGuard::new(state.clone(), required), access_middleware)
    };

    let catalog_routes = Router::new()
        .route(
            "/body-parts",
            get(catalog::list_body_parts)
                .post(catalog::create_body_part.layer(guard(CATALOG_BODY_PARTS))),
        )
        .route(
            "/body-parts/:body_part",
            put(catalog::update_body_part.layer(guard(CATALOG_BODY_PARTS)))
                .delete(catalog::delete_body_part.layer(guard(CATALOG_BODY_PARTS))),
        )
        .route(
            "/questions",
            get(catalog::list_questions)
                .post(catalog::create_question.layer(guard(CATALOG_QUESTIONS))),
        )
        .route(
            "/questions/:question",
            put(catalog::update_question.layer(guard(CATALOG_QUESTIONS)))
                .delete(catalog::delete_question.layer(guard(CATALOG_QUESTIONS))),
        );

    let user_routes = Router::new()
        .route("/users/me", get(users::me.layer(guard(AUTHENTICATED))))
        .route(
            "/users/me/lesions",
            get(users::list_lesions.layer(guard(OWN_READ)))
                .post(users::create_lesion.layer(guard(OWN_WRITE))),
        )
        .route(
            "/users/me/lesions/:lesion",
            get(users::get_lesion.layer(guard(OWN_READ)))
                .put(users::update_lesion.layer(guard(OWN_WRITE)))
                .delete(users::delete_lesion.layer(guard(OWN_WRITE))),
        )
        .route(
            "/users/me/lesions/:lesion/reports",
            get(users::list_reports.layer(guard(OWN_READ)))
                .post(users::create_report.layer(guard(OWN_WRITE))),
        )
        .route(
            "/users/me/lesions/:lesion/reports/:report",
            put(users::update_report.layer(guard(OWN_WRITE)))
                .delete(users::delete_report.layer(guard(OWN_WRITE))),
        )
        .route(
            "/users/me/requests",
            get(users::list_requests.layer(guard(OWN_READ)))
                .post(users::create_request.layer(guard(OWN_REQUEST_CREATE))),
        )
        .route(
            "/users/me/requests/:request",
            get(users::get_request.layer(guard(OWN_WRITE)))
                .put(users::update_request.layer(guard(OWN_WRITE)))
                .delete(users::delete_request.layer(guard(OWN_WRITE))),
        );

    let doctor_routes = Router::new()
        .route(
            "/requests",
            get(doctor::list_requests.layer(guard(DOCTOR_REQUESTS))),
        )
        .route(
            "/requests/:request",
            get(doctor::get_request.layer(guard(DOCTOR_REQUESTS)))
                .put(doctor::respond.layer(guard(DOCTOR_RESPOND))),
        )
        .route(
            "/reports",
            get(doctor::list_reports.layer(guard(DOCTOR_REPORTS))),
        )
        .route(
            "/reports/:report",
            get(doctor::get_report.layer(guard(DOCTOR_REPORTS))),
        )
        .route(
            "/lesions",
            get(doctor::list_lesions.layer(guard(DOCTOR_LESIONS))),
        )
        .route(
            "/lesions/:lesion",
            get(doctor::get_lesion.layer(guard(DOCTOR_LESIONS))),
        );

    let media_routes = Router::new()
        .route(
            "/media/images/upload",
            post(media::upload.layer(guard(AUTHENTICATED))),
        )
        .route(
            "/media/images/:account_id/:file_name",
            get(media::download.layer(guard(AUTHENTICATED))),
        );

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .merge(catalog_routes)
        .merge(user_routes)
        .merge(doctor_routes)
        .merge(media_routes)
        .with_state(state.clone())
        .layer(TimeoutLayer::new(Duration::from_secs(timeout)))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_request_span::<service_core::axum::body::Body>),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.http.allowed_origins));

    Ok(app)
}
