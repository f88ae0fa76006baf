//! # API REST
//!
//! REST API implementation for RiskCare.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, caller headers)
//!
//! Uses `api-shared` for wire types and authentication, and `riskcare-core` for everything else.

#![warn(rust_2018_idioms)]

mod error;
mod handlers;

pub use error::{status_for, ApiError};

use api_shared::auth::{self, API_KEY_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::Router;
use riskcare_core::{CallerContext, ErrorKind, Platform};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared by all request handlers.
///
/// The API key is resolved once at startup; handlers never read the environment.
#[derive(Clone)]
pub struct AppState {
    pub platform: Platform,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(platform: Platform, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            platform,
            api_key: api_key.into(),
        }
    }
}

/// The authenticated caller of a request.
///
/// Rejects with 401 unless the API key matches, both identity headers parse and the claimed
/// role is the one the account was registered with.
pub struct Caller(pub CallerContext);

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        auth::validate_api_key(header(API_KEY_HEADER), &state.api_key)?;
        let caller = auth::caller_from_headers(header(USER_ID_HEADER), header(USER_ROLE_HEADER))?;

        let registered = match state.platform.accounts.get(caller.user_id) {
            Ok(account) => Some(account.role),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        auth::confirm_registered_role(&caller, registered)?;
        Ok(Caller(caller))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_doctors,
        handlers::record_result,
        handlers::list_results,
        handlers::create_review_request,
        handlers::list_review_requests,
        handlers::get_review_request,
        handlers::accept_review_request,
        handlers::reject_review_request,
        handlers::submit_review,
        handlers::view_request_report,
        handlers::view_own_report,
        handlers::list_notifications,
        handlers::mark_notification_read,
        handlers::mark_all_notifications_read,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::ErrorRes,
        api_shared::DoctorRes,
        api_shared::ListDoctorsRes,
        api_shared::RecordResultReq,
        api_shared::ResultRes,
        api_shared::ListResultsRes,
        api_shared::CreateReviewRequestReq,
        api_shared::RejectReq,
        api_shared::SubmitReviewReq,
        api_shared::ReviewRequestRes,
        api_shared::ListReviewRequestsRes,
        api_shared::ReportRes,
        api_shared::NotificationRes,
        api_shared::ListNotificationsRes,
        api_shared::MarkAllReadRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST application: every route, Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/doctors", get(handlers::list_doctors))
        .route(
            "/results",
            get(handlers::list_results).post(handlers::record_result),
        )
        .route(
            "/review-requests",
            get(handlers::list_review_requests).post(handlers::create_review_request),
        )
        .route("/review-requests/:id", get(handlers::get_review_request))
        .route(
            "/review-requests/:id/accept",
            post(handlers::accept_review_request),
        )
        .route(
            "/review-requests/:id/reject",
            post(handlers::reject_review_request),
        )
        .route("/review-requests/:id/review", post(handlers::submit_review))
        .route(
            "/review-requests/:id/report",
            get(handlers::view_request_report),
        )
        .route("/reports/:id", get(handlers::view_own_report))
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/read-all",
            post(handlers::mark_all_notifications_read),
        )
        .route(
            "/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
