//! Route handlers.
//!
//! Each handler parses identifiers and bodies, calls one core service with the authenticated
//! [`Caller`] and converts the outcome into a wire type. All decisions live in `riskcare-core`.

use crate::{ApiError, AppState, Caller};
use api_shared::{
    CreateReviewRequestReq, DoctorRes, ErrorRes, HealthRes, HealthService, ListDoctorsRes,
    ListNotificationsRes, ListResultsRes, ListReviewRequestsRes, MarkAllReadRes, NotificationRes,
    RecordResultReq, RejectReq, ReportRes, ResultRes, ReviewRequestRes, SubmitReviewReq,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use riskcare_core::{NotificationId, ReportId, RequestId, ReviewStatus, Role};
use serde::Deserialize;
use utoipa::IntoParams;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DoctorsQuery {
    /// Only list verified doctors.
    pub verified_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReviewRequestsQuery {
    /// `pending`, `accepted`, `rejected` or `completed`.
    pub status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks; needs no credentials.
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/doctors",
    params(DoctorsQuery),
    responses(
        (status = 200, description = "Doctor directory", body = ListDoctorsRes),
        (status = 401, description = "Missing or invalid credentials", body = ErrorRes)
    )
)]
/// List the doctor directory in registration order
#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<DoctorsQuery>,
) -> ApiResult<Json<ListDoctorsRes>> {
    let doctors = state
        .platform
        .accounts
        .list_doctors(query.verified_only.unwrap_or(false))?;
    Ok(Json(ListDoctorsRes {
        doctors: doctors.iter().filter_map(DoctorRes::from_account).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/results",
    request_body = RecordResultReq,
    responses(
        (status = 201, description = "Result recorded", body = ResultRes),
        (status = 403, description = "Caller is not a patient", body = ErrorRes),
        (status = 422, description = "Missing or invalid field", body = ErrorRes)
    )
)]
/// Record a scored prediction result for the calling patient
///
/// # Errors
/// Returns 422 if the disease or prediction is missing, or the probability is outside `[0, 1]`.
#[axum::debug_handler]
pub async fn record_result(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<RecordResultReq>,
) -> ApiResult<(StatusCode, Json<ResultRes>)> {
    let result = state
        .platform
        .results
        .record_result(&caller, req.into_input()?)?;
    Ok((StatusCode::CREATED, Json(ResultRes::from(&result))))
}

#[utoipa::path(
    get,
    path = "/results",
    responses(
        (status = 200, description = "The caller's results, oldest first", body = ListResultsRes),
        (status = 403, description = "Caller is not a patient", body = ErrorRes)
    )
)]
/// List the calling patient's result history
#[axum::debug_handler]
pub async fn list_results(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<ListResultsRes>> {
    let results = state.platform.results.list_results(&caller)?;
    Ok(Json(ListResultsRes {
        results: results.iter().map(ResultRes::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/review-requests",
    request_body = CreateReviewRequestReq,
    responses(
        (status = 201, description = "Review request created", body = ReviewRequestRes),
        (status = 403, description = "Not a patient, target is not a doctor, or result not owned", body = ErrorRes),
        (status = 404, description = "Doctor or result not found", body = ErrorRes),
        (status = 409, description = "An active request already exists", body = ErrorRes),
        (status = 422, description = "Missing or malformed identifier", body = ErrorRes)
    )
)]
/// Ask a doctor to review the report of one of the caller's results
///
/// The report is created on first use. A duplicate request while an earlier one for the same
/// patient, doctor and report is pending, accepted or completed is refused with the existing
/// request's id and status.
#[axum::debug_handler]
pub async fn create_review_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<CreateReviewRequestReq>,
) -> ApiResult<(StatusCode, Json<ReviewRequestRes>)> {
    let request = state
        .platform
        .reviews
        .create_request(&caller, req.into_input()?)?;
    Ok((StatusCode::CREATED, Json(ReviewRequestRes::from(&request))))
}

#[utoipa::path(
    get,
    path = "/review-requests",
    params(ReviewRequestsQuery),
    responses(
        (status = 200, description = "Requests sent (patients) or received (doctors), newest first", body = ListReviewRequestsRes),
        (status = 422, description = "Unknown status filter", body = ErrorRes)
    )
)]
/// List the caller's review requests
#[axum::debug_handler]
pub async fn list_review_requests(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<ReviewRequestsQuery>,
) -> ApiResult<Json<ListReviewRequestsRes>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ReviewStatus>)
        .transpose()?;
    let requests = match caller.role {
        Role::Doctor => state
            .platform
            .reviews
            .list_doctor_requests(&caller, status)?,
        Role::Patient => state
            .platform
            .reviews
            .list_patient_requests(&caller)?
            .into_iter()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .collect(),
    };
    Ok(Json(ListReviewRequestsRes {
        requests: requests.iter().map(ReviewRequestRes::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/review-requests/{id}",
    params(("id" = String, Path, description = "Review request id")),
    responses(
        (status = 200, description = "The review request", body = ReviewRequestRes),
        (status = 403, description = "Caller is not a party to the request", body = ErrorRes),
        (status = 404, description = "Request not found", body = ErrorRes)
    )
)]
/// Fetch one review request
#[axum::debug_handler]
pub async fn get_review_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<ReviewRequestRes>> {
    let request = state
        .platform
        .reviews
        .get_request(RequestId::parse(&id)?, &caller)?;
    Ok(Json(ReviewRequestRes::from(&request)))
}

#[utoipa::path(
    post,
    path = "/review-requests/{id}/accept",
    params(("id" = String, Path, description = "Review request id")),
    responses(
        (status = 200, description = "Request accepted", body = ReviewRequestRes),
        (status = 403, description = "Caller is not the assigned doctor", body = ErrorRes),
        (status = 404, description = "Request not found", body = ErrorRes),
        (status = 409, description = "Request is not pending", body = ErrorRes)
    )
)]
/// Accept a pending request as its assigned doctor
#[axum::debug_handler]
pub async fn accept_review_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<ReviewRequestRes>> {
    let request = state
        .platform
        .reviews
        .accept(RequestId::parse(&id)?, &caller)?;
    Ok(Json(ReviewRequestRes::from(&request)))
}

#[utoipa::path(
    post,
    path = "/review-requests/{id}/reject",
    params(("id" = String, Path, description = "Review request id")),
    request_body = RejectReq,
    responses(
        (status = 200, description = "Request rejected", body = ReviewRequestRes),
        (status = 403, description = "Caller is not the assigned doctor", body = ErrorRes),
        (status = 404, description = "Request not found", body = ErrorRes),
        (status = 409, description = "Request is not pending", body = ErrorRes)
    )
)]
/// Reject a pending request, optionally with a reason
#[axum::debug_handler]
pub async fn reject_review_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(req): Json<RejectReq>,
) -> ApiResult<Json<ReviewRequestRes>> {
    let request = state.platform.reviews.reject(
        RequestId::parse(&id)?,
        &caller,
        req.reason.as_deref(),
    )?;
    Ok(Json(ReviewRequestRes::from(&request)))
}

#[utoipa::path(
    post,
    path = "/review-requests/{id}/review",
    params(("id" = String, Path, description = "Review request id")),
    request_body = SubmitReviewReq,
    responses(
        (status = 200, description = "Notes saved; completed when finalized", body = ReviewRequestRes),
        (status = 403, description = "Caller is not the assigned doctor", body = ErrorRes),
        (status = 404, description = "Request not found", body = ErrorRes),
        (status = 409, description = "Request has not been accepted", body = ErrorRes),
        (status = 422, description = "Notes missing", body = ErrorRes)
    )
)]
/// Submit review notes on an accepted request
#[axum::debug_handler]
pub async fn submit_review(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(req): Json<SubmitReviewReq>,
) -> ApiResult<Json<ReviewRequestRes>> {
    let request = state.platform.reviews.submit_review(
        RequestId::parse(&id)?,
        &caller,
        req.notes.as_deref(),
        req.finalize,
    )?;
    Ok(Json(ReviewRequestRes::from(&request)))
}

#[utoipa::path(
    get,
    path = "/review-requests/{id}/report",
    params(("id" = String, Path, description = "Review request id")),
    responses(
        (status = 200, description = "The report attached to the request", body = ReportRes),
        (status = 403, description = "Caller may not view the report yet", body = ErrorRes),
        (status = 404, description = "Request or report not found", body = ErrorRes)
    )
)]
/// View the report attached to a review request
///
/// The owning patient may always view it; the assigned doctor only once the request is accepted
/// or completed. A missing document is rendered on demand.
#[axum::debug_handler]
pub async fn view_request_report(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<ReportRes>> {
    let view = state
        .platform
        .reports
        .view_request_report(RequestId::parse(&id)?, &caller)?;
    Ok(Json(ReportRes::from(view)))
}

#[utoipa::path(
    get,
    path = "/reports/{id}",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "The caller's own report", body = ReportRes),
        (status = 403, description = "Report belongs to someone else", body = ErrorRes),
        (status = 404, description = "Report not found", body = ErrorRes)
    )
)]
/// View one of the calling patient's own reports
#[axum::debug_handler]
pub async fn view_own_report(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<ReportRes>> {
    let view = state
        .platform
        .reports
        .view_own_report(ReportId::parse(&id)?, &caller)?;
    Ok(Json(ReportRes::from(view)))
}

#[utoipa::path(
    get,
    path = "/notifications",
    responses(
        (status = 200, description = "The caller's notifications, newest first", body = ListNotificationsRes)
    )
)]
/// List the caller's notifications with the unread count
#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<ListNotificationsRes>> {
    let notifications = state.platform.notifications.list(&caller)?;
    let unread_count = notifications.iter().filter(|n| !n.is_read).count();
    Ok(Json(ListNotificationsRes {
        notifications: notifications.iter().map(NotificationRes::from).collect(),
        unread_count,
    }))
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    params(("id" = String, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationRes),
        (status = 403, description = "Notification belongs to someone else", body = ErrorRes),
        (status = 404, description = "Notification not found", body = ErrorRes)
    )
)]
/// Mark one notification as read
#[axum::debug_handler]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<NotificationRes>> {
    let notification = state
        .platform
        .notifications
        .mark_read(NotificationId::parse(&id)?, &caller)?;
    Ok(Json(NotificationRes::from(&notification)))
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    responses(
        (status = 200, description = "Number of notifications newly marked read", body = MarkAllReadRes)
    )
)]
/// Mark all of the caller's notifications as read
#[axum::debug_handler]
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<MarkAllReadRes>> {
    let updated = state.platform.notifications.mark_all_read(&caller)?;
    Ok(Json(MarkAllReadRes { updated }))
}
