//! Registration request routes: public submission and administrative review.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::{
    ApprovalResult, RegistrationRequest, RejectRequest, RequestState, ReviewRequest,
    SubmitRegistrationRequest,
};
use serde::Deserialize;
use shared::pagination::Page;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

/// Query parameters for request listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListRequestsQuery {
    /// Malformed values are ignored rather than rejected.
    pub school_id: Option<String>,
    /// Only honoured by the history listing.
    pub state: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Submit a registration request against an invitation code.
///
/// POST /api/v1/registration-requests
pub async fn submit_request(
    State(state): State<AppState>,
    Json(payload): Json<SubmitRegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationRequest>), ApiError> {
    // Field-level details are only available before the service flattens them.
    payload.validate()?;

    let request = state.service.submit(payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Pending requests, newest first.
///
/// GET /api/v1/admin/registration-requests/pending?school_id&page&page_size
pub async fn list_pending(
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Page<RegistrationRequest>>, ApiError> {
    let page = state
        .service
        .list_pending(query.school_id.as_deref(), query.page, query.page_size)
        .await?;
    Ok(Json(page))
}

/// Request history in any state, newest first.
///
/// GET /api/v1/admin/registration-requests?school_id&state&page&page_size
pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Page<RegistrationRequest>>, ApiError> {
    let request_state = query
        .state
        .as_deref()
        .map(str::parse::<RequestState>)
        .transpose()
        .map_err(ApiError::Validation)?;

    let page = state
        .service
        .list_history(
            query.school_id.as_deref(),
            request_state,
            query.page,
            query.page_size,
        )
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/admin/registration-requests/:request_id
pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<RegistrationRequest>, ApiError> {
    let request = state.service.get_request(request_id).await?;
    Ok(Json(request))
}

/// Approve a pending request, creating every account it asks for.
///
/// POST /api/v1/admin/registration-requests/:request_id/approve
pub async fn approve_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(review): Json<ReviewRequest>,
) -> Result<Json<ApprovalResult>, ApiError> {
    let result = state.service.approve(request_id, review.reviewer_id).await?;
    Ok(Json(result))
}

/// Reject a pending request. A reason is mandatory.
///
/// POST /api/v1/admin/registration-requests/:request_id/reject
pub async fn reject_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(review): Json<RejectRequest>,
) -> Result<Json<RegistrationRequest>, ApiError> {
    review.validate()?;

    let request = state
        .service
        .reject(request_id, review.reviewer_id, &review.reason)
        .await?;
    Ok(Json(request))
}
