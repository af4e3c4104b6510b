//! Invitation routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::{CreateInvitationRequest, Invitation, InvitationState, InvitationView, NewInvitation};
use serde::Deserialize;
use shared::pagination::Page;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

/// Query parameters for the administrative invitation listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListInvitationsQuery {
    /// Malformed values are ignored rather than rejected.
    pub school_id: Option<String>,
    pub state: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Create a new invitation.
///
/// POST /api/v1/admin/invitations
pub async fn create_invitation(
    State(state): State<AppState>,
    Json(request): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<Invitation>), ApiError> {
    request.validate()?;

    let invitation = state
        .service
        .create_invitation(NewInvitation::from(request))
        .await?;

    Ok((StatusCode::CREATED, Json(invitation)))
}

/// Validate an invitation code and return its public projection.
///
/// GET /api/v1/invitations/:code
///
/// Public. Expired, revoked and exhausted invitations answer 409 with the reason.
pub async fn validate_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<InvitationView>, ApiError> {
    let view = state.service.validate_code(&code).await?;
    Ok(Json(view))
}

/// Revoke an active invitation.
///
/// POST /api/v1/admin/invitations/:invitation_id/revoke
pub async fn revoke_invitation(
    State(state): State<AppState>,
    Path(invitation_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.service.revoke(invitation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List invitations, newest first.
///
/// GET /api/v1/admin/invitations?school_id&state&page&page_size
pub async fn list_invitations(
    State(state): State<AppState>,
    Query(query): Query<ListInvitationsQuery>,
) -> Result<Json<Page<Invitation>>, ApiError> {
    let invitation_state = query
        .state
        .as_deref()
        .map(str::parse::<InvitationState>)
        .transpose()
        .map_err(ApiError::Validation)?;

    let page = state
        .service
        .list_invitations(
            query.school_id.as_deref(),
            invitation_state,
            query.page,
            query.page_size,
        )
        .await?;

    Ok(Json(page))
}
