//! Registration request entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{GuardianInfo, RegistrationRequest, RequestState, StudentEntry};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for request_state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "request_state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStateDb {
    Pending,
    Approved,
    Rejected,
}

impl From<RequestStateDb> for RequestState {
    fn from(db_state: RequestStateDb) -> Self {
        match db_state {
            RequestStateDb::Pending => RequestState::Pending,
            RequestStateDb::Approved => RequestState::Approved,
            RequestStateDb::Rejected => RequestState::Rejected,
        }
    }
}

impl From<RequestState> for RequestStateDb {
    fn from(state: RequestState) -> Self {
        match state {
            RequestState::Pending => RequestStateDb::Pending,
            RequestState::Approved => RequestStateDb::Approved,
            RequestState::Rejected => RequestStateDb::Rejected,
        }
    }
}

/// Database row mapping for the registration_requests table.
///
/// Student entries are stored as a JSONB array in submission order.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationRequestEntity {
    pub id: Uuid,
    pub invitation_id: Uuid,
    pub school_id: Uuid,
    pub guardian_name: String,
    pub guardian_last_name: String,
    pub guardian_email: String,
    pub guardian_phone: Option<String>,
    pub students: Json<Vec<StudentEntry>>,
    pub state: RequestStateDb,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer_id: Option<Uuid>,
    pub comments: Option<String>,
    pub created_account_ids: Vec<Uuid>,
}

impl From<RegistrationRequestEntity> for RegistrationRequest {
    fn from(entity: RegistrationRequestEntity) -> Self {
        Self {
            id: entity.id,
            invitation_id: entity.invitation_id,
            school_id: entity.school_id,
            guardian: GuardianInfo {
                name: entity.guardian_name,
                last_name: entity.guardian_last_name,
                email: entity.guardian_email,
                phone: entity.guardian_phone,
            },
            students: entity.students.0,
            state: entity.state.into(),
            submitted_at: entity.submitted_at,
            reviewed_at: entity.reviewed_at,
            reviewer_id: entity.reviewer_id,
            comments: entity.comments,
            created_account_ids: entity.created_account_ids,
        }
    }
}
