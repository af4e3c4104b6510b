//! Invitation entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{Invitation, InvitationKind, InvitationState, UsageEntry};
use sqlx::FromRow;
use uuid::Uuid;

use super::account::AccountRoleDb;

/// Database enum for invitation_kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invitation_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationKindDb {
    Course,
    SpecificStudent,
    Personal,
}

impl From<InvitationKindDb> for InvitationKind {
    fn from(db_kind: InvitationKindDb) -> Self {
        match db_kind {
            InvitationKindDb::Course => InvitationKind::Course,
            InvitationKindDb::SpecificStudent => InvitationKind::SpecificStudent,
            InvitationKindDb::Personal => InvitationKind::Personal,
        }
    }
}

impl From<InvitationKind> for InvitationKindDb {
    fn from(kind: InvitationKind) -> Self {
        match kind {
            InvitationKind::Course => InvitationKindDb::Course,
            InvitationKind::SpecificStudent => InvitationKindDb::SpecificStudent,
            InvitationKind::Personal => InvitationKindDb::Personal,
        }
    }
}

/// Database enum for invitation_state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invitation_state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStateDb {
    Active,
    Consumed,
    Revoked,
    Expired,
}

impl From<InvitationStateDb> for InvitationState {
    fn from(db_state: InvitationStateDb) -> Self {
        match db_state {
            InvitationStateDb::Active => InvitationState::Active,
            InvitationStateDb::Consumed => InvitationState::Consumed,
            InvitationStateDb::Revoked => InvitationState::Revoked,
            InvitationStateDb::Expired => InvitationState::Expired,
        }
    }
}

impl From<InvitationState> for InvitationStateDb {
    fn from(state: InvitationState) -> Self {
        match state {
            InvitationState::Active => InvitationStateDb::Active,
            InvitationState::Consumed => InvitationStateDb::Consumed,
            InvitationState::Revoked => InvitationStateDb::Revoked,
            InvitationState::Expired => InvitationStateDb::Expired,
        }
    }
}

/// Database row mapping for the invitations table.
#[derive(Debug, Clone, FromRow)]
pub struct InvitationEntity {
    pub id: Uuid,
    pub code: String,
    pub kind: InvitationKindDb,
    pub school_id: Uuid,
    pub course_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub state: InvitationStateDb,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub creator_id: Uuid,
    pub max_uses: i32,
    pub uses_so_far: i32,
    pub extra: Option<serde_json::Value>,
}

/// Database row mapping for the invitation_usages table.
#[derive(Debug, Clone, FromRow)]
pub struct InvitationUsageEntity {
    pub invitation_id: Uuid,
    pub account_id: Uuid,
    pub account_role: AccountRoleDb,
    pub used_at: DateTime<Utc>,
}

impl From<InvitationUsageEntity> for UsageEntry {
    fn from(entity: InvitationUsageEntity) -> Self {
        Self {
            account_id: entity.account_id,
            used_at: entity.used_at,
            account_role: entity.account_role.into(),
        }
    }
}

impl InvitationEntity {
    /// Builds the domain invitation from the row and its usage rows (oldest first).
    pub fn into_domain(self, usages: Vec<InvitationUsageEntity>) -> Invitation {
        Invitation {
            id: self.id,
            code: self.code,
            kind: self.kind.into(),
            school_id: self.school_id,
            course_id: self.course_id,
            student_id: self.student_id,
            state: self.state.into(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            consumed_at: self.consumed_at,
            creator_id: self.creator_id,
            max_uses: self.max_uses,
            uses_so_far: self.uses_so_far,
            usage_log: usages.into_iter().map(UsageEntry::from).collect(),
            extra: self.extra,
        }
    }
}
