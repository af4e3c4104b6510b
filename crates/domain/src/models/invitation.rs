//! Invitation domain models for enrollment onboarding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::account::AccountRole;
use super::course::{CourseSummary, StudentSummary};

/// What an invitation grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationKind {
    /// Enrollment into a specific course.
    Course,
    /// Linking a guardian to a student that already exists.
    SpecificStudent,
    /// Personal invitation with no course or student target.
    Personal,
}

impl InvitationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationKind::Course => "COURSE",
            InvitationKind::SpecificStudent => "SPECIFIC_STUDENT",
            InvitationKind::Personal => "PERSONAL",
        }
    }

    /// Default code prefix for this kind.
    pub fn code_prefix(&self) -> &'static str {
        match self {
            InvitationKind::Course => "CU",
            InvitationKind::SpecificStudent => "ST",
            InvitationKind::Personal => "PE",
        }
    }
}

impl FromStr for InvitationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COURSE" => Ok(InvitationKind::Course),
            "SPECIFIC_STUDENT" => Ok(InvitationKind::SpecificStudent),
            "PERSONAL" => Ok(InvitationKind::Personal),
            other => Err(format!("Unknown invitation kind: {}", other)),
        }
    }
}

/// Invitation lifecycle state. Everything but `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationState {
    Active,
    Consumed,
    Revoked,
    Expired,
}

impl InvitationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationState::Active => "ACTIVE",
            InvitationState::Consumed => "CONSUMED",
            InvitationState::Revoked => "REVOKED",
            InvitationState::Expired => "EXPIRED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationState::Active)
    }
}

impl FromStr for InvitationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(InvitationState::Active),
            "CONSUMED" => Ok(InvitationState::Consumed),
            "REVOKED" => Ok(InvitationState::Revoked),
            "EXPIRED" => Ok(InvitationState::Expired),
            other => Err(format!("Unknown invitation state: {}", other)),
        }
    }
}

/// One recorded use of an invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UsageEntry {
    pub account_id: Uuid,
    pub used_at: DateTime<Utc>,
    pub account_role: AccountRole,
}

/// A persisted invitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Invitation {
    pub id: Uuid,
    pub code: String,
    pub kind: InvitationKind,
    pub school_id: Uuid,
    pub course_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub state: InvitationState,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub creator_id: Uuid,
    pub max_uses: i32,
    pub uses_so_far: i32,
    pub usage_log: Vec<UsageEntry>,
    pub extra: Option<serde_json::Value>,
}

impl Invitation {
    /// Whether the expiry time has been reached at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn remaining_uses(&self) -> i32 {
        (self.max_uses - self.uses_so_far).max(0)
    }

    /// Reason this invitation cannot be used at `now`, if any.
    ///
    /// Returns `"expired"`, `"revoked"` or `"exhausted"`.
    pub fn unavailable_reason(&self, now: DateTime<Utc>) -> Option<&'static str> {
        match self.state {
            InvitationState::Revoked => Some("revoked"),
            InvitationState::Consumed => Some("exhausted"),
            InvitationState::Expired => Some("expired"),
            InvitationState::Active if self.is_expired_at(now) => Some("expired"),
            InvitationState::Active if self.uses_so_far >= self.max_uses => Some("exhausted"),
            InvitationState::Active => None,
        }
    }

    /// Records one use if the invitation is still usable at `entry.used_at`.
    ///
    /// Increments the counter, appends to the usage log and flips to
    /// `Consumed` when the cap is reached, all or nothing. Returns `false`
    /// without touching anything otherwise.
    pub fn apply_usage(&mut self, entry: UsageEntry) -> bool {
        if self.unavailable_reason(entry.used_at).is_some() {
            return false;
        }
        self.uses_so_far += 1;
        if self.uses_so_far >= self.max_uses {
            self.state = InvitationState::Consumed;
            self.consumed_at = Some(entry.used_at);
        }
        self.usage_log.push(entry);
        true
    }

    /// Public projection, without the usage log or creator.
    pub fn view(
        &self,
        course: Option<CourseSummary>,
        student: Option<StudentSummary>,
    ) -> InvitationView {
        InvitationView {
            id: self.id,
            code: self.code.clone(),
            kind: self.kind,
            school_id: self.school_id,
            expires_at: self.expires_at,
            remaining_uses: self.remaining_uses(),
            course,
            student,
        }
    }
}

/// Read projection returned by a successful code validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InvitationView {
    pub id: Uuid,
    pub code: String,
    pub kind: InvitationKind,
    pub school_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_uses: i32,
    pub course: Option<CourseSummary>,
    pub student: Option<StudentSummary>,
}

/// Outcome of consuming one use of an invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct UsageResult {
    pub invitation_id: Uuid,
    pub uses_so_far: i32,
    pub max_uses: i32,
    pub state: InvitationState,
}

/// Input for creating an invitation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvitation {
    pub kind: InvitationKind,
    pub school_id: Uuid,
    pub course_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub creator_id: Uuid,
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    /// Overrides the kind's default code prefix.
    pub code_prefix: Option<String>,
    pub extra: Option<serde_json::Value>,
}

impl NewInvitation {
    /// Checks the target fields against the kind and the usage cap.
    ///
    /// School ownership of the target is checked by the service against the store.
    pub fn check_target(&self, now: DateTime<Utc>) -> Result<(), String> {
        match self.kind {
            InvitationKind::Course if self.course_id.is_none() => {
                return Err("course_id is required for COURSE invitations".into());
            }
            InvitationKind::SpecificStudent if self.student_id.is_none() => {
                return Err("student_id is required for SPECIFIC_STUDENT invitations".into());
            }
            InvitationKind::Course if self.student_id.is_some() => {
                return Err("student_id is not allowed for COURSE invitations".into());
            }
            _ => {}
        }
        if self.max_uses < 1 {
            return Err("max_uses must be at least 1".into());
        }
        if self.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err("expires_at must be in the future".into());
        }
        Ok(())
    }
}

/// Filter for administrative invitation listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvitationFilter {
    pub school_id: Option<Uuid>,
    pub state: Option<InvitationState>,
}

/// Request to create a new invitation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateInvitationRequest {
    pub kind: InvitationKind,
    pub school_id: Uuid,
    pub course_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub creator_id: Uuid,

    /// Maximum uses (1-1000, default: 1)
    #[validate(range(min = 1, max = 1000, message = "max_uses must be between 1 and 1000"))]
    pub max_uses: Option<i32>,

    pub expires_at: Option<DateTime<Utc>>,

    #[validate(custom(function = "validate_code_prefix"))]
    pub code_prefix: Option<String>,

    pub extra: Option<serde_json::Value>,
}

fn validate_code_prefix(prefix: &str) -> Result<(), ValidationError> {
    shared::codes::validate_prefix(prefix).map_err(|_| {
        let mut err = ValidationError::new("code_prefix");
        err.message = Some("code_prefix must be 1-4 uppercase letters or digits".into());
        err
    })
}

impl From<CreateInvitationRequest> for NewInvitation {
    fn from(request: CreateInvitationRequest) -> Self {
        Self {
            kind: request.kind,
            school_id: request.school_id,
            course_id: request.course_id,
            student_id: request.student_id,
            creator_id: request.creator_id,
            max_uses: request.max_uses.unwrap_or(1),
            expires_at: request.expires_at,
            code_prefix: request.code_prefix,
            extra: request.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(max_uses: i32) -> Invitation {
        Invitation {
            id: Uuid::new_v4(),
            code: "CU25-AB3K7M".into(),
            kind: InvitationKind::Course,
            school_id: Uuid::new_v4(),
            course_id: Some(Uuid::new_v4()),
            student_id: None,
            state: InvitationState::Active,
            created_at: Utc::now(),
            expires_at: None,
            consumed_at: None,
            creator_id: Uuid::new_v4(),
            max_uses,
            uses_so_far: 0,
            usage_log: vec![],
            extra: None,
        }
    }

    fn usage() -> UsageEntry {
        UsageEntry {
            account_id: Uuid::new_v4(),
            used_at: Utc::now(),
            account_role: AccountRole::Guardian,
        }
    }

    #[test]
    fn test_apply_usage_flips_to_consumed_at_cap() {
        let mut inv = invitation(2);
        assert!(inv.apply_usage(usage()));
        assert_eq!(inv.state, InvitationState::Active);
        assert!(inv.apply_usage(usage()));
        assert_eq!(inv.state, InvitationState::Consumed);
        assert_eq!(inv.uses_so_far, 2);
        assert_eq!(inv.usage_log.len(), 2);
        assert!(inv.consumed_at.is_some());

        assert!(!inv.apply_usage(usage()));
        assert_eq!(inv.uses_so_far, 2);
        assert_eq!(inv.usage_log.len(), 2);
    }

    #[test]
    fn test_apply_usage_refuses_expired_and_revoked() {
        let mut expired = invitation(1);
        expired.expires_at = Some(Utc::now() - Duration::minutes(1));
        assert!(!expired.apply_usage(usage()));
        assert_eq!(expired.uses_so_far, 0);

        let mut revoked = invitation(1);
        revoked.state = InvitationState::Revoked;
        assert!(!revoked.apply_usage(usage()));
    }

    #[test]
    fn test_unavailable_reason() {
        let now = Utc::now();
        let mut inv = invitation(1);
        assert_eq!(inv.unavailable_reason(now), None);

        inv.expires_at = Some(now - Duration::seconds(1));
        assert_eq!(inv.unavailable_reason(now), Some("expired"));

        inv.expires_at = None;
        inv.state = InvitationState::Consumed;
        assert_eq!(inv.unavailable_reason(now), Some("exhausted"));

        inv.state = InvitationState::Revoked;
        assert_eq!(inv.unavailable_reason(now), Some("revoked"));
    }

    #[test]
    fn test_view_hides_usage_log() {
        let mut inv = invitation(3);
        inv.apply_usage(usage());
        let view = inv.view(None, None);
        assert_eq!(view.remaining_uses, 2);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("usage_log"));
        assert!(!json.contains("creator_id"));
    }

    #[test]
    fn test_check_target() {
        let now = Utc::now();
        let base = NewInvitation {
            kind: InvitationKind::Course,
            school_id: Uuid::new_v4(),
            course_id: None,
            student_id: None,
            creator_id: Uuid::new_v4(),
            max_uses: 1,
            expires_at: None,
            code_prefix: None,
            extra: None,
        };
        assert!(base.check_target(now).is_err());

        let course = NewInvitation {
            course_id: Some(Uuid::new_v4()),
            ..base.clone()
        };
        assert!(course.check_target(now).is_ok());

        let zero_uses = NewInvitation {
            max_uses: 0,
            ..course.clone()
        };
        assert!(zero_uses.check_target(now).is_err());

        let past = NewInvitation {
            expires_at: Some(now - Duration::hours(1)),
            ..course.clone()
        };
        assert!(past.check_target(now).is_err());

        let student = NewInvitation {
            kind: InvitationKind::SpecificStudent,
            ..base.clone()
        };
        assert!(student.check_target(now).is_err());

        let personal = NewInvitation {
            kind: InvitationKind::Personal,
            ..base
        };
        assert!(personal.check_target(now).is_ok());
    }

    #[test]
    fn test_create_invitation_request_validation() {
        let valid: CreateInvitationRequest = serde_json::from_value(serde_json::json!({
            "kind": "COURSE",
            "school_id": Uuid::new_v4(),
            "course_id": Uuid::new_v4(),
            "creator_id": Uuid::new_v4(),
            "max_uses": 5,
            "code_prefix": "CU"
        }))
        .unwrap();
        assert!(valid.validate().is_ok());
        assert_eq!(NewInvitation::from(valid).max_uses, 5);

        let too_many_uses = CreateInvitationRequest {
            max_uses: Some(5000),
            code_prefix: None,
            ..serde_json::from_value(serde_json::json!({
                "kind": "PERSONAL",
                "school_id": Uuid::new_v4(),
                "creator_id": Uuid::new_v4()
            }))
            .unwrap()
        };
        assert!(too_many_uses.validate().is_err());

        let bad_prefix: CreateInvitationRequest = serde_json::from_value(serde_json::json!({
            "kind": "PERSONAL",
            "school_id": Uuid::new_v4(),
            "creator_id": Uuid::new_v4(),
            "code_prefix": "toolong"
        }))
        .unwrap();
        assert!(bad_prefix.validate().is_err());
    }
}
