//! Invitation lifecycle: create, validate, consume, revoke, list.

use chrono::{DateTime, Datelike, Utc};
use domain::models::{
    AccountRole, CourseSummary, Invitation, InvitationFilter, InvitationKind, InvitationState,
    InvitationView, NewInvitation, StudentSummary, UsageEntry, UsageResult,
};
use domain::store::{in_transaction, OnboardingTx};
use domain::{OnboardingError, StoreError};
use shared::codes::{generate_invitation_code, validate_prefix, CodeError};
use shared::pagination::Page;
use shared::validation::validate_invitation_code;
use tracing::{info, warn};
use uuid::Uuid;

use super::{lenient_school_filter, OnboardingService};

/// Maps an unavailability reason to the error callers see.
///
/// An exhausted invitation is a conflict with earlier uses; expired and
/// revoked invitations are in the wrong state.
pub(crate) fn unavailable_error(reason: &'static str) -> OnboardingError {
    match reason {
        "exhausted" => OnboardingError::Conflict(reason.to_string()),
        _ => OnboardingError::InvalidState(reason.to_string()),
    }
}

/// Result of looking a code up, decided before the unit of work commits.
enum CodeCheck {
    Usable(InvitationView),
    Unavailable(&'static str),
}

async fn create_in_tx(
    tx: &mut dyn OnboardingTx,
    new: NewInvitation,
    prefix: String,
    retry_budget: u32,
    now: DateTime<Utc>,
) -> Result<Invitation, OnboardingError> {
    if let Some(course_id) = new.course_id {
        let course = tx
            .find_course(course_id)
            .await?
            .ok_or_else(|| OnboardingError::NotFound(format!("course {}", course_id)))?;
        if course.school_id != new.school_id {
            return Err(OnboardingError::Validation(
                "course_id belongs to another school".to_string(),
            ));
        }
    }
    if let Some(student_id) = new.student_id {
        let student = tx
            .find_account(student_id)
            .await?
            .ok_or_else(|| OnboardingError::NotFound(format!("student {}", student_id)))?;
        if student.role != AccountRole::Student || student.school_id != new.school_id {
            return Err(OnboardingError::Validation(
                "student_id must reference a student of the same school".to_string(),
            ));
        }
    }

    let mut code = None;
    for _ in 0..retry_budget {
        let candidate = generate_invitation_code(&prefix, now.year())
            .map_err(|e| OnboardingError::Validation(e.to_string()))?;
        if !tx.invitation_code_exists(&candidate).await? {
            code = Some(candidate);
            break;
        }
    }
    let code = code.ok_or_else(|| {
        OnboardingError::Internal(CodeError::RetryBudgetExhausted(retry_budget).to_string())
    })?;

    let invitation = Invitation {
        id: Uuid::new_v4(),
        code,
        kind: new.kind,
        school_id: new.school_id,
        course_id: new.course_id,
        student_id: new.student_id,
        state: InvitationState::Active,
        created_at: now,
        expires_at: new.expires_at,
        consumed_at: None,
        creator_id: new.creator_id,
        max_uses: new.max_uses,
        uses_so_far: 0,
        usage_log: Vec::new(),
        extra: new.extra,
    };

    // A concurrent insert can still take the code between check and insert.
    tx.insert_invitation(&invitation).await.map_err(|e| match e {
        StoreError::Conflict(_) => {
            OnboardingError::Internal("invitation code collided, retry".to_string())
        }
        other => other.into(),
    })?;

    Ok(invitation)
}

async fn check_code_in_tx(
    tx: &mut dyn OnboardingTx,
    code: String,
    now: DateTime<Utc>,
) -> Result<CodeCheck, OnboardingError> {
    let invitation = tx
        .find_invitation_by_code(&code)
        .await?
        .ok_or_else(|| OnboardingError::NotFound(format!("invitation {}", code)))?;

    if invitation.state == InvitationState::Active && invitation.is_expired_at(now) {
        tx.expire_invitation(invitation.id).await?;
        info!(invitation_id = %invitation.id, "Invitation expired on read");
        return Ok(CodeCheck::Unavailable("expired"));
    }
    if let Some(reason) = invitation.unavailable_reason(now) {
        return Ok(CodeCheck::Unavailable(reason));
    }

    let course = match (invitation.kind, invitation.course_id) {
        (InvitationKind::Course, Some(course_id)) => tx
            .find_course(course_id)
            .await?
            .as_ref()
            .map(CourseSummary::from),
        _ => None,
    };
    let student = match invitation.student_id {
        Some(student_id) => tx
            .find_account(student_id)
            .await?
            .as_ref()
            .map(StudentSummary::from),
        None => None,
    };

    Ok(CodeCheck::Usable(invitation.view(course, student)))
}

/// Records one use of an invitation inside an open unit of work.
///
/// Fails with `InvalidState` when the conditional update loses, carrying
/// the reason the invitation is no longer usable.
pub(crate) async fn consume_in_tx(
    tx: &mut dyn OnboardingTx,
    invitation_id: Uuid,
    usage: UsageEntry,
) -> Result<UsageResult, OnboardingError> {
    match tx.consume_invitation(invitation_id, &usage).await? {
        Some(updated) => Ok(UsageResult {
            invitation_id: updated.id,
            uses_so_far: updated.uses_so_far,
            max_uses: updated.max_uses,
            state: updated.state,
        }),
        None => {
            let current = tx
                .find_invitation(invitation_id)
                .await?
                .ok_or_else(|| OnboardingError::NotFound(format!("invitation {}", invitation_id)))?;
            let reason = current.unavailable_reason(usage.used_at).unwrap_or("not active");
            Err(OnboardingError::InvalidState(reason.to_string()))
        }
    }
}

async fn revoke_in_tx(tx: &mut dyn OnboardingTx, invitation_id: Uuid) -> Result<(), OnboardingError> {
    let invitation = tx
        .find_invitation(invitation_id)
        .await?
        .ok_or_else(|| OnboardingError::NotFound(format!("invitation {}", invitation_id)))?;
    if !tx.revoke_invitation(invitation_id).await? {
        return Err(OnboardingError::InvalidState(format!(
            "invitation is {}",
            invitation.state.as_str()
        )));
    }
    Ok(())
}

impl OnboardingService {
    /// Creates an invitation with a fresh, collision-checked code.
    pub async fn create_invitation(&self, new: NewInvitation) -> Result<Invitation, OnboardingError> {
        let now = Utc::now();
        new.check_target(now).map_err(OnboardingError::Validation)?;
        let prefix = new
            .code_prefix
            .clone()
            .unwrap_or_else(|| new.kind.code_prefix().to_string());
        validate_prefix(&prefix).map_err(|e| OnboardingError::Validation(e.to_string()))?;
        let retry_budget = self.settings.code_retry_budget;

        let invitation = self
            .with_deadline(
                "create_invitation",
                in_transaction(self.store.as_ref(), move |tx| {
                    Box::pin(create_in_tx(tx, new, prefix, retry_budget, now))
                }),
            )
            .await?;

        info!(
            invitation_id = %invitation.id,
            code = %invitation.code,
            kind = invitation.kind.as_str(),
            school_id = %invitation.school_id,
            max_uses = invitation.max_uses,
            "Invitation created"
        );
        Ok(invitation)
    }

    /// Checks a code and returns its public projection.
    ///
    /// An active invitation found past its expiry is moved to `EXPIRED`
    /// and that change is committed before the error is reported.
    pub async fn validate_code(&self, code: &str) -> Result<InvitationView, OnboardingError> {
        self.with_deadline("validate_code", self.check_code(code))
            .await
    }

    pub(super) async fn check_code(&self, code: &str) -> Result<InvitationView, OnboardingError> {
        validate_invitation_code(code)
            .map_err(|_| OnboardingError::Validation("Malformed invitation code".to_string()))?;
        let code = code.to_string();
        let now = Utc::now();

        let check = in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(check_code_in_tx(tx, code, now))
        })
        .await?;

        match check {
            CodeCheck::Usable(view) => Ok(view),
            CodeCheck::Unavailable(reason) => Err(unavailable_error(reason)),
        }
    }

    /// Records one use of an invitation in its own unit of work.
    pub async fn consume(
        &self,
        invitation_id: Uuid,
        account_id: Uuid,
        account_role: AccountRole,
    ) -> Result<UsageResult, OnboardingError> {
        let usage = UsageEntry {
            account_id,
            used_at: Utc::now(),
            account_role,
        };
        let result = self
            .with_deadline(
                "consume_invitation",
                in_transaction(self.store.as_ref(), move |tx| {
                    Box::pin(consume_in_tx(tx, invitation_id, usage))
                }),
            )
            .await?;

        info!(
            invitation_id = %invitation_id,
            account_id = %account_id,
            uses_so_far = result.uses_so_far,
            max_uses = result.max_uses,
            state = result.state.as_str(),
            "Invitation consumed"
        );
        Ok(result)
    }

    /// Revokes an active invitation. Revoking twice is reported, not ignored.
    pub async fn revoke(&self, invitation_id: Uuid) -> Result<(), OnboardingError> {
        let result = self
            .with_deadline(
                "revoke_invitation",
                in_transaction(self.store.as_ref(), move |tx| {
                    Box::pin(revoke_in_tx(tx, invitation_id))
                }),
            )
            .await;

        match &result {
            Ok(()) => info!(invitation_id = %invitation_id, "Invitation revoked"),
            Err(e) => warn!(invitation_id = %invitation_id, error = %e, "Revoke refused"),
        }
        result
    }

    /// Lists invitations newest first. A malformed school filter is ignored.
    pub async fn list_invitations(
        &self,
        school_id: Option<&str>,
        state: Option<InvitationState>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<Invitation>, OnboardingError> {
        let filter = InvitationFilter {
            school_id: lenient_school_filter(school_id),
            state,
        };
        let request = self.page_request(page, page_size);

        let (items, total) = self
            .with_deadline(
                "list_invitations",
                in_transaction(self.store.as_ref(), move |tx| {
                    Box::pin(async move {
                        Ok::<_, OnboardingError>(tx.list_invitations(&filter, request).await?)
                    })
                }),
            )
            .await?;

        Ok(Page::new(items, request, total))
    }
}
