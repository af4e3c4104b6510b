//! Registration request lifecycle: submit, reject, lookup and listings.

use chrono::{DateTime, Utc};
use domain::models::{
    Account, AccountRole, GuardianInfo, InvitationKind, RegistrationRequest, RequestFilter, RequestState, StudentEntry,
    SubmitRegistrationRequest,
};
use domain::services::{
    AdminNotification, NotificationResult, NotificationType, RejectionEmail,
    SubmissionReceivedEmail,
};
use domain::store::{in_transaction, OnboardingTx};
use domain::{OnboardingError, StoreError};
use shared::pagination::Page;
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::invitations::unavailable_error;
use super::{lenient_school_filter, OnboardingService};
use crate::middleware::metrics::{record_request_rejected, record_request_submitted};

fn same_name(entry: &StudentEntry, account: &Account) -> bool {
    entry.name.to_lowercase() == account.name.trim().to_lowercase()
        && entry.last_name.to_lowercase() == account.last_name.trim().to_lowercase()
}

/// Ties the request to the student a `SPECIFIC_STUDENT` invitation targets.
///
/// An entry already naming the student is kept as is. Otherwise the first
/// new-student entry with the student's name is linked to the existing account.
async fn link_invited_student(
    tx: &mut dyn OnboardingTx,
    student_id: Uuid,
    students: &mut [StudentEntry],
) -> Result<(), OnboardingError> {
    if students
        .iter()
        .any(|s| s.existing_student_id == Some(student_id))
    {
        return Ok(());
    }

    let target = tx
        .find_account(student_id)
        .await?
        .ok_or_else(|| OnboardingError::NotFound(format!("student {}", student_id)))?;
    let entry = students
        .iter_mut()
        .find(|s| s.existing_student_id.is_none() && same_name(s, &target))
        .ok_or_else(|| {
            OnboardingError::Validation(format!(
                "this invitation is for {} {}; the request must include them",
                target.name, target.last_name
            ))
        })?;
    entry.existing_student_id = Some(student_id);
    entry.is_existing_student = true;
    Ok(())
}

async fn submit_in_tx(
    tx: &mut dyn OnboardingTx,
    invitation_id: Uuid,
    guardian: GuardianInfo,
    mut students: Vec<StudentEntry>,
    now: DateTime<Utc>,
) -> Result<RegistrationRequest, OnboardingError> {
    // Re-checked here: the invitation may have changed since validation.
    let invitation = tx
        .find_invitation(invitation_id)
        .await?
        .ok_or_else(|| OnboardingError::NotFound(format!("invitation {}", invitation_id)))?;
    if let Some(reason) = invitation.unavailable_reason(now) {
        return Err(unavailable_error(reason));
    }
    let school_id = invitation.school_id;

    if let (InvitationKind::SpecificStudent, Some(student_id)) =
        (invitation.kind, invitation.student_id)
    {
        link_invited_student(tx, student_id, &mut students).await?;
    }

    let mut seen_emails = HashSet::from([guardian.email.clone()]);
    if tx.find_account_by_email(&guardian.email).await?.is_some() {
        return Err(OnboardingError::Conflict(format!(
            "email {} already belongs to an account",
            guardian.email
        )));
    }
    if tx.has_pending_request(school_id, &guardian.email).await? {
        return Err(OnboardingError::Conflict(
            "a pending request already exists for this guardian".to_string(),
        ));
    }

    for student in &students {
        let course = tx
            .find_course(student.course_id)
            .await?
            .ok_or_else(|| OnboardingError::NotFound(format!("course {}", student.course_id)))?;
        if course.school_id != school_id {
            return Err(OnboardingError::Validation(format!(
                "course {} belongs to another school",
                course.id
            )));
        }

        if let Some(existing_id) = student.existing_student_id {
            let existing = tx
                .find_account(existing_id)
                .await?
                .ok_or_else(|| OnboardingError::NotFound(format!("student {}", existing_id)))?;
            if existing.role != AccountRole::Student || existing.school_id != school_id {
                return Err(OnboardingError::Validation(format!(
                    "account {} is not a student of this school",
                    existing_id
                )));
            }
            continue;
        }

        if let Some(email) = &student.email {
            if !seen_emails.insert(email.clone()) {
                return Err(OnboardingError::Validation(format!(
                    "email {} appears more than once",
                    email
                )));
            }
            if tx.find_account_by_email(email).await?.is_some() {
                return Err(OnboardingError::Conflict(format!(
                    "email {} already belongs to an account",
                    email
                )));
            }
        }
    }

    let request = RegistrationRequest {
        id: Uuid::new_v4(),
        invitation_id,
        school_id,
        guardian,
        students,
        state: RequestState::Pending,
        submitted_at: now,
        reviewed_at: None,
        reviewer_id: None,
        comments: None,
        created_account_ids: Vec::new(),
    };
    tx.insert_request(&request).await.map_err(|e| match e {
        StoreError::Conflict(_) => OnboardingError::Conflict(
            "a pending request already exists for this guardian".to_string(),
        ),
        other => other.into(),
    })?;

    Ok(request)
}

async fn reject_in_tx(
    tx: &mut dyn OnboardingTx,
    request_id: Uuid,
    reviewer_id: Uuid,
    reason: String,
    now: DateTime<Utc>,
) -> Result<RegistrationRequest, OnboardingError> {
    let request = tx
        .find_request(request_id)
        .await?
        .ok_or_else(|| OnboardingError::NotFound(format!("registration request {}", request_id)))?;
    if !tx.reject_request(request_id, reviewer_id, now, &reason).await? {
        return Err(OnboardingError::InvalidState(format!(
            "request is {}",
            request.state.as_str()
        )));
    }
    Ok(RegistrationRequest {
        state: RequestState::Rejected,
        reviewed_at: Some(now),
        reviewer_id: Some(reviewer_id),
        comments: Some(reason),
        ..request
    })
}

impl OnboardingService {
    /// Submits a registration request against an invitation code.
    ///
    /// The code is validated first (committing a lazy expiry if found),
    /// then uniqueness is checked and the request stored as `PENDING` in a
    /// second unit of work. Admins and the guardian are notified after commit.
    pub async fn submit(
        &self,
        payload: SubmitRegistrationRequest,
    ) -> Result<RegistrationRequest, OnboardingError> {
        payload.validate()?;
        let (code, guardian, students) = payload
            .into_parts()
            .map_err(OnboardingError::Validation)?;

        let request = self
            .with_deadline("submit_request", async {
                let view = self.check_code(&code).await?;
                let invitation_id = view.id;
                let now = Utc::now();
                in_transaction(self.store.as_ref(), move |tx| {
                    Box::pin(submit_in_tx(tx, invitation_id, guardian, students, now))
                })
                .await
            })
            .await?;

        record_request_submitted();
        info!(
            request_id = %request.id,
            invitation_id = %request.invitation_id,
            school_id = %request.school_id,
            students = request.students.len(),
            "Registration request submitted"
        );

        self.announce_submission(&request).await;
        Ok(request)
    }

    async fn announce_submission(&self, request: &RegistrationRequest) {
        let guardian_name = format!("{} {}", request.guardian.name, request.guardian.last_name);
        let student_names: Vec<String> = request
            .students
            .iter()
            .map(|s| format!("{} {}", s.name, s.last_name))
            .collect();

        let notification = AdminNotification {
            notification_type: NotificationType::RegistrationRequestSubmitted,
            school_id: request.school_id,
            request_id: request.id,
            title: "New registration request".to_string(),
            body: format!(
                "{} requested access for {} student(s)",
                guardian_name,
                student_names.len()
            ),
            timestamp: request.submitted_at,
        };
        if let NotificationResult::Failed(reason) =
            self.notifier.notify_school_admins(notification).await
        {
            warn!(request_id = %request.id, reason = %reason, "Admin notification failed");
        }

        let email = SubmissionReceivedEmail {
            request_id: request.id,
            school_id: request.school_id,
            guardian_name: request.guardian.name.clone(),
            guardian_email: request.guardian.email.clone(),
            student_names,
        };
        if let Err(e) = self.mailer.send_submission_received(email).await {
            warn!(request_id = %request.id, error = %e, "Submission acknowledgement email failed");
        }
    }

    /// Rejects a pending request with a mandatory reason.
    pub async fn reject(
        &self,
        request_id: Uuid,
        reviewer_id: Uuid,
        reason: &str,
    ) -> Result<RegistrationRequest, OnboardingError> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(OnboardingError::Validation(
                "A rejection reason is required".to_string(),
            ));
        }
        let now = Utc::now();

        let request = self
            .with_deadline(
                "reject_request",
                in_transaction(self.store.as_ref(), move |tx| {
                    Box::pin(reject_in_tx(tx, request_id, reviewer_id, reason, now))
                }),
            )
            .await?;

        record_request_rejected();
        info!(
            request_id = %request.id,
            reviewer_id = %reviewer_id,
            "Registration request rejected"
        );

        let email = RejectionEmail {
            request_id: request.id,
            guardian_name: request.guardian.name.clone(),
            guardian_email: request.guardian.email.clone(),
            reason: request.comments.clone().unwrap_or_default(),
        };
        if let Err(e) = self.mailer.send_rejection(email).await {
            warn!(request_id = %request.id, error = %e, "Rejection email failed");
        }

        Ok(request)
    }

    pub async fn get_request(&self, request_id: Uuid) -> Result<RegistrationRequest, OnboardingError> {
        self.with_deadline(
            "get_request",
            in_transaction(self.store.as_ref(), move |tx| {
                Box::pin(async move {
                    tx.find_request(request_id).await?.ok_or_else(|| {
                        OnboardingError::NotFound(format!("registration request {}", request_id))
                    })
                })
            }),
        )
        .await
    }

    /// Pending requests, newest first.
    pub async fn list_pending(
        &self,
        school_id: Option<&str>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<RegistrationRequest>, OnboardingError> {
        self.list_requests(school_id, Some(RequestState::Pending), page, page_size)
            .await
    }

    /// Requests in any (or the given) state, newest first.
    pub async fn list_history(
        &self,
        school_id: Option<&str>,
        state: Option<RequestState>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<RegistrationRequest>, OnboardingError> {
        self.list_requests(school_id, state, page, page_size).await
    }

    async fn list_requests(
        &self,
        school_id: Option<&str>,
        state: Option<RequestState>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<RegistrationRequest>, OnboardingError> {
        let filter = RequestFilter {
            school_id: lenient_school_filter(school_id),
            state,
        };
        let request = self.page_request(page, page_size);

        let (items, total) = self
            .with_deadline(
                "list_requests",
                in_transaction(self.store.as_ref(), move |tx| {
                    Box::pin(async move {
                        Ok::<_, OnboardingError>(tx.list_requests(&filter, request).await?)
                    })
                }),
            )
            .await?;

        Ok(Page::new(items, request, total))
    }
}
