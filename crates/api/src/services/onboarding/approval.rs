//! The approval transaction.
//!
//! Creates the guardian account and every new student account, updates
//! course rosters, consumes one invitation use and marks the request
//! approved, all in one unit of work. The confirmation email goes out only
//! after commit.

use chrono::{DateTime, Utc};
use domain::models::{
    Account, AccountRole, ApprovalResult, Course, RegistrationRequest, RequestState,
    StudentEntry, UsageEntry,
};
use domain::services::{ApprovalEmail, CredentialsEntry, StudentCredentialsEntry};
use domain::store::{in_transaction, OnboardingTx};
use domain::{OnboardingError, StoreError};
use shared::codes::{generate_account_credentials, AccountCredentials, CredentialPolicy};
use shared::password::hash_password;
use tracing::{info, warn};
use uuid::Uuid;

use super::invitations::consume_in_tx;
use super::OnboardingService;
use crate::middleware::metrics::{record_approval_failure, record_request_approved};

/// What the approval transaction needs besides the store.
struct ApprovalContext {
    request_id: Uuid,
    reviewer_id: Uuid,
    policy: CredentialPolicy,
    retry_budget: u32,
    now: DateTime<Utc>,
}

/// Hashes a generated password off the async executor.
async fn hash_generated_password(password: &str) -> Result<String, OnboardingError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| OnboardingError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(|e| OnboardingError::Internal(e.to_string()))
}

async fn insert_account(tx: &mut dyn OnboardingTx, account: &Account) -> Result<(), OnboardingError> {
    tx.insert_account(account).await.map_err(|e| match e {
        StoreError::Conflict(_) => OnboardingError::Conflict(format!(
            "email {} already belongs to an account",
            account.email
        )),
        other => other.into(),
    })
}

fn credentials_entry(credentials: &AccountCredentials) -> CredentialsEntry {
    CredentialsEntry {
        email: credentials.email.clone(),
        password: Some(credentials.password.clone()),
        code: Some(credentials.code.clone()),
        email_generated: credentials.email_generated,
    }
}

/// Generates student credentials, regenerating synthesized emails that are
/// already taken in the directory.
async fn student_credentials(
    tx: &mut dyn OnboardingTx,
    entry: &StudentEntry,
    ctx: &ApprovalContext,
) -> Result<AccountCredentials, OnboardingError> {
    for _ in 0..ctx.retry_budget {
        let credentials = generate_account_credentials(
            &entry.name,
            &entry.last_name,
            entry.email.as_deref(),
            entry.student_code.as_deref(),
            &ctx.policy,
        );
        // A supplied email is used as-is; a clash surfaces as a conflict on insert.
        if !credentials.email_generated
            || tx.find_account_by_email(&credentials.email).await?.is_none()
        {
            return Ok(credentials);
        }
    }
    Err(OnboardingError::Internal(format!(
        "could not find a free email for {} {} after {} attempts",
        entry.name, entry.last_name, ctx.retry_budget
    )))
}

/// Course name and grade/section label; blank when the course is missing.
fn course_labels(course: Option<&Course>) -> (String, String) {
    course
        .map(|c| (c.name.clone(), c.label()))
        .unwrap_or_default()
}

async fn approve_in_tx(
    tx: &mut dyn OnboardingTx,
    ctx: ApprovalContext,
) -> Result<(ApprovalResult, ApprovalEmail), OnboardingError> {
    let request: RegistrationRequest = tx
        .find_request(ctx.request_id)
        .await?
        .ok_or_else(|| {
            OnboardingError::NotFound(format!("registration request {}", ctx.request_id))
        })?;
    if request.state != RequestState::Pending {
        return Err(OnboardingError::InvalidState(format!(
            "request is {}",
            request.state.as_str()
        )));
    }

    let guardian_credentials = generate_account_credentials(
        &request.guardian.name,
        &request.guardian.last_name,
        Some(&request.guardian.email),
        None,
        &ctx.policy,
    );
    let guardian = Account {
        id: Uuid::new_v4(),
        school_id: request.school_id,
        role: AccountRole::Guardian,
        name: request.guardian.name.clone(),
        last_name: request.guardian.last_name.clone(),
        email: guardian_credentials.email.clone(),
        phone: request.guardian.phone.clone(),
        code: Some(guardian_credentials.code.clone()),
        password_hash: Some(hash_generated_password(&guardian_credentials.password).await?),
        active: true,
        associated_student_ids: Vec::new(),
        created_at: ctx.now,
    };
    insert_account(tx, &guardian).await?;

    let mut created_account_ids = vec![guardian.id];
    let mut associated_student_ids: Vec<Uuid> = Vec::with_capacity(request.students.len());
    let mut student_emails = Vec::with_capacity(request.students.len());

    for entry in &request.students {
        let course = tx.find_course(entry.course_id).await?;
        if course.is_none() {
            warn!(
                request_id = %request.id,
                course_id = %entry.course_id,
                "Course not found during approval, continuing with blank labels"
            );
        }
        let (course_name, course_label) = course_labels(course.as_ref());

        let (student_id, credentials, existing_account) = match entry.existing_student_id {
            Some(existing_id) => {
                let existing = tx.find_account(existing_id).await?.ok_or_else(|| {
                    OnboardingError::NotFound(format!("student {}", existing_id))
                })?;
                let credentials = CredentialsEntry {
                    email: existing.email.clone(),
                    password: None,
                    code: existing.code.clone(),
                    email_generated: false,
                };
                (existing.id, credentials, true)
            }
            None => {
                let generated = student_credentials(tx, entry, &ctx).await?;
                let student = Account {
                    id: Uuid::new_v4(),
                    school_id: request.school_id,
                    role: AccountRole::Student,
                    name: entry.name.clone(),
                    last_name: entry.last_name.clone(),
                    email: generated.email.clone(),
                    phone: None,
                    code: Some(generated.code.clone()),
                    password_hash: Some(hash_generated_password(&generated.password).await?),
                    active: true,
                    associated_student_ids: Vec::new(),
                    created_at: ctx.now,
                };
                insert_account(tx, &student).await?;
                created_account_ids.push(student.id);
                (student.id, credentials_entry(&generated), false)
            }
        };

        if course.is_some() {
            tx.add_student_to_course(entry.course_id, student_id).await?;
        }
        if !associated_student_ids.contains(&student_id) {
            associated_student_ids.push(student_id);
        }

        student_emails.push(StudentCredentialsEntry {
            account_id: student_id,
            name: entry.name.clone(),
            last_name: entry.last_name.clone(),
            course_name,
            course_label,
            existing_account,
            credentials,
        });
    }

    tx.set_associated_students(guardian.id, &associated_student_ids)
        .await?;

    let usage = UsageEntry {
        account_id: guardian.id,
        used_at: ctx.now,
        account_role: AccountRole::Guardian,
    };
    let invitation = consume_in_tx(tx, request.invitation_id, usage)
        .await
        .map_err(|e| match e {
            OnboardingError::InvalidState(reason) | OnboardingError::Conflict(reason) => {
                OnboardingError::Conflict(format!("invitation {}", reason))
            }
            other => other,
        })?;

    if !tx
        .approve_request(request.id, ctx.reviewer_id, ctx.now, &created_account_ids)
        .await?
    {
        return Err(OnboardingError::InvalidState(
            "request is no longer pending".to_string(),
        ));
    }

    let result = ApprovalResult {
        request_id: request.id,
        guardian_account_id: guardian.id,
        student_account_ids: associated_student_ids,
        created_account_ids,
        invitation,
    };
    let email = ApprovalEmail {
        request_id: request.id,
        guardian_name: request.guardian.name.clone(),
        guardian_last_name: request.guardian.last_name.clone(),
        guardian: credentials_entry(&guardian_credentials),
        students: student_emails,
    };
    Ok((result, email))
}

impl OnboardingService {
    /// Approves a pending request.
    ///
    /// On any failure the whole unit of work rolls back and the request stays
    /// `PENDING`. A failing confirmation email is logged and does not undo
    /// the committed approval.
    pub async fn approve(
        &self,
        request_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<ApprovalResult, OnboardingError> {
        let now = Utc::now();
        let ctx = ApprovalContext {
            request_id,
            reviewer_id,
            policy: self.settings.credential_policy(now),
            retry_budget: self.settings.code_retry_budget,
            now,
        };

        let outcome = self
            .with_deadline(
                "approve_request",
                in_transaction(self.store.as_ref(), move |tx| {
                    Box::pin(approve_in_tx(tx, ctx))
                }),
            )
            .await;

        let (result, email) = match outcome {
            Ok(approved) => approved,
            Err(e) => {
                record_approval_failure(e.kind());
                warn!(
                    request_id = %request_id,
                    reviewer_id = %reviewer_id,
                    error = %e,
                    "Approval rolled back"
                );
                return Err(e);
            }
        };

        record_request_approved();
        info!(
            request_id = %result.request_id,
            reviewer_id = %reviewer_id,
            guardian_account_id = %result.guardian_account_id,
            created_accounts = result.created_account_ids.len(),
            invitation_id = %result.invitation.invitation_id,
            uses_so_far = result.invitation.uses_so_far,
            "Registration request approved"
        );

        if let Err(e) = self.mailer.send_approval(email).await {
            warn!(
                request_id = %result.request_id,
                error = %e,
                "Approval email failed; accounts remain in place"
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_labels_blank_when_missing() {
        assert_eq!(course_labels(None), (String::new(), String::new()));

        let course = Course {
            id: Uuid::new_v4(),
            school_id: Uuid::new_v4(),
            name: "Math".into(),
            grade: "3rd Grade".into(),
            section: "B".into(),
            student_ids: vec![],
        };
        assert_eq!(
            course_labels(Some(&course)),
            ("Math".to_string(), "3rd Grade B".to_string())
        );
    }

    #[tokio::test]
    async fn test_hash_generated_password_verifies() {
        let hash = hash_generated_password("Kq7mWz2pRt").await.unwrap();
        assert!(shared::password::verify_password("Kq7mWz2pRt", &hash).unwrap());
    }
}
