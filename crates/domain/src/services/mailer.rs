//! Outbound email payloads and the mailer port.
//!
//! Templates belong to the mailer implementation; the core only supplies
//! structured data.

use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while handing an email to the provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MailError {
    #[error("Mailer not configured")]
    NotConfigured,

    #[error("Failed to send email: {0}")]
    SendFailed(String),
}

/// Login credentials for one account, as shown once in the approval email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CredentialsEntry {
    pub email: String,
    /// `None` for accounts that already existed before the approval.
    pub password: Option<String>,
    pub code: Option<String>,
    /// True when the address was synthesized rather than supplied.
    pub email_generated: bool,
}

/// Per-student section of the approval email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StudentCredentialsEntry {
    pub account_id: Uuid,
    pub name: String,
    pub last_name: String,
    pub course_name: String,
    /// Grade/section label; blank when the course could not be resolved.
    pub course_label: String,
    pub existing_account: bool,
    pub credentials: CredentialsEntry,
}

/// Approval confirmation sent to the guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ApprovalEmail {
    pub request_id: Uuid,
    pub guardian_name: String,
    pub guardian_last_name: String,
    pub guardian: CredentialsEntry,
    /// In submission order.
    pub students: Vec<StudentCredentialsEntry>,
}

/// Rejection notice sent to the guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RejectionEmail {
    pub request_id: Uuid,
    pub guardian_name: String,
    pub guardian_email: String,
    pub reason: String,
}

/// Acknowledgement that a request was received and awaits review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SubmissionReceivedEmail {
    pub request_id: Uuid,
    pub school_id: Uuid,
    pub guardian_name: String,
    pub guardian_email: String,
    pub student_names: Vec<String>,
}

/// Mailer trait for onboarding emails.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send_submission_received(&self, email: SubmissionReceivedEmail)
        -> Result<(), MailError>;

    async fn send_approval(&self, email: ApprovalEmail) -> Result<(), MailError>;

    async fn send_rejection(&self, email: RejectionEmail) -> Result<(), MailError>;
}

/// An email captured by [`MockMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMail {
    SubmissionReceived(SubmissionReceivedEmail),
    Approval(ApprovalEmail),
    Rejection(RejectionEmail),
}

/// Mock mailer for development and testing.
///
/// Records every email instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct MockMailer {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
    sent: Arc<Mutex<Vec<SentMail>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Emails recorded so far, in send order.
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Approval emails recorded so far.
    pub fn approvals(&self) -> Vec<ApprovalEmail> {
        self.sent()
            .into_iter()
            .filter_map(|mail| match mail {
                SentMail::Approval(email) => Some(email),
                _ => None,
            })
            .collect()
    }

    fn record(&self, mail: SentMail) -> Result<(), MailError> {
        if self.simulate_failure {
            tracing::warn!("Mock mailer simulating failure");
            return Err(MailError::SendFailed("Simulated failure".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Mailer for MockMailer {
    async fn send_submission_received(
        &self,
        email: SubmissionReceivedEmail,
    ) -> Result<(), MailError> {
        self.record(SentMail::SubmissionReceived(email))
    }

    async fn send_approval(&self, email: ApprovalEmail) -> Result<(), MailError> {
        self.record(SentMail::Approval(email))
    }

    async fn send_rejection(&self, email: RejectionEmail) -> Result<(), MailError> {
        self.record(SentMail::Rejection(email))
    }
}
