//! Outbound collaborator ports for onboarding.
//!
//! The core never sends anything itself; it hands structured payloads to a
//! [`Mailer`] and a [`Notifier`] and treats their failures as non-fatal.

pub mod mailer;
pub mod notification;

pub use mailer::{
    ApprovalEmail, CredentialsEntry, MailError, Mailer, MockMailer, RejectionEmail, SentMail,
    StudentCredentialsEntry, SubmissionReceivedEmail,
};
pub use notification::{
    AdminNotification, MockNotifier, NotificationResult, NotificationType, Notifier,
};
