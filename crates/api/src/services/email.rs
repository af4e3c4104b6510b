//! Email delivery for onboarding messages.
//!
//! Renders the structured payloads handed over by the onboarding service
//! into plain-text messages. Supported providers:
//! - `console`: logs emails (development)

use async_trait::async_trait;
use domain::services::{
    ApprovalEmail, CredentialsEntry, MailError, Mailer, RejectionEmail, SubmissionReceivedEmail,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::EmailConfig;

/// Email message to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body_text: String,
}

/// Email service implementing the onboarding [`Mailer`].
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send an email message.
    pub async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if !self.config.enabled {
            debug!(
                to = %message.to,
                subject = %message.subject,
                "Email service disabled, skipping send"
            );
            return Ok(());
        }

        match self.config.provider.as_str() {
            "console" => self.send_console(message).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(MailError::NotConfigured)
            }
        }
    }

    /// Console provider. Bodies may carry plaintext credentials, so they are
    /// only logged at debug level.
    async fn send_console(&self, message: EmailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            to_name = ?message.to_name,
            subject = %message.subject,
            from = %self.config.sender_email,
            from_name = %self.config.sender_name,
            "Email (console provider)"
        );
        debug!(body_text = %message.body_text, "Email body");
        Ok(())
    }

    fn signature(&self) -> String {
        format!("Best regards,\n{}", self.config.sender_name)
    }
}

fn write_credentials(body: &mut String, credentials: &CredentialsEntry) {
    let _ = writeln!(body, "  Email: {}", credentials.email);
    if credentials.email_generated {
        let _ = writeln!(body, "  (this address was created for you by the school)");
    }
    match &credentials.password {
        Some(password) => {
            let _ = writeln!(body, "  Password: {}", password);
        }
        None => {
            let _ = writeln!(body, "  Password: unchanged (existing account)");
        }
    }
    if let Some(code) = &credentials.code {
        let _ = writeln!(body, "  Code: {}", code);
    }
}

/// Renders the approval email. Student sections follow submission order.
pub fn render_approval(email: &ApprovalEmail, signature: &str) -> EmailMessage {
    let mut body = format!(
        "Hi {} {},\n\nYour registration request has been approved. Your account:\n",
        email.guardian_name, email.guardian_last_name
    );
    write_credentials(&mut body, &email.guardian);

    for student in &email.students {
        let _ = writeln!(body, "\nStudent: {} {}", student.name, student.last_name);
        if !student.course_name.is_empty() {
            let _ = writeln!(
                body,
                "  Course: {} ({})",
                student.course_name, student.course_label
            );
        }
        if student.existing_account {
            let _ = writeln!(body, "  Linked to an existing student account.");
        }
        write_credentials(&mut body, &student.credentials);
    }

    let _ = write!(
        body,
        "\nPlease change your password after the first sign-in.\n\n{}",
        signature
    );

    EmailMessage {
        to: email.guardian.email.clone(),
        to_name: Some(format!("{} {}", email.guardian_name, email.guardian_last_name)),
        subject: "Your registration has been approved".to_string(),
        body_text: body,
    }
}

pub fn render_rejection(email: &RejectionEmail, signature: &str) -> EmailMessage {
    EmailMessage {
        to: email.guardian_email.clone(),
        to_name: Some(email.guardian_name.clone()),
        subject: "Your registration request was not approved".to_string(),
        body_text: format!(
            "Hi {},\n\nYour registration request could not be approved.\n\nReason: {}\n\n{}",
            email.guardian_name, email.reason, signature
        ),
    }
}

pub fn render_submission_received(
    email: &SubmissionReceivedEmail,
    signature: &str,
) -> EmailMessage {
    EmailMessage {
        to: email.guardian_email.clone(),
        to_name: Some(email.guardian_name.clone()),
        subject: "We received your registration request".to_string(),
        body_text: format!(
            "Hi {},\n\nWe received your registration request for: {}.\n\
             The school will review it and you will get an email once it is decided.\n\n{}",
            email.guardian_name,
            email.student_names.join(", "),
            signature
        ),
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send_submission_received(
        &self,
        email: SubmissionReceivedEmail,
    ) -> Result<(), MailError> {
        self.send(render_submission_received(&email, &self.signature()))
            .await
    }

    async fn send_approval(&self, email: ApprovalEmail) -> Result<(), MailError> {
        self.send(render_approval(&email, &self.signature())).await
    }

    async fn send_rejection(&self, email: RejectionEmail) -> Result<(), MailError> {
        self.send(render_rejection(&email, &self.signature())).await
    }
}
