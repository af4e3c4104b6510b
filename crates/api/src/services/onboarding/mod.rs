//! Onboarding service: invitations, registration requests and approval.
//!
//! Every public operation runs under the configured deadline. Transactional
//! bodies are free functions over `&mut dyn OnboardingTx` so they can run
//! inside [`domain::store::in_transaction`]; outbound mail and notifications
//! are only sent after the unit of work has committed.

mod approval;
mod invitations;
mod requests;

use chrono::Datelike;
use chrono::{DateTime, Utc};
use domain::services::{Mailer, Notifier};
use domain::store::OnboardingStore;
use domain::OnboardingError;
use shared::codes::CredentialPolicy;
use shared::pagination::PageRequest;
use shared::validation::parse_object_id;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::OnboardingConfig;

/// Tunables of the onboarding workflow.
#[derive(Debug, Clone)]
pub struct OnboardingSettings {
    pub student_email_domain: String,
    pub password_length: usize,
    pub code_retry_budget: u32,
    pub operation_timeout: Duration,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl From<&OnboardingConfig> for OnboardingSettings {
    fn from(config: &OnboardingConfig) -> Self {
        Self {
            student_email_domain: config.student_email_domain.clone(),
            password_length: config.password_length,
            code_retry_budget: config.code_retry_budget,
            operation_timeout: Duration::from_secs(config.operation_timeout_secs),
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }
}

impl Default for OnboardingSettings {
    fn default() -> Self {
        Self::from(&OnboardingConfig::default())
    }
}

impl OnboardingSettings {
    pub(crate) fn credential_policy(&self, now: DateTime<Utc>) -> CredentialPolicy {
        CredentialPolicy {
            email_domain: self.student_email_domain.clone(),
            password_length: self.password_length,
            year_hint: now.year(),
        }
    }
}

/// Orchestrates the invitation and registration request lifecycles.
#[derive(Clone)]
pub struct OnboardingService {
    store: Arc<dyn OnboardingStore>,
    mailer: Arc<dyn Mailer>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<OnboardingSettings>,
}

impl OnboardingService {
    pub fn new(
        store: Arc<dyn OnboardingStore>,
        mailer: Arc<dyn Mailer>,
        notifier: Arc<dyn Notifier>,
        settings: OnboardingSettings,
    ) -> Self {
        Self {
            store,
            mailer,
            notifier,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &OnboardingSettings {
        &self.settings
    }

    /// Runs `operation` under the configured deadline.
    ///
    /// An elapsed deadline drops the operation, which rolls back any unit of
    /// work it still holds, and surfaces as a retryable internal error.
    async fn with_deadline<T, F>(&self, operation: &'static str, fut: F) -> Result<T, OnboardingError>
    where
        F: Future<Output = Result<T, OnboardingError>>,
    {
        match tokio::time::timeout(self.settings.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.settings.operation_timeout.as_millis() as u64,
                    "Onboarding operation exceeded its deadline"
                );
                Err(OnboardingError::Internal(format!(
                    "{} exceeded its deadline",
                    operation
                )))
            }
        }
    }

    fn page_request(&self, page: Option<u32>, page_size: Option<u32>) -> PageRequest {
        PageRequest::new(
            page,
            page_size.or(Some(self.settings.default_page_size)),
            self.settings.max_page_size,
        )
    }
}

/// Parses a school filter for administrative listings.
///
/// Absent or malformed identifiers fall back to no filter rather than an
/// error. Only listings use this; mutating paths parse strictly.
pub(crate) fn lenient_school_filter(school_id: Option<&str>) -> Option<Uuid> {
    let raw = school_id?.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = parse_object_id(raw);
    if parsed.is_none() {
        tracing::debug!(school_id = %raw, "Ignoring malformed school filter");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_school_filter() {
        let id = Uuid::new_v4();
        assert_eq!(lenient_school_filter(Some(&id.to_string())), Some(id));
        assert_eq!(lenient_school_filter(Some("not-a-school")), None);
        assert_eq!(lenient_school_filter(Some("  ")), None);
        assert_eq!(lenient_school_filter(None), None);
    }

    #[test]
    fn test_settings_from_config() {
        let settings = OnboardingSettings::default();
        assert_eq!(settings.operation_timeout, Duration::from_secs(15));
        assert_eq!(settings.code_retry_budget, 10);
        assert_eq!(settings.credential_policy(Utc::now()).password_length, 10);
    }
}
