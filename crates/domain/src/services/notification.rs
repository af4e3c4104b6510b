//! In-app notifications for school administrators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Notification type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    RegistrationRequestSubmitted,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::RegistrationRequestSubmitted => {
                write!(f, "registration_request_submitted")
            }
        }
    }
}

/// Notification addressed to the administrators of a school.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminNotification {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub school_id: Uuid,
    pub request_id: Uuid,
    pub title: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of a notification send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationResult {
    /// Notification was delivered.
    Sent,
    /// Delivery failed (non-blocking for the caller).
    Failed(String),
    /// Nobody to notify.
    Skipped,
}

/// Notifier trait for in-app notifications.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Notify the administrators of `notification.school_id`.
    async fn notify_school_admins(&self, notification: AdminNotification) -> NotificationResult;
}

/// Mock notifier for development and testing.
///
/// Logs and records notifications but doesn't deliver them.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
    sent: Arc<Mutex<Vec<AdminNotification>>>,
}

impl MockNotifier {
    /// Create a new mock notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock notifier that simulates failures.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Notifications recorded so far.
    pub fn sent(&self) -> Vec<AdminNotification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    async fn notify_school_admins(&self, notification: AdminNotification) -> NotificationResult {
        if self.simulate_failure {
            tracing::warn!(
                school_id = %notification.school_id,
                request_id = %notification.request_id,
                "Mock notifier simulating failure"
            );
            return NotificationResult::Failed("Simulated failure".to_string());
        }

        tracing::info!(
            school_id = %notification.school_id,
            request_id = %notification.request_id,
            notification_type = %notification.notification_type,
            "Mock: Would notify school admins"
        );
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification);
        }

        NotificationResult::Sent
    }
}
