//! Log-backed administrator notifier.

use async_trait::async_trait;
use domain::services::{AdminNotification, NotificationResult, Notifier};
use tracing::info;

/// Emits administrator notifications as structured log events.
///
/// Stands in for an in-app notification channel; `recipient` is the
/// configured admin address and is only attached to the log line.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    recipient: Option<String>,
}

impl LogNotifier {
    pub fn new(admin_email: &str) -> Self {
        let admin_email = admin_email.trim();
        Self {
            recipient: (!admin_email.is_empty()).then(|| admin_email.to_string()),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_school_admins(&self, notification: AdminNotification) -> NotificationResult {
        info!(
            school_id = %notification.school_id,
            request_id = %notification.request_id,
            notification_type = %notification.notification_type,
            recipient = self.recipient.as_deref().unwrap_or("-"),
            title = %notification.title,
            "Admin notification"
        );
        NotificationResult::Sent
    }
}
