//! Console notification service for development. Logs notifications to
//! tracing output.

use async_trait::async_trait;
use elevia_application::{CompletionNotification, NotificationService, ProposalNotification};
use elevia_core::AppResult;
use tracing::info;

/// Development notification service that logs to the console.
#[derive(Clone)]
pub struct ConsoleNotificationService;

impl ConsoleNotificationService {
    /// Creates a new console notification service.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleNotificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationService for ConsoleNotificationService {
    async fn notify_proposal(&self, notification: &ProposalNotification) -> AppResult<()> {
        let recipients: Vec<String> = notification
            .recipients
            .iter()
            .map(ToString::to_string)
            .collect();

        info!(
            requesting_user = %notification.requesting_user,
            group = %notification.group_id,
            recipients = recipients.join(", "),
            expiry = %notification.expiry,
            "--- PROPOSAL (console) ---\n{} requests to join {}.\nJustification: {}\nApprove at: {}\n--- END PROPOSAL ---",
            notification.requesting_user,
            notification.group_id,
            notification.justification,
            notification.action_url
        );

        Ok(())
    }

    async fn notify_completion(&self, notification: &CompletionNotification) -> AppResult<()> {
        info!(
            requesting_user = %notification.requesting_user,
            group = %notification.group_id,
            start = %notification.start,
            end = %notification.end,
            "activation completed"
        );

        Ok(())
    }
}
