//! Console notifier for development.

use super::notifier::{Notification, Notifier, NotifyError};
use async_trait::async_trait;
use tracing::info;

/// Logs notifications instead of delivering them.
#[derive(Clone, Debug, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    /// Create a new console notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(&notification.kind)
            .map_err(|e| NotifyError::DeliveryFailed(e.to_string()))?;

        info!(
            recipient = %notification.recipient,
            payload = %payload,
            "Notification (development mode)"
        );

        Ok(())
    }
}
