//! Fire-and-forget notification dispatch.
//!
//! Services hand notifications to a bounded queue and return immediately. A
//! background worker drains the queue and retries each delivery with
//! backoff. Nothing here can fail or block a booking, ticket or payment
//! operation: a full queue drops the message with a warning, and exhausted
//! retries are logged.

use crate::providers::{Notification, Notifier};
use crate::retry::{RetryPolicy, retry_with_backoff};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle used by services to enqueue notifications.
#[derive(Clone, Debug)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Notification>,
}

impl NotificationDispatcher {
    /// Spawn the delivery worker on the current tokio runtime.
    ///
    /// The worker exits once every dispatcher clone has been dropped and the
    /// queue is drained.
    #[must_use]
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        policy: RetryPolicy,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(rx, notifier, policy));
        (Self { tx }, worker)
    }

    /// Enqueue a notification without waiting.
    pub fn dispatch(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                metrics::counter!("market.notifications.dropped").increment(1);
                tracing::warn!(
                    recipient = %dropped.recipient,
                    "Notification queue full, dropping notification"
                );
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                metrics::counter!("market.notifications.dropped").increment(1);
                tracing::warn!(
                    recipient = %dropped.recipient,
                    "Notification worker stopped, dropping notification"
                );
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Notification>,
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
) {
    while let Some(notification) = rx.recv().await {
        let result = retry_with_backoff(&policy, || notifier.deliver(&notification)).await;

        match result {
            Ok(()) => {
                metrics::counter!("market.notifications.delivered").increment(1);
            }
            Err(error) => {
                metrics::counter!("market.notifications.failed").increment(1);
                tracing::error!(
                    recipient = %notification.recipient,
                    error = %error,
                    retries = policy.max_retries(),
                    "Notification delivery failed"
                );
            }
        }
    }

    tracing::debug!("Notification worker stopped");
}
