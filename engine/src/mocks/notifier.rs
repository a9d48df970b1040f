//! Recording notifier.

use crate::providers::{Notification, Notifier, NotifyError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Notifier that records deliveries, or fails every attempt.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<Notification>>>,
    attempts: Arc<AtomicU32>,
    fail: bool,
}

impl RecordingNotifier {
    /// Create a notifier that accepts every notification.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a notifier whose channel is always down.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Notifications delivered so far.
    #[must_use]
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Delivery attempts so far, failed ones included.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(NotifyError::DeliveryFailed("channel unavailable".to_string()));
        }

        self.delivered
            .lock()
            .map_err(|_| NotifyError::DeliveryFailed("Mutex lock failed".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}
