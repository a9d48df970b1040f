//! Event capacity counter trait.

use async_trait::async_trait;
use venue_market_core::{EventId, EventSummary, Result};

/// Access to the event aggregate's attendee counter.
///
/// # Implementation Notes
///
/// `try_reserve_capacity` replaces read-check-increment: it MUST increment
/// `current_attendees` by `n` only where `current_attendees + n <= max_attendees`
/// in a single conditional write (`UPDATE ... WHERE current + n <= max`).
#[async_trait]
pub trait EventDirectory: Send + Sync {
    /// Load an event's capacity counter and check-in details.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn get_event(&self, event_id: EventId) -> Result<Option<EventSummary>>;

    /// Atomically add `n` attendees if the cap allows it.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: counter incremented
    /// - `Ok(false)`: would exceed `max_attendees` (or event missing); nothing changed
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn try_reserve_capacity(&self, event_id: EventId, n: u32) -> Result<bool>;

    /// Atomically subtract `n` attendees (saturating at zero).
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn release_capacity(&self, event_id: EventId, n: u32) -> Result<()>;
}
