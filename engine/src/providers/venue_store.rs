//! Venue store trait.

use async_trait::async_trait;
use chrono::NaiveDate;
use venue_market_core::{BookingId, DayAvailability, Result, Slot, Venue, VenueId};

/// Venue aggregate access plus its per-date slot ledger.
#[async_trait]
pub trait VenueStore: Send + Sync {
    /// Load a venue.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn get_venue(&self, venue_id: VenueId) -> Result<Option<Venue>>;

    /// All slots of a venue on a date (empty if the date has no entry yet).
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn day_availability(&self, venue_id: VenueId, date: NaiveDate) -> Result<DayAvailability>;

    /// Append `slot` unless it overlaps an existing slot on that date.
    ///
    /// **CRITICAL**: overlap check and insert MUST be one atomic step.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: slot appended (date entry created if absent)
    /// - `Ok(false)`: overlaps an existing booked or blocked slot
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn try_reserve_slot(&self, venue_id: VenueId, date: NaiveDate, slot: Slot) -> Result<bool>;

    /// Remove the booked slot owned by `booking_id`. Returns whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn release_booking_slot(
        &self,
        venue_id: VenueId,
        date: NaiveDate,
        booking_id: BookingId,
    ) -> Result<bool>;
}
