//! Per-venue, per-date slot ledger.
//!
//! Availability checks are advisory. The only guard against double booking
//! is [`VenueAvailabilityLedger::reserve_slot`], whose overlap check and insert
//! happen in one store write.

use crate::providers::VenueStore;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};
use venue_market_core::{
    BookingId, DayAvailability, MarketError, Result, Slot, SlotKind, TimeWindow, UserId, Venue,
    VenueId,
};

/// Reserves, blocks and releases venue time slots.
#[derive(Clone)]
pub struct VenueAvailabilityLedger {
    venues: Arc<dyn VenueStore>,
}

impl VenueAvailabilityLedger {
    /// Create a ledger over a venue store.
    #[must_use]
    pub fn new(venues: Arc<dyn VenueStore>) -> Self {
        Self { venues }
    }

    /// Whether `window` is currently free. Locks nothing.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    pub async fn check_availability(
        &self,
        venue_id: VenueId,
        date: NaiveDate,
        window: TimeWindow,
    ) -> Result<bool> {
        Ok(self.venues.day_availability(venue_id, date).await?.is_free(&window))
    }

    /// Reserve `window` for `booking_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::SlotConflict`] if it overlaps a booked or blocked slot.
    pub async fn reserve_slot(
        &self,
        venue_id: VenueId,
        date: NaiveDate,
        window: TimeWindow,
        booking_id: BookingId,
    ) -> Result<()> {
        let slot = Slot {
            window,
            kind: SlotKind::Booked,
            booking_id: Some(booking_id),
        };

        if !self.venues.try_reserve_slot(venue_id, date, slot).await? {
            warn!(
                venue_id = %venue_id,
                booking_id = %booking_id,
                date = %date,
                start = %window.start,
                end = %window.end,
                "Slot conflict"
            );
            return Err(MarketError::SlotConflict);
        }

        info!(
            venue_id = %venue_id,
            booking_id = %booking_id,
            date = %date,
            start = %window.start,
            end = %window.end,
            "Slot reserved"
        );
        Ok(())
    }

    /// Owner blocks `window` so no booking can take it.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the venue does not exist
    /// - [`MarketError::Unauthorized`] if `owner_id` does not own the venue
    /// - [`MarketError::SlotConflict`] if the window is already taken
    pub async fn block_slot(
        &self,
        venue_id: VenueId,
        date: NaiveDate,
        window: TimeWindow,
        owner_id: UserId,
    ) -> Result<()> {
        let venue = self.get_venue(venue_id).await?;
        if venue.owner_id != owner_id {
            return Err(MarketError::Unauthorized(
                "only the venue owner can block slots".to_string(),
            ));
        }

        let slot = Slot {
            window,
            kind: SlotKind::Blocked,
            booking_id: None,
        };
        if !self.venues.try_reserve_slot(venue_id, date, slot).await? {
            return Err(MarketError::SlotConflict);
        }

        info!(venue_id = %venue_id, date = %date, start = %window.start, end = %window.end, "Slot blocked");
        Ok(())
    }

    /// Remove the slot reserved for `booking_id`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    pub async fn release_slot(
        &self,
        venue_id: VenueId,
        date: NaiveDate,
        booking_id: BookingId,
    ) -> Result<bool> {
        let released = self.venues.release_booking_slot(venue_id, date, booking_id).await?;
        debug!(venue_id = %venue_id, booking_id = %booking_id, released, "Slot release");
        Ok(released)
    }

    /// Every slot of the venue on `date`.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    pub async fn day(&self, venue_id: VenueId, date: NaiveDate) -> Result<DayAvailability> {
        self.venues.day_availability(venue_id, date).await
    }

    /// Load a venue.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if it does not exist.
    pub async fn get_venue(&self, venue_id: VenueId) -> Result<Venue> {
        self.venues
            .get_venue(venue_id)
            .await?
            .ok_or_else(|| MarketError::not_found("venue", venue_id))
    }
}

impl std::fmt::Debug for VenueAvailabilityLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueAvailabilityLedger").finish_non_exhaustive()
    }
}
