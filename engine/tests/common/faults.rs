//! Store wrappers that fail or interleave on demand.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use venue_market_core::{
    Booking, BookingId, BookingStatus, BookingTransition, DayAvailability, EventId, EventSummary,
    MarketError, Money, PaymentId, Result, Slot, Venue, VenueId,
};
use venue_market_engine::mocks::{MockBookingStore, MockEventDirectory, MockVenueStore};
use venue_market_engine::providers::{BookingStore, EventDirectory, VenueStore};

/// Shared on/off switch for an injected failure.
#[derive(Clone, Debug, Default)]
pub struct Fault(Arc<AtomicBool>);

impl Fault {
    pub fn arm(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.0.load(Ordering::SeqCst) {
            Err(MarketError::Storage(format!("{operation}: connection reset")))
        } else {
            Ok(())
        }
    }
}

/// Venue store whose slot release can be made to fail.
pub struct FlakyVenueStore {
    pub inner: MockVenueStore,
    pub release: Fault,
}

#[async_trait]
impl VenueStore for FlakyVenueStore {
    async fn get_venue(&self, venue_id: VenueId) -> Result<Option<Venue>> {
        self.inner.get_venue(venue_id).await
    }

    async fn day_availability(&self, venue_id: VenueId, date: NaiveDate) -> Result<DayAvailability> {
        self.inner.day_availability(venue_id, date).await
    }

    async fn try_reserve_slot(&self, venue_id: VenueId, date: NaiveDate, slot: Slot) -> Result<bool> {
        self.inner.try_reserve_slot(venue_id, date, slot).await
    }

    async fn release_booking_slot(
        &self,
        venue_id: VenueId,
        date: NaiveDate,
        booking_id: BookingId,
    ) -> Result<bool> {
        self.release.check("release slot")?;
        self.inner.release_booking_slot(venue_id, date, booking_id).await
    }
}

/// Event directory whose counter updates can be made to fail.
pub struct FlakyEventDirectory {
    pub inner: MockEventDirectory,
    pub reserve: Fault,
    pub release: Fault,
}

#[async_trait]
impl EventDirectory for FlakyEventDirectory {
    async fn get_event(&self, event_id: EventId) -> Result<Option<EventSummary>> {
        self.inner.get_event(event_id).await
    }

    async fn try_reserve_capacity(&self, event_id: EventId, n: u32) -> Result<bool> {
        self.reserve.check("reserve capacity")?;
        self.inner.try_reserve_capacity(event_id, n).await
    }

    async fn release_capacity(&self, event_id: EventId, n: u32) -> Result<()> {
        self.release.check("release capacity")?;
        self.inner.release_capacity(event_id, n).await
    }
}

/// Booking store that cancels the booking right before the advance is marked
/// paid, as a cancellation committing between the status check and the write.
pub struct CancelBeforeAdvancePaid {
    pub inner: MockBookingStore,
}

#[async_trait]
impl BookingStore for CancelBeforeAdvancePaid {
    async fn insert(&self, booking: &Booking) -> Result<()> {
        self.inner.insert(booking).await
    }

    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        self.inner.get(booking_id).await
    }

    async fn transition(
        &self,
        booking_id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
        patch: &BookingTransition,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>> {
        self.inner.transition(booking_id, from, to, patch, now).await
    }

    async fn begin_advance_payment(
        &self,
        booking_id: BookingId,
        platform_fee: Money,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>> {
        self.inner
            .begin_advance_payment(booking_id, platform_fee, now)
            .await
    }

    async fn mark_advance_paid(
        &self,
        booking_id: BookingId,
        payment_id: PaymentId,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>> {
        let patch = BookingTransition {
            cancellation_reason: Some("cancelled by owner".to_string()),
            ..BookingTransition::default()
        };
        self.inner
            .transition(booking_id, BookingStatus::Accepted, BookingStatus::Cancelled, &patch, now)
            .await?;
        self.inner.mark_advance_paid(booking_id, payment_id, now).await
    }
}
