//! Booking store trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use venue_market_core::{Booking, BookingId, BookingStatus, BookingTransition, Money, PaymentId, Result};

/// Persistence for bookings.
///
/// Status and payment-status changes are compare-and-set writes; a `None`
/// result means the precondition no longer held when the write ran.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persist a new booking.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn insert(&self, booking: &Booking) -> Result<()>;

    /// Load a booking.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>>;

    /// Move `from → to` and apply `patch`, only if the status is still `from`.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn transition(
        &self,
        booking_id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
        patch: &BookingTransition,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>>;

    /// Record the platform fee and set payment status `pending`, only if the
    /// booking is `accepted` and its advance is not yet `paid`.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn begin_advance_payment(
        &self,
        booking_id: BookingId,
        platform_fee: Money,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>>;

    /// Set payment status `paid` and link the payment, only while the booking is
    /// `accepted` and not already `paid`.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn mark_advance_paid(
        &self,
        booking_id: BookingId,
        payment_id: PaymentId,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>>;
}
