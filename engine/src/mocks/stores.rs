//! In-memory stores.

use super::lock;
use crate::providers::{BookingStore, EventDirectory, PaymentStore, TicketStore, VenueStore};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use venue_market_core::{
    Booking, BookingId, BookingPaymentStatus, BookingStatus, BookingTransition, DayAvailability,
    EventId, EventSummary, MarketError, Money, Payment, PaymentId, PaymentStatus, PaymentSubject,
    RefundRecord, Result, Slot, SlotKind, Ticket, TicketCode, TicketId, TicketStatus, UserId,
    Venue, VenueId,
};

// ═══════════════════════════════════════════════════════════════════════
// Venues
// ═══════════════════════════════════════════════════════════════════════

/// Venues and their per-date slot lists.
#[derive(Debug, Clone, Default)]
pub struct MockVenueStore {
    venues: Arc<Mutex<HashMap<VenueId, Venue>>>,
    days: Arc<Mutex<HashMap<(VenueId, NaiveDate), Vec<Slot>>>>,
}

impl MockVenueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a venue.
    pub fn add_venue(&self, venue: Venue) {
        if let Ok(mut venues) = self.venues.lock() {
            venues.insert(venue.id, venue);
        }
    }

    /// Slots currently held on `date`.
    #[must_use]
    pub fn day(&self, venue_id: VenueId, date: NaiveDate) -> Vec<Slot> {
        self.days
            .lock()
            .ok()
            .and_then(|days| days.get(&(venue_id, date)).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VenueStore for MockVenueStore {
    async fn get_venue(&self, venue_id: VenueId) -> Result<Option<Venue>> {
        Ok(lock(&self.venues)?.get(&venue_id).cloned())
    }

    async fn day_availability(&self, venue_id: VenueId, date: NaiveDate) -> Result<DayAvailability> {
        let slots = lock(&self.days)?
            .get(&(venue_id, date))
            .cloned()
            .unwrap_or_default();
        Ok(DayAvailability {
            date: Some(date),
            slots,
        })
    }

    async fn try_reserve_slot(&self, venue_id: VenueId, date: NaiveDate, slot: Slot) -> Result<bool> {
        let mut days = lock(&self.days)?;
        let slots = days.entry((venue_id, date)).or_default();
        if slots.iter().any(|existing| existing.window.overlaps(&slot.window)) {
            return Ok(false);
        }
        slots.push(slot);
        Ok(true)
    }

    async fn release_booking_slot(
        &self,
        venue_id: VenueId,
        date: NaiveDate,
        booking_id: BookingId,
    ) -> Result<bool> {
        let mut days = lock(&self.days)?;
        let Some(slots) = days.get_mut(&(venue_id, date)) else {
            return Ok(false);
        };
        let before = slots.len();
        slots.retain(|slot| !(slot.kind == SlotKind::Booked && slot.booking_id == Some(booking_id)));
        Ok(slots.len() < before)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Bookings
// ═══════════════════════════════════════════════════════════════════════

/// Bookings keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MockBookingStore {
    bookings: Arc<Mutex<HashMap<BookingId, Booking>>>,
}

impl MockBookingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for MockBookingStore {
    async fn insert(&self, booking: &Booking) -> Result<()> {
        let mut bookings = lock(&self.bookings)?;
        if bookings.contains_key(&booking.id) {
            return Err(MarketError::Storage("Booking ID already exists".to_string()));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        Ok(lock(&self.bookings)?.get(&booking_id).cloned())
    }

    async fn transition(
        &self,
        booking_id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
        patch: &BookingTransition,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>> {
        let mut bookings = lock(&self.bookings)?;
        match bookings.get_mut(&booking_id) {
            Some(booking) if booking.status == from => {
                patch.apply(booking, to, now);
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn begin_advance_payment(
        &self,
        booking_id: BookingId,
        platform_fee: Money,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>> {
        let mut bookings = lock(&self.bookings)?;
        match bookings.get_mut(&booking_id) {
            Some(booking)
                if booking.status == BookingStatus::Accepted
                    && booking.payment_status != BookingPaymentStatus::Paid =>
            {
                booking.platform_fee = platform_fee;
                booking.payment_status = BookingPaymentStatus::Pending;
                booking.updated_at = now;
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_advance_paid(
        &self,
        booking_id: BookingId,
        payment_id: PaymentId,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>> {
        let mut bookings = lock(&self.bookings)?;
        match bookings.get_mut(&booking_id) {
            Some(booking)
                if booking.status == BookingStatus::Accepted
                    && booking.payment_status != BookingPaymentStatus::Paid =>
            {
                booking.payment_status = BookingPaymentStatus::Paid;
                booking.payment_id = Some(payment_id);
                booking.updated_at = now;
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Payments
// ═══════════════════════════════════════════════════════════════════════

/// Payments keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MockPaymentStore {
    payments: Arc<Mutex<HashMap<PaymentId, Payment>>>,
}

impl MockPaymentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored payment (for assertions).
    #[must_use]
    pub fn all(&self) -> Vec<Payment> {
        self.payments
            .lock()
            .map(|payments| payments.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentStore for MockPaymentStore {
    async fn insert(&self, payment: &Payment) -> Result<()> {
        let mut payments = lock(&self.payments)?;
        if payments.contains_key(&payment.id) {
            return Err(MarketError::Storage("Payment ID already exists".to_string()));
        }
        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        Ok(lock(&self.payments)?.get(&payment_id).cloned())
    }

    async fn find_pending(
        &self,
        subject: PaymentSubject,
        gateway_order_id: &str,
    ) -> Result<Option<Payment>> {
        Ok(lock(&self.payments)?
            .values()
            .find(|p| {
                p.subject == subject
                    && p.gateway_order_id == gateway_order_id
                    && p.status == PaymentStatus::Pending
            })
            .cloned())
    }

    async fn mark_paid(
        &self,
        payment_id: PaymentId,
        gateway_payment_id: &str,
        gateway_signature: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Payment>> {
        let mut payments = lock(&self.payments)?;
        match payments.get_mut(&payment_id) {
            Some(payment) if payment.status == PaymentStatus::Pending => {
                payment.status = PaymentStatus::Paid;
                payment.gateway_payment_id = Some(gateway_payment_id.to_string());
                payment.gateway_signature = Some(gateway_signature.to_string());
                payment.paid_at = Some(paid_at);
                Ok(Some(payment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_failed(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        let mut payments = lock(&self.payments)?;
        match payments.get_mut(&payment_id) {
            Some(payment) if payment.status == PaymentStatus::Pending => {
                payment.status = PaymentStatus::Failed;
                Ok(Some(payment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn record_failed_verification(&self, payment_id: PaymentId) -> Result<()> {
        if let Some(payment) = lock(&self.payments)?.get_mut(&payment_id) {
            payment.failed_verifications = payment.failed_verifications.saturating_add(1);
        }
        Ok(())
    }

    async fn consume(&self, payment_id: PaymentId, ticket_id: TicketId) -> Result<bool> {
        let mut payments = lock(&self.payments)?;
        match payments.get_mut(&payment_id) {
            Some(payment) if payment.status == PaymentStatus::Paid && payment.consumed_by.is_none() => {
                payment.consumed_by = Some(ticket_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_consumption(&self, payment_id: PaymentId, ticket_id: TicketId) -> Result<()> {
        if let Some(payment) = lock(&self.payments)?.get_mut(&payment_id) {
            if payment.consumed_by == Some(ticket_id) {
                payment.consumed_by = None;
            }
        }
        Ok(())
    }

    async fn record_refund(&self, payment_id: PaymentId, refund: &RefundRecord) -> Result<()> {
        match lock(&self.payments)?.get_mut(&payment_id) {
            Some(payment) => {
                payment.refund = Some(refund.clone());
                Ok(())
            }
            None => Err(MarketError::not_found("payment", payment_id)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Tickets
// ═══════════════════════════════════════════════════════════════════════

/// Tickets keyed by public code.
#[derive(Debug, Clone, Default)]
pub struct MockTicketStore {
    tickets: Arc<Mutex<HashMap<TicketCode, Ticket>>>,
    forced_collisions: Arc<AtomicU32>,
}

impl MockTicketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the next `n` inserts as code collisions.
    pub fn force_collisions(&self, n: u32) {
        self.forced_collisions.store(n, Ordering::SeqCst);
    }

    /// Number of stored tickets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.lock().map(|t| t.len()).unwrap_or_default()
    }

    /// Whether no ticket has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TicketStore for MockTicketStore {
    async fn insert(&self, ticket: &Ticket) -> Result<()> {
        let forced = self
            .forced_collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Err(MarketError::DuplicateTicketCode);
        }

        let mut tickets = lock(&self.tickets)?;
        if tickets.contains_key(&ticket.code) {
            return Err(MarketError::DuplicateTicketCode);
        }
        tickets.insert(ticket.code.clone(), ticket.clone());
        Ok(())
    }

    async fn get_by_code(&self, code: &TicketCode) -> Result<Option<Ticket>> {
        Ok(lock(&self.tickets)?.get(code).cloned())
    }

    async fn claim(
        &self,
        code: &TicketCode,
        scanner: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<Ticket>> {
        let mut tickets = lock(&self.tickets)?;
        match tickets.get_mut(code) {
            Some(ticket) if !ticket.is_used && ticket.status == TicketStatus::Active => {
                ticket.is_used = true;
                ticket.used_at = Some(at);
                ticket.status = TicketStatus::Used;
                ticket.checked_in_by = Some(scanner);
                Ok(Some(ticket.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn cancel(&self, code: &TicketCode) -> Result<Option<Ticket>> {
        let mut tickets = lock(&self.tickets)?;
        match tickets.get_mut(code) {
            Some(ticket) if !ticket.is_used && ticket.status == TicketStatus::Active => {
                ticket.status = TicketStatus::Cancelled;
                Ok(Some(ticket.clone()))
            }
            _ => Ok(None),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════════════════

/// Event capacity counters.
#[derive(Debug, Clone, Default)]
pub struct MockEventDirectory {
    events: Arc<Mutex<HashMap<EventId, EventSummary>>>,
}

impl MockEventDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event.
    pub fn add_event(&self, event: EventSummary) {
        if let Ok(mut events) = self.events.lock() {
            events.insert(event.id, event);
        }
    }

    /// Current attendee count (for assertions).
    #[must_use]
    pub fn attendees(&self, event_id: EventId) -> Option<u32> {
        self.events
            .lock()
            .ok()
            .and_then(|events| events.get(&event_id).map(|e| e.current_attendees))
    }
}

#[async_trait]
impl EventDirectory for MockEventDirectory {
    async fn get_event(&self, event_id: EventId) -> Result<Option<EventSummary>> {
        Ok(lock(&self.events)?.get(&event_id).cloned())
    }

    async fn try_reserve_capacity(&self, event_id: EventId, n: u32) -> Result<bool> {
        let mut events = lock(&self.events)?;
        let Some(event) = events.get_mut(&event_id) else {
            return Ok(false);
        };
        match event.current_attendees.checked_add(n) {
            Some(next) if next <= event.max_attendees => {
                event.current_attendees = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_capacity(&self, event_id: EventId, n: u32) -> Result<()> {
        if let Some(event) = lock(&self.events)?.get_mut(&event_id) {
            event.current_attendees = event.current_attendees.saturating_sub(n);
        }
        Ok(())
    }
}
