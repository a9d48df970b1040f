//! Booking lifecycle: request, owner response, advance payment, cancellation.
//!
//! ```text
//! create ─► pending ──accept──► accepted ──pay advance──► (payment: paid)
//!              │                   │
//!              ├──reject──► rejected
//!              └──cancel──► cancelled ◄──cancel (slot released, advance refunded)
//! ```
//!
//! Every status change is a compare-and-set on the stored status, so two
//! concurrent responders cannot both win. Acceptance reserves the slot before
//! flipping the status and releases it again if the flip loses.

use crate::ledger::VenueAvailabilityLedger;
use crate::notifications::NotificationDispatcher;
use crate::payments::PaymentOrchestrator;
use crate::providers::{BookingStore, Notification, NotificationKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use venue_market_core::{
    AdvanceBreakdown, Booking, BookingId, BookingPaymentStatus, BookingRequest, BookingStatus,
    BookingTransition, Clock, MarketError, PaymentCheckout, PaymentId, PaymentInitiation,
    PaymentSubject, PaymentVerification, RefundRecord, RefundStatus, Result, UserId, Venue,
};

/// Owner response to a pending booking.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Requested status (`"accepted"` or `"rejected"`)
    pub status: String,
    /// Reason shown to the booker on rejection
    pub rejection_reason: Option<String>,
    /// Alternative dates the owner proposes
    #[serde(default)]
    pub modified_dates: Vec<NaiveDate>,
}

/// Gateway callback for a booking advance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCallback {
    /// Order id from checkout
    pub gateway_order_id: String,
    /// Gateway payment id
    pub gateway_payment_id: String,
    /// Gateway signature
    pub gateway_signature: String,
}

/// Checkout handle plus the split of the venue price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceQuote {
    /// What the client needs to open checkout
    pub checkout: PaymentCheckout,
    /// Advance, fee and remainder
    pub breakdown: AdvanceBreakdown,
}

/// Result of a cancellation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancellationOutcome {
    /// The cancelled booking
    pub booking: Booking,
    /// Refund attempt for a paid advance
    pub refund: Option<RefundRecord>,
}

/// Owns booking state transitions.
#[derive(Clone)]
pub struct BookingLifecycleManager {
    bookings: Arc<dyn BookingStore>,
    ledger: VenueAvailabilityLedger,
    payments: PaymentOrchestrator,
    notifications: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl BookingLifecycleManager {
    /// Wire the manager to its collaborators.
    #[must_use]
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        ledger: VenueAvailabilityLedger,
        payments: PaymentOrchestrator,
        notifications: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookings,
            ledger,
            payments,
            notifications,
            clock,
        }
    }

    /// Record a booking request.
    ///
    /// Venues with auto-approval accept it straight away through the same
    /// path an owner would use. If that acceptance loses a slot race the
    /// booking stays `pending` for the owner to decide.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Validation`] for a past date, no guests or an empty purpose
    /// - [`MarketError::NotFound`] if the venue does not exist
    /// - [`MarketError::SlotConflict`] if the window is already taken
    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking> {
        let now = self.clock.now();
        if request.booking_date < now.date_naive() {
            return Err(MarketError::Validation(
                "booking date is in the past".to_string(),
            ));
        }
        if request.expected_guests == 0 {
            return Err(MarketError::Validation(
                "expected guests must be at least 1".to_string(),
            ));
        }
        if request.purpose.trim().is_empty() {
            return Err(MarketError::Validation("purpose is required".to_string()));
        }

        let venue = self.ledger.get_venue(request.venue_id).await?;
        if !self
            .ledger
            .check_availability(venue.id, request.booking_date, request.window)
            .await?
        {
            return Err(MarketError::SlotConflict);
        }

        let booking = Booking::from_request(request, now);
        self.bookings.insert(&booking).await?;

        metrics::counter!("market.bookings.created").increment(1);
        info!(
            booking_id = %booking.id,
            venue_id = %booking.venue_id,
            user_id = %booking.user_id,
            date = %booking.booking_date,
            "Booking requested"
        );

        self.notify(
            booking.user_id,
            NotificationKind::BookingRequested {
                booking_id: booking.id,
            },
        );
        self.notify(
            venue.owner_id,
            NotificationKind::BookingAwaitingResponse {
                booking_id: booking.id,
                venue_name: venue.name.clone(),
            },
        );

        if !venue.auto_approve {
            return Ok(booking);
        }

        match self.accept(&booking, &venue, Vec::new()).await {
            Ok(accepted) => Ok(accepted),
            Err(e) => {
                warn!(booking_id = %booking.id, error = %e, "Auto-approval failed, left pending");
                Ok(booking)
            }
        }
    }

    /// Owner accepts or rejects a pending booking.
    ///
    /// # Errors
    ///
    /// - [`MarketError::InvalidStatus`] if `update.status` is not recognized
    /// - [`MarketError::Validation`] for statuses other than accepted/rejected
    /// - [`MarketError::NotFound`] if the booking or venue does not exist
    /// - [`MarketError::Unauthorized`] if `responder` does not own the venue
    /// - [`MarketError::InvalidTransition`] if the booking is no longer pending
    /// - [`MarketError::SlotConflict`] if accepting would double-book the venue
    pub async fn update_booking_status(
        &self,
        booking_id: BookingId,
        responder: UserId,
        update: StatusUpdate,
    ) -> Result<Booking> {
        let status = BookingStatus::parse(update.status.trim())?;
        let booking = self.get_booking(booking_id).await?;
        let venue = self.ledger.get_venue(booking.venue_id).await?;

        if venue.owner_id != responder {
            return Err(MarketError::Unauthorized(
                "only the venue owner can respond to a booking".to_string(),
            ));
        }

        match status {
            BookingStatus::Accepted => self.accept(&booking, &venue, update.modified_dates).await,
            BookingStatus::Rejected => {
                self.reject(&booking, update.rejection_reason, update.modified_dates)
                    .await
            }
            other => Err(MarketError::Validation(format!(
                "owners respond with accepted or rejected, not {other}"
            ))),
        }
    }

    async fn accept(
        &self,
        booking: &Booking,
        venue: &Venue,
        modified_dates: Vec<NaiveDate>,
    ) -> Result<Booking> {
        booking.status.ensure_transition(BookingStatus::Accepted)?;

        match self
            .ledger
            .reserve_slot(venue.id, booking.booking_date, booking.window, booking.id)
            .await
        {
            Ok(()) => {}
            Err(MarketError::SlotConflict) if self.accepted_elsewhere(booking).await => {
                return Err(self.lost_race(booking.id, BookingStatus::Accepted).await);
            }
            Err(e) => return Err(e),
        }

        let now = self.clock.now();
        let patch = BookingTransition {
            responded_at: Some(now),
            modified_dates,
            ..BookingTransition::default()
        };
        let accepted = match self
            .bookings
            .transition(booking.id, BookingStatus::Pending, BookingStatus::Accepted, &patch, now)
            .await
        {
            Ok(Some(accepted)) => accepted,
            Ok(None) => {
                self.release_after_failed_accept(booking).await;
                return Err(self.lost_race(booking.id, BookingStatus::Accepted).await);
            }
            Err(e) => {
                self.release_after_failed_accept(booking).await;
                return Err(e);
            }
        };

        metrics::counter!("market.bookings.accepted").increment(1);
        info!(booking_id = %accepted.id, venue_id = %venue.id, "Booking accepted");
        self.notify(
            accepted.user_id,
            NotificationKind::BookingAccepted {
                booking_id: accepted.id,
            },
        );
        Ok(accepted)
    }

    async fn reject(
        &self,
        booking: &Booking,
        reason: Option<String>,
        modified_dates: Vec<NaiveDate>,
    ) -> Result<Booking> {
        booking.status.ensure_transition(BookingStatus::Rejected)?;

        let now = self.clock.now();
        let patch = BookingTransition {
            responded_at: Some(now),
            modified_dates,
            rejection_reason: reason.clone(),
            ..BookingTransition::default()
        };
        let Some(rejected) = self
            .bookings
            .transition(booking.id, BookingStatus::Pending, BookingStatus::Rejected, &patch, now)
            .await?
        else {
            return Err(self.lost_race(booking.id, BookingStatus::Rejected).await);
        };

        metrics::counter!("market.bookings.rejected").increment(1);
        info!(booking_id = %rejected.id, "Booking rejected");
        self.notify(
            rejected.user_id,
            NotificationKind::BookingRejected {
                booking_id: rejected.id,
                reason,
            },
        );
        Ok(rejected)
    }

    /// Cancel a pending or accepted booking.
    ///
    /// An accepted booking's slot is released. A paid advance is refunded
    /// through the payment orchestrator; the refund outcome is returned and a
    /// failed refund does not undo the cancellation. Once the status has
    /// flipped the refund is always attempted, even if the slot release fails.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the booking does not exist
    /// - [`MarketError::Unauthorized`] unless `actor` is the booker or venue owner
    /// - [`MarketError::InvalidTransition`] if the booking is already terminal
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        actor: UserId,
        reason: Option<String>,
    ) -> Result<CancellationOutcome> {
        let booking = self.get_booking(booking_id).await?;
        let venue = self.ledger.get_venue(booking.venue_id).await?;

        if actor != booking.user_id && actor != venue.owner_id {
            return Err(MarketError::Unauthorized(
                "only the booker or venue owner can cancel".to_string(),
            ));
        }
        booking.status.ensure_transition(BookingStatus::Cancelled)?;

        let now = self.clock.now();
        let patch = BookingTransition {
            cancellation_reason: reason.clone(),
            ..BookingTransition::default()
        };
        let Some(cancelled) = self
            .bookings
            .transition(booking.id, booking.status, BookingStatus::Cancelled, &patch, now)
            .await?
        else {
            return Err(self.lost_race(booking.id, BookingStatus::Cancelled).await);
        };

        if booking.status == BookingStatus::Accepted {
            if let Err(e) = self
                .ledger
                .release_slot(venue.id, booking.booking_date, booking.id)
                .await
            {
                metrics::counter!("market.bookings.slot_release_failed").increment(1);
                error!(booking_id = %booking.id, error = %e, "Could not release slot of cancelled booking");
            }
        }

        let refund = match (cancelled.payment_status, cancelled.payment_id) {
            (BookingPaymentStatus::Paid, Some(payment_id)) => {
                let why = reason.as_deref().unwrap_or("booking cancelled");
                self.refund_advance(&cancelled, payment_id, why).await
            }
            _ => None,
        };

        metrics::counter!("market.bookings.cancelled").increment(1);
        info!(
            booking_id = %cancelled.id,
            actor = %actor,
            refunded = refund.as_ref().is_some_and(|r| r.status == RefundStatus::Processed),
            "Booking cancelled"
        );

        for recipient in [cancelled.user_id, venue.owner_id] {
            self.notify(
                recipient,
                NotificationKind::BookingCancelled {
                    booking_id: cancelled.id,
                    reason: reason.clone(),
                },
            );
        }

        Ok(CancellationOutcome {
            booking: cancelled,
            refund,
        })
    }

    /// Close an accepted booking after the event took place.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the booking does not exist
    /// - [`MarketError::InvalidTransition`] unless the booking is accepted
    pub async fn mark_completed(&self, booking_id: BookingId) -> Result<Booking> {
        let booking = self.get_booking(booking_id).await?;
        booking.status.ensure_transition(BookingStatus::Completed)?;

        let now = self.clock.now();
        let Some(completed) = self
            .bookings
            .transition(
                booking_id,
                BookingStatus::Accepted,
                BookingStatus::Completed,
                &BookingTransition::default(),
                now,
            )
            .await?
        else {
            return Err(self.lost_race(booking_id, BookingStatus::Completed).await);
        };

        info!(booking_id = %booking_id, "Booking completed");
        Ok(completed)
    }

    /// Start the 10% advance payment for an accepted booking.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the booking does not exist
    /// - [`MarketError::Unauthorized`] unless `user_id` made the booking
    /// - [`MarketError::Validation`] unless the booking is accepted
    /// - [`MarketError::AlreadyPaid`] if the advance was already paid
    /// - gateway errors from order creation
    pub async fn initiate_booking_payment(
        &self,
        booking_id: BookingId,
        user_id: UserId,
    ) -> Result<AdvanceQuote> {
        let booking = self.get_booking(booking_id).await?;

        if booking.user_id != user_id {
            return Err(MarketError::Unauthorized(
                "only the booker can pay for a booking".to_string(),
            ));
        }
        if booking.payment_status == BookingPaymentStatus::Paid {
            return Err(MarketError::AlreadyPaid);
        }
        if booking.status != BookingStatus::Accepted {
            return Err(MarketError::Validation(format!(
                "booking is {} and cannot be paid",
                booking.status
            )));
        }

        let breakdown = AdvanceBreakdown::for_total(booking.total_amount);
        let now = self.clock.now();
        if self
            .bookings
            .begin_advance_payment(booking_id, breakdown.platform_fee, now)
            .await?
            .is_none()
        {
            let current = self.get_booking(booking_id).await?;
            return Err(if current.payment_status == BookingPaymentStatus::Paid {
                MarketError::AlreadyPaid
            } else {
                MarketError::Validation(format!("booking is {} and cannot be paid", current.status))
            });
        }

        let checkout = self
            .payments
            .initiate_payment(PaymentInitiation {
                user_id,
                subject: PaymentSubject::BookingAdvance { booking_id },
                amount: breakdown.advance_amount,
            })
            .await?;

        info!(
            booking_id = %booking_id,
            payment_id = %checkout.payment_id,
            advance = %breakdown.advance_amount,
            platform_fee = %breakdown.platform_fee,
            "Advance payment initiated"
        );
        Ok(AdvanceQuote {
            checkout,
            breakdown,
        })
    }

    /// Verify the gateway callback for a booking advance and mark it paid.
    ///
    /// A callback that verifies after the booking stopped being payable (it
    /// was cancelled, or another payment already covered it) is refunded.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the booking or its pending payment for
    ///   this order does not exist
    /// - [`MarketError::SignatureMismatch`] if the callback does not verify;
    ///   nothing changes
    /// - [`MarketError::AlreadyPaid`] / [`MarketError::InvalidTransition`]
    ///   if the booking can no longer take this payment
    pub async fn complete_booking_payment(
        &self,
        booking_id: BookingId,
        callback: GatewayCallback,
    ) -> Result<Booking> {
        let booking = self.get_booking(booking_id).await?;
        let pending = self
            .payments
            .find_pending(
                PaymentSubject::BookingAdvance { booking_id },
                &callback.gateway_order_id,
            )
            .await?;

        let payment = self
            .payments
            .verify_payment(&PaymentVerification {
                payment_id: pending.id,
                gateway_order_id: callback.gateway_order_id,
                gateway_payment_id: callback.gateway_payment_id,
                gateway_signature: callback.gateway_signature,
            })
            .await?;

        let current = self.get_booking(booking_id).await?;
        if current.status != BookingStatus::Accepted {
            return Err(self.refund_unpayable(&current, payment.id).await);
        }

        let Some(paid) = self
            .bookings
            .mark_advance_paid(booking_id, payment.id, self.clock.now())
            .await?
        else {
            let current = self.get_booking(booking_id).await?;
            return Err(self.refund_unpayable(&current, payment.id).await);
        };

        info!(
            booking_id = %booking_id,
            payment_id = %payment.id,
            amount = %payment.amount,
            "Advance paid"
        );

        let venue_owner = self
            .ledger
            .get_venue(booking.venue_id)
            .await
            .map(|v| v.owner_id)
            .ok();
        for recipient in std::iter::once(paid.user_id).chain(venue_owner) {
            self.notify(
                recipient,
                NotificationKind::AdvancePaid {
                    booking_id,
                    amount: payment.amount,
                },
            );
        }

        Ok(paid)
    }

    /// Load a booking.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if it does not exist.
    pub async fn get_booking(&self, booking_id: BookingId) -> Result<Booking> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| MarketError::not_found("booking", booking_id))
    }

    /// Refund and report; a failure is logged and the payer notified, never raised.
    async fn refund_advance(
        &self,
        booking: &Booking,
        payment_id: PaymentId,
        reason: &str,
    ) -> Option<RefundRecord> {
        match self.payments.refund_payment(payment_id, reason).await {
            Ok(record) => {
                if record.status == RefundStatus::Failed {
                    self.notify(booking.user_id, NotificationKind::RefundFailed { payment_id });
                }
                Some(record)
            }
            Err(e) => {
                error!(
                    booking_id = %booking.id,
                    payment_id = %payment_id,
                    error = %e,
                    "Could not record refund"
                );
                self.notify(booking.user_id, NotificationKind::RefundFailed { payment_id });
                None
            }
        }
    }

    /// Refund a verified advance the booking can no longer take.
    async fn refund_unpayable(&self, current: &Booking, payment_id: PaymentId) -> MarketError {
        if current.status == BookingStatus::Accepted {
            self.refund_advance(current, payment_id, "duplicate advance payment")
                .await;
            MarketError::AlreadyPaid
        } else {
            self.refund_advance(current, payment_id, "booking no longer active")
                .await;
            MarketError::InvalidTransition {
                from: current.status.to_string(),
                to: "paid".to_string(),
            }
        }
    }

    async fn release_after_failed_accept(&self, booking: &Booking) {
        if let Err(e) = self
            .ledger
            .release_slot(booking.venue_id, booking.booking_date, booking.id)
            .await
        {
            error!(booking_id = %booking.id, error = %e, "Could not release slot after failed acceptance");
        }
    }

    /// Whether a concurrent accept of this same booking already holds its slot
    /// or already moved it out of `pending`.
    async fn accepted_elsewhere(&self, booking: &Booking) -> bool {
        let holds_slot = self
            .ledger
            .day(booking.venue_id, booking.booking_date)
            .await
            .is_ok_and(|day| day.slots.iter().any(|slot| slot.booking_id == Some(booking.id)));
        let still_pending = matches!(
            self.bookings.get(booking.id).await,
            Ok(Some(current)) if current.status == BookingStatus::Pending
        );
        holds_slot || !still_pending
    }

    async fn lost_race(&self, booking_id: BookingId, to: BookingStatus) -> MarketError {
        let from = match self.bookings.get(booking_id).await {
            Ok(Some(current)) => current.status.to_string(),
            _ => "unknown".to_string(),
        };
        MarketError::InvalidTransition {
            from,
            to: to.to_string(),
        }
    }

    fn notify(&self, recipient: UserId, kind: NotificationKind) {
        self.notifications.dispatch(Notification::new(recipient, kind));
    }
}

impl std::fmt::Debug for BookingLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingLifecycleManager").finish_non_exhaustive()
    }
}
