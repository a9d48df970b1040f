//! Ticket issuance and check-in.
//!
//! Purchase is two-phase for paid events: a call without a payment returns a
//! checkout handle, and the ticket is only issued once a verified payment is
//! presented. Capacity is taken with one conditional increment on the event
//! counter, and check-in is one conditional claim on the ticket, so neither
//! can be double-spent by concurrent requests.

use crate::notifications::NotificationDispatcher;
use crate::payments::PaymentOrchestrator;
use crate::providers::{EventDirectory, Notification, NotificationKind, TicketStore};
use crate::qr::{TicketSigner, render_data_url};
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use venue_market_core::{
    Clock, EventId, EventSummary, MarketError, Money, PaymentCheckout, PaymentId,
    PaymentInitiation, PaymentStatus, PaymentSubject, RefundRecord, RefundStatus, Result, Ticket,
    TicketCode, TicketDescriptor, TicketId, TicketStatus, UserId,
};

const CODE_PREFIX: &str = "TKT-";
const CODE_LEN: usize = 10;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Regenerations after the first code collides.
const MAX_CODE_RETRIES: u32 = 3;

/// When a ticket may be scanned relative to the event's calendar day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInPolicy {
    /// Offset from UTC of the venue's local time
    pub utc_offset_minutes: i32,
    /// Minutes after local midnight that still count as the event day
    pub grace_minutes: u32,
}

impl CheckInPolicy {
    /// Whether a scan at `at` falls on `event_date` in venue-local time.
    #[must_use]
    pub fn allows(&self, event_date: NaiveDate, at: DateTime<Utc>) -> bool {
        let local = at.naive_utc() + Duration::minutes(i64::from(self.utc_offset_minutes));
        if local.date() == event_date {
            return true;
        }
        event_date.succ_opt() == Some(local.date())
            && local.time().num_seconds_from_midnight() < self.grace_minutes.saturating_mul(60)
    }
}

/// Purchase request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPurchase {
    /// Buyer
    pub user_id: UserId,
    /// Event
    pub event_id: EventId,
    /// Admissions
    pub quantity: u32,
    /// Tier
    pub ticket_type: String,
    /// Verified payment for a paid event
    pub payment_id: Option<PaymentId>,
}

/// Result of a purchase call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// Ticket issued
    Issued(Box<Ticket>),
    /// Paid event: complete this checkout, verify it, then purchase again
    /// with the payment id
    PaymentRequired(PaymentCheckout),
}

/// Scan request from a check-in device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Raw QR content
    pub qr_data: String,
    /// Staff member scanning
    pub scanner_id: UserId,
    /// Event the scanner is admitting to
    pub event_id: EventId,
}

/// Result of a ticket cancellation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketCancellation {
    /// The cancelled ticket
    pub ticket: Ticket,
    /// Refund attempt for a paid ticket
    pub refund: Option<RefundRecord>,
}

/// Sells, validates and cancels tickets.
#[derive(Clone)]
pub struct TicketDesk {
    tickets: Arc<dyn TicketStore>,
    events: Arc<dyn EventDirectory>,
    payments: PaymentOrchestrator,
    signer: TicketSigner,
    notifications: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    check_in: CheckInPolicy,
}

impl TicketDesk {
    /// Wire the desk to its collaborators.
    #[must_use]
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        events: Arc<dyn EventDirectory>,
        payments: PaymentOrchestrator,
        signer: TicketSigner,
        notifications: NotificationDispatcher,
        clock: Arc<dyn Clock>,
        check_in: CheckInPolicy,
    ) -> Self {
        Self {
            tickets,
            events,
            payments,
            signer,
            notifications,
            clock,
            check_in,
        }
    }

    /// Buy tickets, or get a checkout handle for a paid event.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Validation`] for a zero quantity, blank tier, or a
    ///   payment that is unverified, for another event or for another amount
    /// - [`MarketError::NotFound`] if the event or payment does not exist
    /// - [`MarketError::Unauthorized`] if the payment belongs to someone else
    /// - [`MarketError::CapacityExceeded`] if not enough admissions remain
    /// - [`MarketError::PaymentConsumed`] if the payment already funds a ticket
    pub async fn purchase_ticket(&self, request: TicketPurchase) -> Result<PurchaseOutcome> {
        if request.quantity == 0 {
            return Err(MarketError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        if request.ticket_type.trim().is_empty() {
            return Err(MarketError::Validation("ticket type is required".to_string()));
        }

        let event = self.get_event(request.event_id).await?;
        if event.available() < request.quantity {
            return Err(capacity_exceeded(&event, request.quantity));
        }

        let price = event
            .ticket_price
            .checked_multiply(request.quantity)
            .ok_or_else(|| MarketError::Validation("ticket price overflows".to_string()))?;

        let payment_id = if event.is_paid() {
            let Some(payment_id) = request.payment_id else {
                let checkout = self
                    .payments
                    .initiate_payment(PaymentInitiation {
                        user_id: request.user_id,
                        subject: PaymentSubject::TicketPurchase {
                            event_id: event.id,
                        },
                        amount: price,
                    })
                    .await?;
                return Ok(PurchaseOutcome::PaymentRequired(checkout));
            };
            self.check_ticket_payment(&request, payment_id, price).await?;
            Some(payment_id)
        } else {
            None
        };

        let ticket_id = TicketId::new();
        if let Some(payment_id) = payment_id {
            self.payments.consume_for_ticket(payment_id, ticket_id).await?;
        }

        match self
            .events
            .try_reserve_capacity(event.id, request.quantity)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                let current = self.get_event(event.id).await.unwrap_or(event);
                let err = capacity_exceeded(&current, request.quantity);
                if let Some(payment_id) = payment_id {
                    self.release_payment(payment_id, ticket_id).await;
                    self.refund(request.user_id, payment_id, "event sold out").await;
                }
                return Err(err);
            }
            Err(e) => {
                if let Some(payment_id) = payment_id {
                    self.release_payment(payment_id, ticket_id).await;
                }
                return Err(e);
            }
        }

        let ticket = match self.issue(ticket_id, &request, price, payment_id).await {
            Ok(ticket) => ticket,
            Err(e) => {
                self.release_admissions(request.event_id, request.quantity).await;
                if let Some(payment_id) = payment_id {
                    self.release_payment(payment_id, ticket_id).await;
                }
                return Err(e);
            }
        };

        metrics::counter!("market.tickets.issued").increment(u64::from(ticket.quantity));
        info!(
            ticket_code = %ticket.code,
            event_id = %ticket.event_id,
            user_id = %ticket.user_id,
            quantity = ticket.quantity,
            paid = payment_id.is_some(),
            "Ticket issued"
        );
        self.notify(
            ticket.user_id,
            NotificationKind::TicketIssued {
                ticket_code: ticket.code.clone(),
                event_id: ticket.event_id,
            },
        );

        Ok(PurchaseOutcome::Issued(Box::new(ticket)))
    }

    async fn check_ticket_payment(
        &self,
        request: &TicketPurchase,
        payment_id: PaymentId,
        price: Money,
    ) -> Result<()> {
        let payment = self.payments.get_payment(payment_id).await?;

        if payment.user_id != request.user_id {
            return Err(MarketError::Unauthorized(
                "payment belongs to another user".to_string(),
            ));
        }
        if payment.subject
            != (PaymentSubject::TicketPurchase {
                event_id: request.event_id,
            })
        {
            return Err(MarketError::Validation(
                "payment is not for this event".to_string(),
            ));
        }
        if payment.status != PaymentStatus::Paid {
            return Err(MarketError::Validation(
                "payment has not been verified".to_string(),
            ));
        }
        if payment.amount != price {
            return Err(MarketError::Validation(format!(
                "payment of {} does not cover {price}",
                payment.amount
            )));
        }
        if payment.consumed_by.is_some() {
            return Err(MarketError::PaymentConsumed);
        }
        Ok(())
    }

    async fn issue(
        &self,
        ticket_id: TicketId,
        request: &TicketPurchase,
        price: Money,
        payment_id: Option<PaymentId>,
    ) -> Result<Ticket> {
        let mut retries = 0;
        loop {
            let now = self.clock.now();
            let descriptor = TicketDescriptor {
                ticket_id: generate_code(),
                event_id: request.event_id,
                user_id: request.user_id,
                quantity: request.quantity,
                ticket_type: request.ticket_type.trim().to_string(),
                timestamp: now,
            };
            let qr_payload = self.signer.encode(&descriptor)?;
            let ticket = Ticket {
                id: ticket_id,
                code: descriptor.ticket_id,
                user_id: descriptor.user_id,
                event_id: descriptor.event_id,
                ticket_type: descriptor.ticket_type,
                quantity: descriptor.quantity,
                price,
                qr_image: render_data_url(&qr_payload)?,
                qr_payload,
                status: TicketStatus::Active,
                is_used: false,
                used_at: None,
                checked_in_by: None,
                payment_id,
                created_at: now,
            };

            match self.tickets.insert(&ticket).await {
                Ok(()) => return Ok(ticket),
                Err(MarketError::DuplicateTicketCode) if retries < MAX_CODE_RETRIES => {
                    retries += 1;
                    warn!(ticket_code = %ticket.code, retries, "Ticket code collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Check a ticket in.
    ///
    /// # Errors
    ///
    /// - [`MarketError::InvalidQr`] for malformed or forged payloads
    /// - [`MarketError::WrongEvent`] if the ticket is for another event
    /// - [`MarketError::Unauthorized`] unless the scanner is the organizer or staff
    /// - [`MarketError::NotFound`] if the ticket or event does not exist
    /// - [`MarketError::AlreadyUsed`] (with the original check-in time) or
    ///   [`MarketError::TicketCancelled`]
    /// - [`MarketError::OutsideEventDay`] if scanned on another day
    pub async fn scan_ticket(&self, request: &ScanRequest) -> Result<Ticket> {
        match self.scan(request).await {
            Ok(ticket) => {
                metrics::counter!("market.tickets.scanned").increment(1);
                info!(
                    ticket_code = %ticket.code,
                    event_id = %ticket.event_id,
                    scanner_id = %request.scanner_id,
                    "Ticket checked in"
                );
                Ok(ticket)
            }
            Err(e) => {
                metrics::counter!("market.tickets.scan_rejected").increment(1);
                warn!(
                    event_id = %request.event_id,
                    scanner_id = %request.scanner_id,
                    error = %e,
                    security = e.is_security_issue(),
                    "Ticket scan rejected"
                );
                Err(e)
            }
        }
    }

    async fn scan(&self, request: &ScanRequest) -> Result<Ticket> {
        let descriptor = self.signer.decode(&request.qr_data)?;
        if descriptor.event_id != request.event_id {
            return Err(MarketError::WrongEvent);
        }

        let event = self.get_event(request.event_id).await?;
        if !event.can_scan(request.scanner_id) {
            return Err(MarketError::Unauthorized(
                "scanner is not check-in staff for this event".to_string(),
            ));
        }

        let ticket = self.get_ticket(&descriptor.ticket_id).await?;
        if ticket.event_id != request.event_id {
            return Err(MarketError::WrongEvent);
        }
        ticket.ensure_active()?;

        let now = self.clock.now();
        if !self.check_in.allows(event.date, now) {
            return Err(MarketError::OutsideEventDay);
        }

        match self
            .tickets
            .claim(&ticket.code, request.scanner_id, now)
            .await?
        {
            Some(claimed) => Ok(claimed),
            // Lost the claim: report whatever the winner left behind.
            None => {
                let current = self.get_ticket(&ticket.code).await?;
                Err(current
                    .ensure_active()
                    .err()
                    .unwrap_or(MarketError::AlreadyUsed { used_at: now }))
            }
        }
    }

    /// Cancel an unused ticket and give its admissions back.
    ///
    /// A paid ticket is refunded; the outcome is returned and a failed refund
    /// does not undo the cancellation. Once the ticket is cancelled the refund
    /// is always attempted, even if the admissions could not be released.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the ticket does not exist
    /// - [`MarketError::Unauthorized`] unless `actor` holds the ticket or organizes the event
    /// - [`MarketError::AlreadyUsed`] / [`MarketError::TicketCancelled`] if not active
    pub async fn cancel_ticket(&self, code: &TicketCode, actor: UserId) -> Result<TicketCancellation> {
        let ticket = self.get_ticket(code).await?;
        if actor != ticket.user_id {
            let event = self.get_event(ticket.event_id).await?;
            if actor != event.organizer_id {
                return Err(MarketError::Unauthorized(
                    "only the holder or organizer can cancel a ticket".to_string(),
                ));
            }
        }
        ticket.ensure_active()?;

        let Some(cancelled) = self.tickets.cancel(code).await? else {
            let current = self.get_ticket(code).await?;
            current.ensure_active()?;
            return Err(MarketError::TicketCancelled);
        };

        self.release_admissions(cancelled.event_id, cancelled.quantity)
            .await;

        let refund = match cancelled.payment_id {
            Some(payment_id) => self.refund(cancelled.user_id, payment_id, "ticket cancelled").await,
            None => None,
        };

        metrics::counter!("market.tickets.cancelled").increment(1);
        info!(
            ticket_code = %cancelled.code,
            event_id = %cancelled.event_id,
            quantity = cancelled.quantity,
            refunded = refund.as_ref().is_some_and(|r| r.status == RefundStatus::Processed),
            "Ticket cancelled"
        );
        self.notify(
            cancelled.user_id,
            NotificationKind::TicketCancelled {
                ticket_code: cancelled.code.clone(),
            },
        );

        Ok(TicketCancellation {
            ticket: cancelled,
            refund,
        })
    }

    /// Load a ticket by its public code.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if it does not exist.
    pub async fn get_ticket(&self, code: &TicketCode) -> Result<Ticket> {
        self.tickets
            .get_by_code(code)
            .await?
            .ok_or_else(|| MarketError::not_found("ticket", code))
    }

    async fn get_event(&self, event_id: EventId) -> Result<EventSummary> {
        self.events
            .get_event(event_id)
            .await?
            .ok_or_else(|| MarketError::not_found("event", event_id))
    }

    async fn refund(
        &self,
        user_id: UserId,
        payment_id: PaymentId,
        reason: &str,
    ) -> Option<RefundRecord> {
        match self.payments.refund_payment(payment_id, reason).await {
            Ok(record) => {
                if record.status == RefundStatus::Failed {
                    self.notify(user_id, NotificationKind::RefundFailed { payment_id });
                }
                Some(record)
            }
            Err(e) => {
                error!(payment_id = %payment_id, error = %e, "Could not record refund");
                self.notify(user_id, NotificationKind::RefundFailed { payment_id });
                None
            }
        }
    }

    /// Give admissions back to the event; a failure is logged and counted.
    async fn release_admissions(&self, event_id: EventId, quantity: u32) {
        if let Err(e) = self.events.release_capacity(event_id, quantity).await {
            metrics::counter!("market.tickets.capacity_release_failed").increment(1);
            error!(event_id = %event_id, quantity, error = %e, "Could not release admissions");
        }
    }

    /// Unlink a payment from a ticket that was never issued.
    async fn release_payment(&self, payment_id: PaymentId, ticket_id: TicketId) {
        if let Err(e) = self.payments.release_for_ticket(payment_id, ticket_id).await {
            error!(
                payment_id = %payment_id,
                ticket_id = %ticket_id,
                error = %e,
                "Could not release payment after failed issuance"
            );
        }
    }

    fn notify(&self, recipient: UserId, kind: NotificationKind) {
        self.notifications.dispatch(Notification::new(recipient, kind));
    }
}

impl std::fmt::Debug for TicketDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketDesk")
            .field("check_in", &self.check_in)
            .finish_non_exhaustive()
    }
}

fn capacity_exceeded(event: &EventSummary, requested: u32) -> MarketError {
    metrics::counter!("market.tickets.capacity_exceeded").increment(1);
    warn!(
        event_id = %event.id,
        requested,
        available = event.available(),
        "Event capacity exceeded"
    );
    MarketError::CapacityExceeded {
        requested,
        available: event.available(),
    }
}

fn generate_code() -> TicketCode {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
        .collect();
    TicketCode::new(format!("{CODE_PREFIX}{suffix}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()
    }

    #[test]
    fn default_policy_is_exact_utc_day() {
        let policy = CheckInPolicy::default();
        assert!(policy.allows(day(), at(2025, 6, 14, 0, 0)));
        assert!(policy.allows(day(), at(2025, 6, 14, 23, 59)));
        assert!(!policy.allows(day(), at(2025, 6, 15, 0, 1)));
        assert!(!policy.allows(day(), at(2025, 6, 13, 23, 59)));
    }

    #[test]
    fn offset_moves_the_local_day() {
        let ist = CheckInPolicy {
            utc_offset_minutes: 330,
            grace_minutes: 0,
        };
        // 19:00 UTC on the 13th is 00:30 on the 14th in UTC+05:30.
        assert!(ist.allows(day(), at(2025, 6, 13, 19, 0)));
        assert!(!ist.allows(day(), at(2025, 6, 14, 19, 0)));
    }

    #[test]
    fn grace_covers_events_running_past_midnight() {
        let policy = CheckInPolicy {
            utc_offset_minutes: 0,
            grace_minutes: 120,
        };
        assert!(policy.allows(day(), at(2025, 6, 15, 1, 59)));
        assert!(!policy.allows(day(), at(2025, 6, 15, 2, 0)));
        assert!(!policy.allows(day(), at(2025, 6, 16, 0, 30)));
    }

    #[test]
    fn generated_codes_are_prefixed_and_unambiguous() {
        for _ in 0..100 {
            let code = generate_code();
            let suffix = code.as_str().strip_prefix(CODE_PREFIX).unwrap();
            assert_eq!(suffix.len(), CODE_LEN);
            assert!(suffix.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }
}
