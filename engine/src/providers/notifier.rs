//! Outbound notification channel trait.
//!
//! Message content and templating belong to the delivery channel; the engine
//! only says who is notified about what.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use venue_market_core::{BookingId, EventId, Money, PaymentId, TicketCode, UserId};

/// Delivery failure. Never propagated to booking/ticket/payment callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Channel refused or could not be reached.
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// Recipient has no usable contact details.
    #[error("No contact details for recipient")]
    NoContact,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    /// Booker: request received
    BookingRequested {
        /// Booking
        booking_id: BookingId,
    },
    /// Owner: a new request awaits a response
    BookingAwaitingResponse {
        /// Booking
        booking_id: BookingId,
        /// Venue name
        venue_name: String,
    },
    /// Booker: request accepted
    BookingAccepted {
        /// Booking
        booking_id: BookingId,
    },
    /// Booker: request rejected
    BookingRejected {
        /// Booking
        booking_id: BookingId,
        /// Owner's reason
        reason: Option<String>,
    },
    /// Booker and owner: booking cancelled
    BookingCancelled {
        /// Booking
        booking_id: BookingId,
        /// Cancellation reason
        reason: Option<String>,
    },
    /// Booker and owner: advance received
    AdvancePaid {
        /// Booking
        booking_id: BookingId,
        /// Advance amount
        amount: Money,
    },
    /// Attendee: ticket issued
    TicketIssued {
        /// Public ticket code
        ticket_code: TicketCode,
        /// Event
        event_id: EventId,
    },
    /// Attendee: ticket cancelled
    TicketCancelled {
        /// Public ticket code
        ticket_code: TicketCode,
    },
    /// Payer: refund could not be processed and needs follow-up
    RefundFailed {
        /// Payment
        payment_id: PaymentId,
    },
}

/// A message addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient; the channel resolves contact details
    pub recipient: UserId,
    /// Content
    pub kind: NotificationKind,
}

impl Notification {
    /// Creates a notification.
    #[must_use]
    pub const fn new(recipient: UserId, kind: NotificationKind) -> Self {
        Self { recipient, kind }
    }
}

/// Delivery channel (email, chat message, push).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if delivery fails.
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}
