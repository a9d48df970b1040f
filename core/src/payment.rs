//! Payment records for booking advances and ticket purchases.

use crate::error::{MarketError, Result};
use crate::types::{BookingId, EventId, Money, PaymentId, TicketId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a payment pays for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentSubject {
    /// 10% advance securing an accepted booking
    BookingAdvance {
        /// Booking being secured
        booking_id: BookingId,
    },
    /// Ticket purchase for an event (ticket is issued after verification)
    TicketPurchase {
        /// Event the tickets are for
        event_id: EventId,
    },
}

impl PaymentSubject {
    /// Discriminator stored next to the reference id
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BookingAdvance { .. } => "booking_advance",
            Self::TicketPurchase { .. } => "ticket_purchase",
        }
    }

    /// Referenced aggregate id
    #[must_use]
    pub const fn reference_id(&self) -> &uuid::Uuid {
        match self {
            Self::BookingAdvance { booking_id } => booking_id.as_uuid(),
            Self::TicketPurchase { event_id } => event_id.as_uuid(),
        }
    }

    /// Rebuilds a subject from its stored discriminator and reference id.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] for unknown discriminators.
    pub fn from_parts(kind: &str, reference_id: uuid::Uuid) -> Result<Self> {
        match kind {
            "booking_advance" => Ok(Self::BookingAdvance {
                booking_id: BookingId::from_uuid(reference_id),
            }),
            "ticket_purchase" => Ok(Self::TicketPurchase {
                event_id: EventId::from_uuid(reference_id),
            }),
            other => Err(MarketError::InvalidStatus(other.to_string())),
        }
    }
}

/// Payment status. `paid` and `failed` are terminal; nothing returns to `pending`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Order created, awaiting verified callback
    Pending,
    /// Signature verified
    Paid,
    /// Gateway reported failure
    Failed,
}

impl PaymentStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    /// Parses the storage representation.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] for unknown values.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(MarketError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a refund attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    /// Gateway accepted the refund
    Processed,
    /// Gateway refused or could not be reached; needs manual follow-up
    Failed,
}

impl RefundStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    /// Parses the storage representation.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] for unknown values.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            other => Err(MarketError::InvalidStatus(other.to_string())),
        }
    }
}

/// Persisted refund attempt on a paid payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    /// Processed or failed
    pub status: RefundStatus,
    /// Amount refunded (or attempted)
    pub amount: Money,
    /// Why the refund was requested
    pub reason: String,
    /// Gateway refund id when processed
    pub gateway_refund_id: Option<String>,
    /// Gateway error when failed
    pub failure: Option<String>,
    /// When the attempt was made
    pub requested_at: DateTime<Utc>,
}

/// A payment for a booking advance or ticket purchase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID
    pub id: PaymentId,
    /// Payer
    pub user_id: UserId,
    /// What is being paid for
    pub subject: PaymentSubject,
    /// Amount in whole units
    pub amount: Money,
    /// Currency code
    pub currency: String,
    /// Gateway order id
    pub gateway_order_id: String,
    /// Gateway payment id, set on verification
    pub gateway_payment_id: Option<String>,
    /// Verified gateway signature
    pub gateway_signature: Option<String>,
    /// Status
    pub status: PaymentStatus,
    /// Rejected verification attempts (tampered or stray signatures)
    pub failed_verifications: u32,
    /// Ticket issued against this payment (ticket purchases only)
    pub consumed_by: Option<TicketId>,
    /// Refund attempt, if any
    pub refund: Option<RefundRecord>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// When verification succeeded
    pub paid_at: Option<DateTime<Utc>>,
}

/// Request to start a payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiation {
    /// Payer
    pub user_id: UserId,
    /// What is being paid for
    pub subject: PaymentSubject,
    /// Amount in whole units
    pub amount: Money,
}

/// Handle returned to the client to complete checkout with the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCheckout {
    /// Internal payment id
    pub payment_id: PaymentId,
    /// Public gateway key id
    pub key_id: String,
    /// Gateway order id
    pub gateway_order_id: String,
    /// Amount in whole units
    pub amount: Money,
    /// Currency code
    pub currency: String,
}

/// Gateway callback to verify.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVerification {
    /// Internal payment id
    pub payment_id: PaymentId,
    /// Gateway order id
    pub gateway_order_id: String,
    /// Gateway payment id
    pub gateway_payment_id: String,
    /// Signature supplied by the client
    pub gateway_signature: String,
}
