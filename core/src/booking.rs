//! Booking aggregate and its state machine.
//!
//! ```text
//! pending ──► accepted ──► completed
//!    │           │
//!    ├──► rejected
//!    └──► cancelled ◄──┘
//! ```
//!
//! `rejected`, `cancelled` and `completed` are terminal. The payment status is
//! tracked separately and keeps moving `unpaid → pending → paid` after acceptance.

use crate::error::{MarketError, Result};
use crate::types::{BookingId, Money, PaymentId, UserId, VenueId};
use crate::venue::TimeWindow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Booking lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Waiting for the venue owner
    Pending,
    /// Owner accepted, slot reserved
    Accepted,
    /// Owner declined
    Rejected,
    /// Booker or owner cancelled
    Cancelled,
    /// Event took place
    Completed,
}

impl BookingStatus {
    /// Storage / wire representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Parses a status string.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] if the value is not recognized.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(MarketError::InvalidStatus(other.to_string())),
        }
    }

    /// No further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Completed)
    }

    /// Whether the state machine allows `self → next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted | Self::Rejected | Self::Cancelled)
                | (Self::Accepted, Self::Cancelled | Self::Completed)
        )
    }

    /// Validates `self → next`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidTransition`] if the transition is not allowed.
    pub fn ensure_transition(&self, next: Self) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(MarketError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advance payment status of a booking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingPaymentStatus {
    /// Nothing initiated
    #[default]
    Unpaid,
    /// Gateway order created, waiting for verification
    Pending,
    /// Advance verified
    Paid,
    /// Gateway reported failure
    Failed,
}

impl BookingPaymentStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
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
            "unpaid" => Ok(Self::Unpaid),
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(MarketError::InvalidStatus(other.to_string())),
        }
    }
}

/// What the owner recorded when responding to a request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerResponse {
    /// When the owner (or auto-approval) responded
    pub responded_at: Option<DateTime<Utc>>,
    /// Alternative dates suggested by the owner
    pub modified_dates: Vec<NaiveDate>,
}

/// A venue booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking ID
    pub id: BookingId,
    /// Booker
    pub user_id: UserId,
    /// Venue being booked
    pub venue_id: VenueId,
    /// Date of use
    pub booking_date: NaiveDate,
    /// Time window on that date
    pub window: TimeWindow,
    /// Expected headcount
    pub expected_guests: u32,
    /// Free-text purpose
    pub purpose: String,
    /// Full venue price (supplied by the caller)
    pub total_amount: Money,
    /// Marketplace fee on the advance, set at payment initiation
    pub platform_fee: Money,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Advance payment status
    pub payment_status: BookingPaymentStatus,
    /// Reason given on rejection
    pub rejection_reason: Option<String>,
    /// Reason given on cancellation
    pub cancellation_reason: Option<String>,
    /// Owner response details
    pub owner_response: OwnerResponse,
    /// Verified advance payment
    pub payment_id: Option<PaymentId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Booker
    pub user_id: UserId,
    /// Venue to book
    pub venue_id: VenueId,
    /// Date of use
    pub booking_date: NaiveDate,
    /// Time window on that date
    pub window: TimeWindow,
    /// Expected headcount
    pub expected_guests: u32,
    /// Free-text purpose
    pub purpose: String,
    /// Full venue price
    pub total_amount: Money,
}

impl Booking {
    /// Builds a fresh `pending`/`unpaid` booking from a request.
    #[must_use]
    pub fn from_request(request: BookingRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: BookingId::new(),
            user_id: request.user_id,
            venue_id: request.venue_id,
            booking_date: request.booking_date,
            window: request.window,
            expected_guests: request.expected_guests,
            purpose: request.purpose,
            total_amount: request.total_amount,
            platform_fee: Money::ZERO,
            status: BookingStatus::Pending,
            payment_status: BookingPaymentStatus::Unpaid,
            rejection_reason: None,
            cancellation_reason: None,
            owner_response: OwnerResponse::default(),
            payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Field changes applied together with a status transition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookingTransition {
    /// Set `owner_response.responded_at`
    pub responded_at: Option<DateTime<Utc>>,
    /// Set `owner_response.modified_dates` when non-empty
    pub modified_dates: Vec<NaiveDate>,
    /// Set `rejection_reason`
    pub rejection_reason: Option<String>,
    /// Set `cancellation_reason`
    pub cancellation_reason: Option<String>,
}

impl BookingTransition {
    /// Applies the patch and the new status to a booking.
    pub fn apply(&self, booking: &mut Booking, to: BookingStatus, now: DateTime<Utc>) {
        booking.status = to;
        booking.updated_at = now;
        if let Some(at) = self.responded_at {
            booking.owner_response.responded_at = Some(at);
        }
        if !self.modified_dates.is_empty() {
            booking.owner_response.modified_dates.clone_from(&self.modified_dates);
        }
        if self.rejection_reason.is_some() {
            booking.rejection_reason.clone_from(&self.rejection_reason);
        }
        if self.cancellation_reason.is_some() {
            booking.cancellation_reason.clone_from(&self.cancellation_reason);
        }
    }
}
