//! Error types for booking, payment and ticket operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketError>;

/// Coarse error category a transport layer maps to protocol responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, unknown enum value, missing field
    Validation,
    /// Referenced entity does not exist
    NotFound,
    /// Actor does not own the resource
    Unauthorized,
    /// Request collides with current state (capacity, slot, already used/paid)
    Conflict,
    /// Payment gateway rejected, timed out, or could not be reached
    Gateway,
    /// Storage or internal failure
    Internal,
}

/// Comprehensive error taxonomy for the booking, payment and ticket engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarketError {
    // ═══════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════

    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A status string is not one of the recognized values.
    #[error("Unrecognized status: {0}")]
    InvalidStatus(String),

    /// QR payload could not be parsed or its signature did not verify.
    #[error("Invalid QR code: {reason}")]
    InvalidQr {
        /// What was wrong with the payload
        reason: String,
    },

    /// Ticket belongs to a different event than the one being scanned.
    #[error("Ticket is not valid for this event")]
    WrongEvent,

    /// Scan attempted outside the event's calendar day.
    #[error("Tickets can only be scanned on the event day")]
    OutsideEventDay,

    // ═══════════════════════════════════════════════════════════
    // Lookup Errors
    // ═══════════════════════════════════════════════════════════

    /// Requested entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind ("booking", "ticket", ...)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════

    /// Actor does not own or manage the resource.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    // ═══════════════════════════════════════════════════════════
    // Conflicts
    // ═══════════════════════════════════════════════════════════

    /// State machine does not permit the transition (or a concurrent writer won).
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Not enough remaining event capacity.
    #[error("Capacity exceeded: requested {requested}, available {available}")]
    CapacityExceeded {
        /// Quantity requested
        requested: u32,
        /// Seats still available when the request was evaluated
        available: u32,
    },

    /// Booking advance has already been paid.
    #[error("Payment has already been completed")]
    AlreadyPaid,

    /// Ticket has already been checked in.
    #[error("Ticket already used at {used_at}")]
    AlreadyUsed {
        /// When the ticket was first checked in
        used_at: DateTime<Utc>,
    },

    /// Ticket was cancelled.
    #[error("Ticket has been cancelled")]
    TicketCancelled,

    /// Requested slot overlaps an existing booked or blocked slot.
    #[error("Slot overlaps an existing reservation")]
    SlotConflict,

    /// Payment is no longer pending.
    #[error("Payment is not pending")]
    PaymentNotPending,

    /// Payment already backs another ticket issuance.
    #[error("Payment has already been used")]
    PaymentConsumed,

    /// Public ticket code collided with an existing one.
    #[error("Duplicate ticket code")]
    DuplicateTicketCode,

    // ═══════════════════════════════════════════════════════════
    // Gateway Errors
    // ═══════════════════════════════════════════════════════════

    /// Recomputed gateway signature did not match the supplied one.
    #[error("Payment signature verification failed")]
    SignatureMismatch,

    /// Gateway did not answer in time. Never retried automatically.
    #[error("Payment gateway timed out")]
    GatewayTimeout,

    /// Gateway unreachable or returned an error.
    #[error("Payment gateway error: {0}")]
    GatewayUnavailable(String),

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error (should not be exposed to users).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Shorthand for [`MarketError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the taxonomy category of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// # use venue_market_core::{ErrorKind, MarketError};
    /// assert_eq!(MarketError::SlotConflict.kind(), ErrorKind::Conflict);
    /// assert_eq!(MarketError::GatewayTimeout.kind(), ErrorKind::Gateway);
    /// ```
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::InvalidStatus(_)
            | Self::InvalidQr { .. }
            | Self::WrongEvent
            | Self::OutsideEventDay => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InvalidTransition { .. }
            | Self::CapacityExceeded { .. }
            | Self::AlreadyPaid
            | Self::AlreadyUsed { .. }
            | Self::TicketCancelled
            | Self::SlotConflict
            | Self::PaymentNotPending
            | Self::PaymentConsumed
            | Self::DuplicateTicketCode => ErrorKind::Conflict,
            Self::SignatureMismatch | Self::GatewayTimeout | Self::GatewayUnavailable(_) => {
                ErrorKind::Gateway
            }
            Self::Storage(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` if this error indicates a possible forgery attempt.
    #[must_use]
    pub const fn is_security_issue(&self) -> bool {
        matches!(
            self,
            Self::SignatureMismatch | Self::InvalidQr { .. } | Self::WrongEvent
        )
    }
}
