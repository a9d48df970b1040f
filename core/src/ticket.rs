//! Tickets, the event capacity counter they consume, and the QR descriptor.
//!
//! Ticket state machine: `active → {used, cancelled}`. Both targets are terminal,
//! and `is_used` never flips back once set.

use crate::error::{MarketError, Result};
use crate::types::{EventId, Money, PaymentId, TicketCode, TicketId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ticket status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Valid for entry
    Active,
    /// Checked in
    Used,
    /// Cancelled by the holder
    Cancelled,
}

impl TicketStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses the storage representation.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidStatus`] for unknown values.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "active" => Ok(Self::Active),
            "used" => Ok(Self::Used),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(MarketError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issued ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Internal id
    pub id: TicketId,
    /// Public code embedded in the QR payload
    pub code: TicketCode,
    /// Holder
    pub user_id: UserId,
    /// Event
    pub event_id: EventId,
    /// Ticket tier (e.g. "general", "vip")
    pub ticket_type: String,
    /// Admissions covered by this ticket
    pub quantity: u32,
    /// Total price paid
    pub price: Money,
    /// Signed QR payload (what scanners read)
    pub qr_payload: String,
    /// Rendered QR image as a `data:` URL
    pub qr_image: String,
    /// Status
    pub status: TicketStatus,
    /// One-way check-in latch
    pub is_used: bool,
    /// When checked in
    pub used_at: Option<DateTime<Utc>>,
    /// Scanner that checked it in
    pub checked_in_by: Option<UserId>,
    /// Payment backing a paid ticket
    pub payment_id: Option<PaymentId>,
    /// Issue time
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Maps a non-active ticket to the error a scan or cancel should report.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::AlreadyUsed`] or [`MarketError::TicketCancelled`]
    /// when the ticket is no longer active.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_used || self.status == TicketStatus::Used {
            return Err(MarketError::AlreadyUsed {
                used_at: self.used_at.unwrap_or(self.created_at),
            });
        }
        if self.status == TicketStatus::Cancelled {
            return Err(MarketError::TicketCancelled);
        }
        Ok(())
    }
}

/// The event aggregate's capacity counter plus what issuance and check-in need.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Event ID
    pub id: EventId,
    /// Organizer (may always scan)
    pub organizer_id: UserId,
    /// Extra users allowed to scan tickets
    pub check_in_staff: Vec<UserId>,
    /// Calendar day of the event
    pub date: NaiveDate,
    /// Price per admission; zero means free
    pub ticket_price: Money,
    /// Admissions sold so far
    pub current_attendees: u32,
    /// Hard cap
    pub max_attendees: u32,
}

impl EventSummary {
    /// Whether tickets must be paid for.
    #[must_use]
    pub const fn is_paid(&self) -> bool {
        !self.ticket_price.is_zero()
    }

    /// Remaining admissions.
    #[must_use]
    pub const fn available(&self) -> u32 {
        self.max_attendees.saturating_sub(self.current_attendees)
    }

    /// Whether `user` may check tickets in.
    #[must_use]
    pub fn can_scan(&self, user: UserId) -> bool {
        self.organizer_id == user || self.check_in_staff.contains(&user)
    }
}

/// Content encoded in a ticket's QR code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDescriptor {
    /// Public ticket code
    pub ticket_id: TicketCode,
    /// Event
    pub event_id: EventId,
    /// Holder
    pub user_id: UserId,
    /// Admissions
    pub quantity: u32,
    /// Tier
    pub ticket_type: String,
    /// Issue time
    pub timestamp: DateTime<Utc>,
}
