//! # Venue Market Core
//!
//! Domain types for the venue marketplace's booking, payment and ticket engine.
//!
//! ## Aggregates
//!
//! - **Booking**: a request to use a venue slot, with a 10% advance payment
//! - **Payment**: a gateway order for a booking advance or a ticket purchase
//! - **Ticket**: a single-use admission with a signed QR descriptor
//! - **Venue** / **`EventSummary`**: external aggregates consumed by the engine
//!
//! State machines live next to their aggregates
//! ([`BookingStatus::can_transition_to`], [`TicketStatus`]) so every store
//! implementation enforces the same edges. All fallible operations return
//! [`Result`] with a [`MarketError`] from the shared taxonomy.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod booking;
pub mod environment;
pub mod error;
pub mod payment;
pub mod pricing;
pub mod ticket;
pub mod types;
pub mod venue;

pub use booking::{
    Booking, BookingPaymentStatus, BookingRequest, BookingStatus, BookingTransition, OwnerResponse,
};
pub use environment::{Clock, SystemClock};
pub use error::{ErrorKind, MarketError, Result};
pub use payment::{
    Payment, PaymentCheckout, PaymentInitiation, PaymentStatus, PaymentSubject,
    PaymentVerification, RefundRecord, RefundStatus,
};
pub use pricing::AdvanceBreakdown;
pub use ticket::{EventSummary, Ticket, TicketDescriptor, TicketStatus};
pub use types::{BookingId, EventId, Money, PaymentId, TicketCode, TicketId, UserId, VenueId};
pub use venue::{DayAvailability, Slot, SlotKind, TimeWindow, Venue};
