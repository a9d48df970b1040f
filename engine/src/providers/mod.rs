//! Provider traits for the engine's external collaborators.
//!
//! Every store method that guards an invariant is a single conditional write:
//! implementations must evaluate the condition and apply the change atomically
//! (one SQL statement, or one critical section for in-memory stores). The
//! services never read-then-write to enforce capacity, slot exclusivity,
//! single check-in or single verification.

mod booking_store;
mod console_notifier;
mod event_directory;
mod gateway;
mod notifier;
mod payment_store;
mod ticket_store;
mod venue_store;

pub use booking_store::BookingStore;
pub use console_notifier::ConsoleNotifier;
pub use event_directory::EventDirectory;
pub use gateway::{GatewayOrder, GatewayRefund, PaymentGateway};
pub use notifier::{Notification, NotificationKind, Notifier, NotifyError};
pub use payment_store::PaymentStore;
pub use ticket_store::TicketStore;
pub use venue_store::VenueStore;
