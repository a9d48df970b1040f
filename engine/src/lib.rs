//! # Venue Market Engine
//!
//! The booking, payment and ticket lifecycle engine of the venue marketplace.
//!
//! ## Components
//!
//! - [`VenueAvailabilityLedger`]: per-venue, per-date slot reservations
//! - [`PaymentOrchestrator`]: gateway orders, callback verification, refunds
//! - [`BookingLifecycleManager`]: request → accept/reject → pay advance → cancel
//! - [`TicketDesk`]: ticket purchase, check-in scans and cancellation
//!
//! Collaborators (stores, payment gateway, notification channel, clock) are
//! injected as trait objects through [`MarketEnvironment`]. Every invariant
//! that concurrent requests could break (slot exclusivity, event capacity,
//! single check-in, single verification) is enforced by one conditional
//! write in the store, never by read-then-write in the services.
//!
//! ## Example
//!
//! ```rust,no_run
//! use venue_market_engine::{MarketConfig, Marketplace};
//! use venue_market_engine::mocks::InMemoryMarket;
//!
//! # async fn example() {
//! let config = MarketConfig::default();
//! let providers = InMemoryMarket::new(&config, chrono::Utc::now());
//! let (market, _worker) = Marketplace::new(providers.environment(), &config);
//! # let _ = market;
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod app;
pub mod bookings;
pub mod config;
pub mod http_gateway;
pub mod ledger;
pub mod notifications;
pub mod payments;
pub mod providers;
pub mod qr;
pub mod retry;
pub mod tickets;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use app::{MarketEnvironment, Marketplace};
pub use bookings::{AdvanceQuote, BookingLifecycleManager, CancellationOutcome, GatewayCallback, StatusUpdate};
pub use config::MarketConfig;
pub use http_gateway::HttpPaymentGateway;
pub use ledger::VenueAvailabilityLedger;
pub use notifications::NotificationDispatcher;
pub use payments::{GatewaySigner, PaymentOrchestrator};
pub use qr::TicketSigner;
pub use tickets::{CheckInPolicy, PurchaseOutcome, ScanRequest, TicketCancellation, TicketDesk, TicketPurchase};
