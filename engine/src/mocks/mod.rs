//! In-memory provider implementations for tests and the demo binary.
//!
//! Each store keeps its state behind one mutex, so every conditional write
//! (capacity reservation, ticket claim, slot reservation, payment
//! transitions) runs inside a single critical section, matching the
//! single-statement guarantees of the Postgres store.

pub mod clock;
pub mod gateway;
pub mod notifier;
pub mod stores;

pub use clock::FixedClock;
pub use gateway::MockPaymentGateway;
pub use notifier::RecordingNotifier;
pub use stores::{
    MockBookingStore, MockEventDirectory, MockPaymentStore, MockTicketStore, MockVenueStore,
};

use crate::app::MarketEnvironment;
use crate::config::MarketConfig;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use venue_market_core::{MarketError, Result};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| MarketError::Internal("Mutex lock failed".to_string()))
}

/// One of every in-memory provider, sharing state with the environment it builds.
#[derive(Debug, Clone)]
pub struct InMemoryMarket {
    /// Clock
    pub clock: FixedClock,
    /// Venues and slots
    pub venues: MockVenueStore,
    /// Bookings
    pub bookings: MockBookingStore,
    /// Payments
    pub payments: MockPaymentStore,
    /// Tickets
    pub tickets: MockTicketStore,
    /// Event counters
    pub events: MockEventDirectory,
    /// Gateway signing with the configured key secret
    pub gateway: MockPaymentGateway,
    /// Notifications
    pub notifier: RecordingNotifier,
}

impl InMemoryMarket {
    /// Fresh providers with the clock frozen at `now`.
    #[must_use]
    pub fn new(config: &MarketConfig, now: DateTime<Utc>) -> Self {
        Self {
            clock: FixedClock::new(now),
            venues: MockVenueStore::new(),
            bookings: MockBookingStore::new(),
            payments: MockPaymentStore::new(),
            tickets: MockTicketStore::new(),
            events: MockEventDirectory::new(),
            gateway: MockPaymentGateway::new(
                config.payment.key_id.clone(),
                &config.payment.key_secret,
            ),
            notifier: RecordingNotifier::new(),
        }
    }

    /// Environment backed by these providers.
    #[must_use]
    pub fn environment(&self) -> MarketEnvironment {
        MarketEnvironment {
            venues: Arc::new(self.venues.clone()),
            bookings: Arc::new(self.bookings.clone()),
            payments: Arc::new(self.payments.clone()),
            tickets: Arc::new(self.tickets.clone()),
            events: Arc::new(self.events.clone()),
            gateway: Arc::new(self.gateway.clone()),
            notifier: Arc::new(self.notifier.clone()),
            clock: Arc::new(self.clock.clone()),
        }
    }
}
