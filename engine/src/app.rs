//! Wiring of the four components over one set of providers.

use crate::bookings::BookingLifecycleManager;
use crate::config::MarketConfig;
use crate::ledger::VenueAvailabilityLedger;
use crate::notifications::NotificationDispatcher;
use crate::payments::{GatewaySigner, PaymentOrchestrator};
use crate::providers::{
    BookingStore, EventDirectory, Notifier, PaymentGateway, PaymentStore, TicketStore, VenueStore,
};
use crate::qr::TicketSigner;
use crate::retry::RetryPolicy;
use crate::tickets::{CheckInPolicy, TicketDesk};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use venue_market_core::Clock;

/// External collaborators the engine runs against.
#[derive(Clone)]
pub struct MarketEnvironment {
    /// Venue aggregate and slot ledger
    pub venues: Arc<dyn VenueStore>,
    /// Bookings
    pub bookings: Arc<dyn BookingStore>,
    /// Payments
    pub payments: Arc<dyn PaymentStore>,
    /// Tickets
    pub tickets: Arc<dyn TicketStore>,
    /// Event capacity counters
    pub events: Arc<dyn EventDirectory>,
    /// Payment gateway
    pub gateway: Arc<dyn PaymentGateway>,
    /// Notification channel
    pub notifier: Arc<dyn Notifier>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

/// The booking, payment and ticket engine.
#[derive(Clone, Debug)]
pub struct Marketplace {
    /// Venue slot ledger
    pub ledger: VenueAvailabilityLedger,
    /// Payment orchestration
    pub payments: PaymentOrchestrator,
    /// Booking lifecycle
    pub bookings: BookingLifecycleManager,
    /// Ticket issuance and check-in
    pub tickets: TicketDesk,
}

impl Marketplace {
    /// Build the engine and start its notification worker.
    ///
    /// Must be called inside a tokio runtime. The returned handle completes
    /// once every clone of the marketplace is dropped and queued
    /// notifications are delivered.
    #[must_use]
    pub fn new(env: MarketEnvironment, config: &MarketConfig) -> (Self, JoinHandle<()>) {
        let retry = RetryPolicy::new()
            .with_max_retries(config.notifications.max_retries)
            .with_initial_delay(Duration::from_millis(config.notifications.initial_delay_ms));
        let (notifications, worker) = NotificationDispatcher::spawn(
            env.notifier,
            retry,
            config.notifications.queue_capacity,
        );

        let ledger = VenueAvailabilityLedger::new(env.venues);
        let payments = PaymentOrchestrator::new(
            env.payments,
            env.gateway,
            GatewaySigner::new(config.payment.key_secret.as_bytes()),
            Arc::clone(&env.clock),
            config.payment.currency.clone(),
        );
        let bookings = BookingLifecycleManager::new(
            env.bookings,
            ledger.clone(),
            payments.clone(),
            notifications.clone(),
            Arc::clone(&env.clock),
        );
        let tickets = TicketDesk::new(
            env.tickets,
            env.events,
            payments.clone(),
            TicketSigner::new(config.tickets.signing_secret.as_bytes()),
            notifications,
            env.clock,
            CheckInPolicy {
                utc_offset_minutes: config.tickets.checkin_utc_offset_minutes,
                grace_minutes: config.tickets.checkin_grace_minutes,
            },
        );

        (
            Self {
                ledger,
                payments,
                bookings,
                tickets,
            },
            worker,
        )
    }
}
