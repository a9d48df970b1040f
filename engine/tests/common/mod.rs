//! Shared fixtures for engine integration tests.

#![allow(dead_code, clippy::expect_used)]

pub mod faults;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use tokio::task::JoinHandle;
use venue_market_core::{
    BookingRequest, EventId, EventSummary, Money, PaymentCheckout, PaymentVerification,
    TimeWindow, UserId, Venue, VenueId,
};
use venue_market_engine::mocks::InMemoryMarket;
use venue_market_engine::{GatewayCallback, MarketConfig, MarketEnvironment, Marketplace};

/// Test world: in-memory providers plus the engine built over them.
pub struct Harness {
    pub config: MarketConfig,
    pub providers: InMemoryMarket,
    pub market: Marketplace,
    worker: JoinHandle<()>,
}

/// 2025-06-14 10:00 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 14, 10, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub fn today() -> NaiveDate {
    now().date_naive()
}

pub fn next_week() -> NaiveDate {
    today() + Duration::days(7)
}

pub fn window(start: u32, end: u32) -> TimeWindow {
    TimeWindow::new(
        NaiveTime::from_hms_opt(start, 0, 0).expect("valid start"),
        NaiveTime::from_hms_opt(end, 0, 0).expect("valid end"),
    )
    .expect("valid window")
}

impl Harness {
    /// Must run inside a tokio runtime (starts the notification worker).
    pub fn new() -> Self {
        Self::with_environment(|env, _| env)
    }

    /// Like [`Harness::new`], with some providers swapped out by `wrap`.
    pub fn with_environment(
        wrap: impl FnOnce(MarketEnvironment, &InMemoryMarket) -> MarketEnvironment,
    ) -> Self {
        let config = MarketConfig::default();
        let providers = InMemoryMarket::new(&config, now());
        let env = wrap(providers.environment(), &providers);
        let (market, worker) = Marketplace::new(env, &config);
        Self {
            config,
            providers,
            market,
            worker,
        }
    }

    /// Stop the engine and wait until queued notifications are delivered.
    pub async fn drain(self) -> InMemoryMarket {
        drop(self.market);
        self.worker.await.expect("notification worker");
        self.providers
    }

    pub fn venue(&self, auto_approve: bool) -> Venue {
        let venue = Venue {
            id: VenueId::new(),
            owner_id: UserId::new(),
            name: "Lakeside Pavilion".to_string(),
            auto_approve,
        };
        self.providers.venues.add_venue(venue.clone());
        venue
    }

    pub fn booking_request(&self, user_id: UserId, venue: &Venue, start: u32, end: u32) -> BookingRequest {
        BookingRequest {
            user_id,
            venue_id: venue.id,
            booking_date: next_week(),
            window: window(start, end),
            expected_guests: 80,
            purpose: "Wedding reception".to_string(),
            total_amount: Money::new(10_000),
        }
    }

    pub fn event(&self, price: u64, max_attendees: u32) -> EventSummary {
        let event = EventSummary {
            id: EventId::new(),
            organizer_id: UserId::new(),
            check_in_staff: Vec::new(),
            date: today(),
            ticket_price: Money::new(price),
            current_attendees: 0,
            max_attendees,
        };
        self.providers.events.add_event(event.clone());
        event
    }

    /// Pay a checkout at the mock gateway and return the signed callback.
    pub fn pay(&self, checkout: &PaymentCheckout) -> PaymentVerification {
        let (gateway_payment_id, gateway_signature) = self
            .providers
            .gateway
            .complete_checkout(&checkout.gateway_order_id)
            .expect("gateway signs checkout");
        PaymentVerification {
            payment_id: checkout.payment_id,
            gateway_order_id: checkout.gateway_order_id.clone(),
            gateway_payment_id,
            gateway_signature,
        }
    }

    pub fn callback(&self, checkout: &PaymentCheckout) -> GatewayCallback {
        let verification = self.pay(checkout);
        GatewayCallback {
            gateway_order_id: verification.gateway_order_id,
            gateway_payment_id: verification.gateway_payment_id,
            gateway_signature: verification.gateway_signature,
        }
    }
}
