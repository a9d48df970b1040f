//! Walkthrough of the engine on in-memory providers.
//!
//! request → accept → pay advance → buy ticket → scan → rescan (rejected)

use anyhow::Context;
use chrono::{Duration, NaiveTime, Utc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use venue_market_core::{
    BookingRequest, EventId, EventSummary, Money, PaymentVerification, TimeWindow, UserId, Venue,
    VenueId,
};
use venue_market_engine::mocks::InMemoryMarket;
use venue_market_engine::{
    GatewayCallback, MarketConfig, Marketplace, PurchaseOutcome, ScanRequest, StatusUpdate,
    TicketPurchase,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = MarketConfig::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let now = Utc::now();
    let providers = InMemoryMarket::new(&config, now);
    let (market, worker) = Marketplace::new(providers.environment(), &config);

    let owner = UserId::new();
    let organizer = UserId::new();
    let attendee = UserId::new();

    let venue = Venue {
        id: VenueId::new(),
        owner_id: owner,
        name: "Riverside Hall".to_string(),
        auto_approve: false,
    };
    providers.venues.add_venue(venue.clone());

    // Booking: request, accept, pay the advance.
    let window = TimeWindow::new(
        NaiveTime::from_hms_opt(18, 0, 0).context("start time")?,
        NaiveTime::from_hms_opt(23, 0, 0).context("end time")?,
    )?;
    let booking = market
        .bookings
        .create_booking(BookingRequest {
            user_id: organizer,
            venue_id: venue.id,
            booking_date: (now + Duration::days(7)).date_naive(),
            window,
            expected_guests: 120,
            purpose: "Album launch".to_string(),
            total_amount: Money::new(10_000),
        })
        .await?;

    market
        .bookings
        .update_booking_status(
            booking.id,
            owner,
            StatusUpdate {
                status: "accepted".to_string(),
                ..StatusUpdate::default()
            },
        )
        .await?;

    let quote = market
        .bookings
        .initiate_booking_payment(booking.id, organizer)
        .await?;
    info!(
        advance = %quote.breakdown.advance_amount,
        platform_fee = %quote.breakdown.platform_fee,
        remaining = %quote.breakdown.remaining_amount,
        "Advance quoted"
    );

    let (gateway_payment_id, signature) = providers
        .gateway
        .complete_checkout(&quote.checkout.gateway_order_id)?;
    let paid = market
        .bookings
        .complete_booking_payment(
            booking.id,
            GatewayCallback {
                gateway_order_id: quote.checkout.gateway_order_id.clone(),
                gateway_payment_id,
                gateway_signature: signature,
            },
        )
        .await?;
    info!(booking_id = %paid.id, payment_status = ?paid.payment_status, "Booking secured");

    // Tickets: the event happens today so the scan is on the event day.
    let event = EventSummary {
        id: EventId::new(),
        organizer_id: organizer,
        check_in_staff: Vec::new(),
        date: now.date_naive(),
        ticket_price: Money::new(499),
        current_attendees: 0,
        max_attendees: 100,
    };
    providers.events.add_event(event.clone());

    let purchase = TicketPurchase {
        user_id: attendee,
        event_id: event.id,
        quantity: 2,
        ticket_type: "general".to_string(),
        payment_id: None,
    };
    let PurchaseOutcome::PaymentRequired(checkout) =
        market.tickets.purchase_ticket(purchase.clone()).await?
    else {
        anyhow::bail!("paid event issued a ticket without payment");
    };

    let (gateway_payment_id, signature) = providers
        .gateway
        .complete_checkout(&checkout.gateway_order_id)?;
    market
        .payments
        .verify_payment(&PaymentVerification {
            payment_id: checkout.payment_id,
            gateway_order_id: checkout.gateway_order_id,
            gateway_payment_id,
            gateway_signature: signature,
        })
        .await?;

    let PurchaseOutcome::Issued(ticket) = market
        .tickets
        .purchase_ticket(TicketPurchase {
            payment_id: Some(checkout.payment_id),
            ..purchase
        })
        .await?
    else {
        anyhow::bail!("verified payment did not issue a ticket");
    };

    let scan = ScanRequest {
        qr_data: ticket.qr_payload.clone(),
        scanner_id: organizer,
        event_id: event.id,
    };
    let checked_in = market.tickets.scan_ticket(&scan).await?;
    info!(ticket_code = %checked_in.code, used_at = ?checked_in.used_at, "Admitted");

    if let Err(e) = market.tickets.scan_ticket(&scan).await {
        warn!(error = %e, "Second scan refused as expected");
    }

    drop(market);
    worker.await.context("notification worker panicked")?;
    info!(
        delivered = providers.notifier.delivered().len(),
        "Walkthrough finished"
    );

    Ok(())
}
