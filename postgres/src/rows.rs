//! Row decoding and error mapping shared by the stores.

use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Postgres, Row};
use uuid::Uuid;
use venue_market_core::{
    Booking, BookingId, BookingPaymentStatus, BookingStatus, EventId, EventSummary, MarketError,
    Money, OwnerResponse, Payment, PaymentId, PaymentStatus, PaymentSubject, RefundRecord, Result,
    Slot, SlotKind, Ticket, TicketCode, TicketId, TicketStatus, TimeWindow, UserId, Venue, VenueId,
};

/// `exclusion_violation`
pub const EXCLUSION_VIOLATION: &str = "23P01";

/// Map a driver error to [`MarketError::Storage`], counting it.
pub fn storage(operation: &'static str) -> impl FnOnce(sqlx::Error) -> MarketError {
    move |e| {
        tracing::error!(operation, error = %e, "Store query failed");
        metrics::counter!("market.store.errors", "operation" => operation).increment(1);
        MarketError::Storage(format!("Failed to {operation}: {e}"))
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| MarketError::Storage(format!("Bad column {column}: {e}")))
}

fn count(row: &PgRow, column: &str) -> Result<u32> {
    let value: i64 = get(row, column)?;
    u32::try_from(value)
        .map_err(|_| MarketError::Storage(format!("Column {column} out of range: {value}")))
}

fn money(row: &PgRow, column: &str) -> Result<Money> {
    let value: i64 = get(row, column)?;
    u64::try_from(value)
        .map(Money::new)
        .map_err(|_| MarketError::Storage(format!("Negative amount in {column}: {value}")))
}

/// Amounts are stored as `BIGINT`.
pub fn money_to_db(amount: Money) -> Result<i64> {
    i64::try_from(amount.units())
        .map_err(|_| MarketError::Validation(format!("amount {amount} is too large")))
}

pub fn venue(row: &PgRow) -> Result<Venue> {
    Ok(Venue {
        id: VenueId::from_uuid(get(row, "id")?),
        owner_id: UserId::from_uuid(get(row, "owner_id")?),
        name: get(row, "name")?,
        auto_approve: get(row, "auto_approve")?,
    })
}

pub fn slot(row: &PgRow) -> Result<Slot> {
    let kind: String = get(row, "kind")?;
    let booking_id: Option<Uuid> = get(row, "booking_id")?;
    Ok(Slot {
        window: TimeWindow::new(get(row, "start_time")?, get(row, "end_time")?)?,
        kind: SlotKind::parse(&kind)?,
        booking_id: booking_id.map(BookingId::from_uuid),
    })
}

pub fn booking(row: &PgRow) -> Result<Booking> {
    let status: String = get(row, "status")?;
    let payment_status: String = get(row, "payment_status")?;
    let payment_id: Option<Uuid> = get(row, "payment_id")?;

    Ok(Booking {
        id: BookingId::from_uuid(get(row, "id")?),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        venue_id: VenueId::from_uuid(get(row, "venue_id")?),
        booking_date: get(row, "booking_date")?,
        window: TimeWindow::new(get(row, "start_time")?, get(row, "end_time")?)?,
        expected_guests: count(row, "expected_guests")?,
        purpose: get(row, "purpose")?,
        total_amount: money(row, "total_amount")?,
        platform_fee: money(row, "platform_fee")?,
        status: BookingStatus::parse(&status)?,
        payment_status: BookingPaymentStatus::parse(&payment_status)?,
        rejection_reason: get(row, "rejection_reason")?,
        cancellation_reason: get(row, "cancellation_reason")?,
        owner_response: OwnerResponse {
            responded_at: get(row, "responded_at")?,
            modified_dates: get(row, "modified_dates")?,
        },
        payment_id: payment_id.map(PaymentId::from_uuid),
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub fn payment(row: &PgRow) -> Result<Payment> {
    let kind: String = get(row, "subject_kind")?;
    let status: String = get(row, "status")?;
    let failed: i64 = get(row, "failed_verifications")?;
    let consumed_by: Option<Uuid> = get(row, "consumed_by")?;
    let refund: Option<Json<RefundRecord>> = get(row, "refund")?;

    Ok(Payment {
        id: PaymentId::from_uuid(get(row, "id")?),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        subject: PaymentSubject::from_parts(&kind, get(row, "subject_id")?)?,
        amount: money(row, "amount")?,
        currency: get(row, "currency")?,
        gateway_order_id: get(row, "gateway_order_id")?,
        gateway_payment_id: get(row, "gateway_payment_id")?,
        gateway_signature: get(row, "gateway_signature")?,
        status: PaymentStatus::parse(&status)?,
        failed_verifications: u32::try_from(failed).unwrap_or(u32::MAX),
        consumed_by: consumed_by.map(TicketId::from_uuid),
        refund: refund.map(|Json(record)| record),
        created_at: get(row, "created_at")?,
        paid_at: get(row, "paid_at")?,
    })
}

pub fn ticket(row: &PgRow) -> Result<Ticket> {
    let code: String = get(row, "code")?;
    let status: String = get(row, "status")?;
    let checked_in_by: Option<Uuid> = get(row, "checked_in_by")?;
    let payment_id: Option<Uuid> = get(row, "payment_id")?;

    Ok(Ticket {
        id: TicketId::from_uuid(get(row, "id")?),
        code: TicketCode::new(code),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        event_id: EventId::from_uuid(get(row, "event_id")?),
        ticket_type: get(row, "ticket_type")?,
        quantity: count(row, "quantity")?,
        price: money(row, "price")?,
        qr_payload: get(row, "qr_payload")?,
        qr_image: get(row, "qr_image")?,
        status: TicketStatus::parse(&status)?,
        is_used: get(row, "is_used")?,
        used_at: get(row, "used_at")?,
        checked_in_by: checked_in_by.map(UserId::from_uuid),
        payment_id: payment_id.map(PaymentId::from_uuid),
        created_at: get(row, "created_at")?,
    })
}

pub fn event(row: &PgRow) -> Result<EventSummary> {
    let staff: Vec<Uuid> = get(row, "check_in_staff")?;
    Ok(EventSummary {
        id: EventId::from_uuid(get(row, "id")?),
        organizer_id: UserId::from_uuid(get(row, "organizer_id")?),
        check_in_staff: staff.into_iter().map(UserId::from_uuid).collect(),
        date: get(row, "event_date")?,
        ticket_price: money(row, "ticket_price")?,
        current_attendees: count(row, "current_attendees")?,
        max_attendees: count(row, "max_attendees")?,
    })
}
