//! Booking rows and their compare-and-set transitions.

use crate::PostgresMarketStore;
use crate::rows::{self, money_to_db, storage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use venue_market_core::{
    Booking, BookingId, BookingPaymentStatus, BookingStatus, BookingTransition, Money, PaymentId,
    Result,
};
use venue_market_engine::providers::BookingStore;

#[async_trait]
impl BookingStore for PostgresMarketStore {
    async fn insert(&self, booking: &Booking) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO bookings (
                id, user_id, venue_id, booking_date, start_time, end_time,
                expected_guests, purpose, total_amount, platform_fee,
                status, payment_status, rejection_reason, cancellation_reason,
                responded_at, modified_dates, payment_id, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
            ",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.user_id.as_uuid())
        .bind(booking.venue_id.as_uuid())
        .bind(booking.booking_date)
        .bind(booking.window.start)
        .bind(booking.window.end)
        .bind(i64::from(booking.expected_guests))
        .bind(&booking.purpose)
        .bind(money_to_db(booking.total_amount)?)
        .bind(money_to_db(booking.platform_fee)?)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(&booking.rejection_reason)
        .bind(&booking.cancellation_reason)
        .bind(booking.owner_response.responded_at)
        .bind(&booking.owner_response.modified_dates)
        .bind(booking.payment_id.map(|id| *id.as_uuid()))
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage("insert booking"))?;
        Ok(())
    }

    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        sqlx::query("SELECT * FROM bookings WHERE id = $1")
            .bind(booking_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("load booking"))?
            .as_ref()
            .map(rows::booking)
            .transpose()
    }

    async fn transition(
        &self,
        booking_id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
        patch: &BookingTransition,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>> {
        sqlx::query(
            r"
            UPDATE bookings
            SET status = $3,
                updated_at = $4,
                responded_at = COALESCE($5, responded_at),
                modified_dates = CASE
                    WHEN cardinality($6::date[]) > 0 THEN $6::date[]
                    ELSE modified_dates
                END,
                rejection_reason = COALESCE($7, rejection_reason),
                cancellation_reason = COALESCE($8, cancellation_reason)
            WHERE id = $1 AND status = $2
            RETURNING *
            ",
        )
        .bind(booking_id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(now)
        .bind(patch.responded_at)
        .bind(&patch.modified_dates)
        .bind(&patch.rejection_reason)
        .bind(&patch.cancellation_reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("transition booking"))?
        .as_ref()
        .map(rows::booking)
        .transpose()
    }

    async fn begin_advance_payment(
        &self,
        booking_id: BookingId,
        platform_fee: Money,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>> {
        sqlx::query(
            r"
            UPDATE bookings
            SET platform_fee = $2, payment_status = $3, updated_at = $4
            WHERE id = $1 AND status = $5 AND payment_status <> $6
            RETURNING *
            ",
        )
        .bind(booking_id.as_uuid())
        .bind(money_to_db(platform_fee)?)
        .bind(BookingPaymentStatus::Pending.as_str())
        .bind(now)
        .bind(BookingStatus::Accepted.as_str())
        .bind(BookingPaymentStatus::Paid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("begin advance payment"))?
        .as_ref()
        .map(rows::booking)
        .transpose()
    }

    async fn mark_advance_paid(
        &self,
        booking_id: BookingId,
        payment_id: PaymentId,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>> {
        sqlx::query(
            r"
            UPDATE bookings
            SET payment_status = $3, payment_id = $2, updated_at = $4
            WHERE id = $1 AND status = $5 AND payment_status <> $3
            RETURNING *
            ",
        )
        .bind(booking_id.as_uuid())
        .bind(payment_id.as_uuid())
        .bind(BookingPaymentStatus::Paid.as_str())
        .bind(now)
        .bind(BookingStatus::Accepted.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("mark advance paid"))?
        .as_ref()
        .map(rows::booking)
        .transpose()
    }
}
