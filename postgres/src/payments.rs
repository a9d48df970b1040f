//! Payment rows. `paid` and `failed` are only ever reached from `pending`.

use crate::PostgresMarketStore;
use crate::rows::{self, money_to_db, storage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use venue_market_core::{
    MarketError, Payment, PaymentId, PaymentStatus, PaymentSubject, RefundRecord, Result, TicketId,
};
use venue_market_engine::providers::PaymentStore;

#[async_trait]
impl PaymentStore for PostgresMarketStore {
    async fn insert(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO payments (
                id, user_id, subject_kind, subject_id, amount, currency,
                gateway_order_id, gateway_payment_id, gateway_signature, status,
                failed_verifications, consumed_by, refund, created_at, paid_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.user_id.as_uuid())
        .bind(payment.subject.kind())
        .bind(payment.subject.reference_id())
        .bind(money_to_db(payment.amount)?)
        .bind(&payment.currency)
        .bind(&payment.gateway_order_id)
        .bind(&payment.gateway_payment_id)
        .bind(&payment.gateway_signature)
        .bind(payment.status.as_str())
        .bind(i64::from(payment.failed_verifications))
        .bind(payment.consumed_by.map(|id| *id.as_uuid()))
        .bind(payment.refund.as_ref().map(Json))
        .bind(payment.created_at)
        .bind(payment.paid_at)
        .execute(&self.pool)
        .await
        .map_err(storage("insert payment"))?;
        Ok(())
    }

    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        sqlx::query("SELECT * FROM payments WHERE id = $1")
            .bind(payment_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("load payment"))?
            .as_ref()
            .map(rows::payment)
            .transpose()
    }

    async fn find_pending(
        &self,
        subject: PaymentSubject,
        gateway_order_id: &str,
    ) -> Result<Option<Payment>> {
        sqlx::query(
            r"
            SELECT * FROM payments
            WHERE subject_kind = $1 AND subject_id = $2
              AND gateway_order_id = $3 AND status = $4
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(subject.kind())
        .bind(subject.reference_id())
        .bind(gateway_order_id)
        .bind(PaymentStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("find pending payment"))?
        .as_ref()
        .map(rows::payment)
        .transpose()
    }

    async fn mark_paid(
        &self,
        payment_id: PaymentId,
        gateway_payment_id: &str,
        gateway_signature: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Payment>> {
        sqlx::query(
            r"
            UPDATE payments
            SET status = $2, gateway_payment_id = $3, gateway_signature = $4, paid_at = $5
            WHERE id = $1 AND status = $6
            RETURNING *
            ",
        )
        .bind(payment_id.as_uuid())
        .bind(PaymentStatus::Paid.as_str())
        .bind(gateway_payment_id)
        .bind(gateway_signature)
        .bind(paid_at)
        .bind(PaymentStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("mark payment paid"))?
        .as_ref()
        .map(rows::payment)
        .transpose()
    }

    async fn mark_failed(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        sqlx::query("UPDATE payments SET status = $2 WHERE id = $1 AND status = $3 RETURNING *")
            .bind(payment_id.as_uuid())
            .bind(PaymentStatus::Failed.as_str())
            .bind(PaymentStatus::Pending.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("mark payment failed"))?
            .as_ref()
            .map(rows::payment)
            .transpose()
    }

    async fn record_failed_verification(&self, payment_id: PaymentId) -> Result<()> {
        sqlx::query(
            "UPDATE payments SET failed_verifications = failed_verifications + 1 WHERE id = $1",
        )
        .bind(payment_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(storage("record failed verification"))?;
        Ok(())
    }

    async fn consume(&self, payment_id: PaymentId, ticket_id: TicketId) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE payments
            SET consumed_by = $2
            WHERE id = $1 AND status = $3 AND consumed_by IS NULL
            ",
        )
        .bind(payment_id.as_uuid())
        .bind(ticket_id.as_uuid())
        .bind(PaymentStatus::Paid.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage("consume payment"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_consumption(&self, payment_id: PaymentId, ticket_id: TicketId) -> Result<()> {
        sqlx::query("UPDATE payments SET consumed_by = NULL WHERE id = $1 AND consumed_by = $2")
            .bind(payment_id.as_uuid())
            .bind(ticket_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage("release payment"))?;
        Ok(())
    }

    async fn record_refund(&self, payment_id: PaymentId, refund: &RefundRecord) -> Result<()> {
        let result = sqlx::query("UPDATE payments SET refund = $2 WHERE id = $1")
            .bind(payment_id.as_uuid())
            .bind(Json(refund))
            .execute(&self.pool)
            .await
            .map_err(storage("record refund"))?;

        if result.rows_affected() == 0 {
            return Err(MarketError::not_found("payment", payment_id));
        }
        Ok(())
    }
}
