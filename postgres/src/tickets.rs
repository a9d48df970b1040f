//! Ticket rows. Check-in and cancellation are single conditional updates.

use crate::PostgresMarketStore;
use crate::rows::{self, money_to_db, storage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use venue_market_core::{MarketError, Result, Ticket, TicketCode, TicketStatus, UserId};
use venue_market_engine::providers::TicketStore;

const CODE_CONSTRAINT: &str = "tickets_code_unique";

#[async_trait]
impl TicketStore for PostgresMarketStore {
    async fn insert(&self, ticket: &Ticket) -> Result<()> {
        let inserted = sqlx::query(
            r"
            INSERT INTO tickets (
                id, code, user_id, event_id, ticket_type, quantity, price,
                qr_payload, qr_image, status, is_used, used_at, checked_in_by,
                payment_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ",
        )
        .bind(ticket.id.as_uuid())
        .bind(ticket.code.as_str())
        .bind(ticket.user_id.as_uuid())
        .bind(ticket.event_id.as_uuid())
        .bind(&ticket.ticket_type)
        .bind(i64::from(ticket.quantity))
        .bind(money_to_db(ticket.price)?)
        .bind(&ticket.qr_payload)
        .bind(&ticket.qr_image)
        .bind(ticket.status.as_str())
        .bind(ticket.is_used)
        .bind(ticket.used_at)
        .bind(ticket.checked_in_by.map(|id| *id.as_uuid()))
        .bind(ticket.payment_id.map(|id| *id.as_uuid()))
        .bind(ticket.created_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation() && db_err.constraint() == Some(CODE_CONSTRAINT) =>
            {
                Err(MarketError::DuplicateTicketCode)
            }
            Err(e) => Err(storage("insert ticket")(e)),
        }
    }

    async fn get_by_code(&self, code: &TicketCode) -> Result<Option<Ticket>> {
        sqlx::query("SELECT * FROM tickets WHERE code = $1")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("load ticket"))?
            .as_ref()
            .map(rows::ticket)
            .transpose()
    }

    async fn claim(
        &self,
        code: &TicketCode,
        scanner: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<Ticket>> {
        sqlx::query(
            r"
            UPDATE tickets
            SET is_used = true, status = $4, used_at = $3, checked_in_by = $2
            WHERE code = $1 AND is_used = false AND status = $5
            RETURNING *
            ",
        )
        .bind(code.as_str())
        .bind(scanner.as_uuid())
        .bind(at)
        .bind(TicketStatus::Used.as_str())
        .bind(TicketStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("claim ticket"))?
        .as_ref()
        .map(rows::ticket)
        .transpose()
    }

    async fn cancel(&self, code: &TicketCode) -> Result<Option<Ticket>> {
        sqlx::query(
            r"
            UPDATE tickets
            SET status = $2
            WHERE code = $1 AND is_used = false AND status = $3
            RETURNING *
            ",
        )
        .bind(code.as_str())
        .bind(TicketStatus::Cancelled.as_str())
        .bind(TicketStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("cancel ticket"))?
        .as_ref()
        .map(rows::ticket)
        .transpose()
    }
}
