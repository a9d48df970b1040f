//! Event attendee counters.

use crate::PostgresMarketStore;
use crate::rows::{self, storage};
use async_trait::async_trait;
use venue_market_core::{EventId, EventSummary, Result};
use venue_market_engine::providers::EventDirectory;

#[async_trait]
impl EventDirectory for PostgresMarketStore {
    async fn get_event(&self, event_id: EventId) -> Result<Option<EventSummary>> {
        sqlx::query("SELECT * FROM events WHERE id = $1")
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("load event"))?
            .as_ref()
            .map(rows::event)
            .transpose()
    }

    async fn try_reserve_capacity(&self, event_id: EventId, n: u32) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE events
            SET current_attendees = current_attendees + $2
            WHERE id = $1 AND current_attendees + $2 <= max_attendees
            ",
        )
        .bind(event_id.as_uuid())
        .bind(i64::from(n))
        .execute(&self.pool)
        .await
        .map_err(storage("reserve capacity"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_capacity(&self, event_id: EventId, n: u32) -> Result<()> {
        sqlx::query(
            r"
            UPDATE events
            SET current_attendees = GREATEST(current_attendees - $2, 0)
            WHERE id = $1
            ",
        )
        .bind(event_id.as_uuid())
        .bind(i64::from(n))
        .execute(&self.pool)
        .await
        .map_err(storage("release capacity"))?;
        Ok(())
    }
}
