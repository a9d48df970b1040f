//! Venue lookup and the slot ledger.

use crate::PostgresMarketStore;
use crate::rows::{self, EXCLUSION_VIOLATION, storage};
use async_trait::async_trait;
use chrono::NaiveDate;
use venue_market_core::{BookingId, DayAvailability, Result, Slot, SlotKind, Venue, VenueId};
use venue_market_engine::providers::VenueStore;

#[async_trait]
impl VenueStore for PostgresMarketStore {
    async fn get_venue(&self, venue_id: VenueId) -> Result<Option<Venue>> {
        sqlx::query("SELECT id, owner_id, name, auto_approve FROM venues WHERE id = $1")
            .bind(venue_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("load venue"))?
            .as_ref()
            .map(rows::venue)
            .transpose()
    }

    async fn day_availability(&self, venue_id: VenueId, date: NaiveDate) -> Result<DayAvailability> {
        let slots = sqlx::query(
            r"
            SELECT start_time, end_time, kind, booking_id
            FROM venue_slots
            WHERE venue_id = $1 AND slot_date = $2
            ORDER BY start_time
            ",
        )
        .bind(venue_id.as_uuid())
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(storage("load venue day"))?
        .iter()
        .map(rows::slot)
        .collect::<Result<Vec<_>>>()?;

        Ok(DayAvailability {
            date: Some(date),
            slots,
        })
    }

    async fn try_reserve_slot(&self, venue_id: VenueId, date: NaiveDate, slot: Slot) -> Result<bool> {
        let inserted = sqlx::query(
            r"
            INSERT INTO venue_slots (venue_id, slot_date, start_time, end_time, kind, booking_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(venue_id.as_uuid())
        .bind(date)
        .bind(slot.window.start)
        .bind(slot.window.end)
        .bind(slot.kind.as_str())
        .bind(slot.booking_id.map(|id| *id.as_uuid()))
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(EXCLUSION_VIOLATION) =>
            {
                tracing::debug!(venue_id = %venue_id, date = %date, "Slot overlaps an existing one");
                Ok(false)
            }
            Err(e) => Err(storage("reserve slot")(e)),
        }
    }

    async fn release_booking_slot(
        &self,
        venue_id: VenueId,
        date: NaiveDate,
        booking_id: BookingId,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            DELETE FROM venue_slots
            WHERE venue_id = $1 AND slot_date = $2 AND booking_id = $3 AND kind = $4
            ",
        )
        .bind(venue_id.as_uuid())
        .bind(date)
        .bind(booking_id.as_uuid())
        .bind(SlotKind::Booked.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage("release slot"))?;

        Ok(result.rows_affected() > 0)
    }
}
