//! `PostgreSQL` stores for the venue marketplace engine.
//!
//! [`PostgresMarketStore`] implements every store trait the engine needs
//! (venues and slots, bookings, payments, tickets, event counters) over one
//! connection pool. Each invariant-guarding method is a single statement:
//!
//! - slot exclusivity: `EXCLUDE USING gist` on `(venue_id, tsrange)`, so an
//!   overlapping insert fails with `23P01` and reports a conflict
//! - capacity: `UPDATE events ... WHERE current_attendees + $n <= max_attendees`
//! - single check-in: `UPDATE tickets ... WHERE is_used = false`
//! - status changes: `UPDATE ... WHERE status = $expected RETURNING *`
//!
//! Queries are checked at runtime, so the crate builds without a database.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use venue_market_engine::{HttpPaymentGateway, MarketConfig, Marketplace};
//! use venue_market_engine::providers::ConsoleNotifier;
//! use venue_market_postgres::PostgresMarketStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MarketConfig::from_env();
//! let store = PostgresMarketStore::connect(&config.database).await?;
//! store.migrate().await?;
//!
//! let env = store.environment(
//!     Arc::new(HttpPaymentGateway::new(&config.payment)?),
//!     Arc::new(ConsoleNotifier::new()),
//! );
//! let (market, _worker) = Marketplace::new(env, &config);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bookings;
mod events;
mod payments;
mod rows;
mod tickets;
mod venues;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use venue_market_core::{EventSummary, MarketError, Result, SystemClock, Venue};
use venue_market_engine::MarketEnvironment;
use venue_market_engine::config::DatabaseConfig;
use venue_market_engine::providers::{Notifier, PaymentGateway};

/// All marketplace stores over one `PostgreSQL` pool.
#[derive(Clone, Debug)]
pub struct PostgresMarketStore {
    pool: PgPool,
}

impl PostgresMarketStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Storage`] if the database cannot be reached.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| MarketError::Storage(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Storage`] if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MarketError::Storage(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Engine environment backed by this store and the wall clock.
    #[must_use]
    pub fn environment(
        &self,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> MarketEnvironment {
        let store = Arc::new(self.clone());
        MarketEnvironment {
            venues: store.clone(),
            bookings: store.clone(),
            payments: store.clone(),
            tickets: store.clone(),
            events: store,
            gateway,
            notifier,
            clock: Arc::new(SystemClock),
        }
    }

    /// Insert or refresh a venue mirrored from the venue catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Storage`] if the write fails.
    pub async fn upsert_venue(&self, venue: &Venue) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO venues (id, owner_id, name, auto_approve)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET owner_id = EXCLUDED.owner_id,
                name = EXCLUDED.name,
                auto_approve = EXCLUDED.auto_approve
            ",
        )
        .bind(venue.id.as_uuid())
        .bind(venue.owner_id.as_uuid())
        .bind(&venue.name)
        .bind(venue.auto_approve)
        .execute(&self.pool)
        .await
        .map_err(rows::storage("upsert venue"))?;
        Ok(())
    }

    /// Insert or refresh an event mirrored from the event catalogue.
    ///
    /// The attendee counter is only written on insert; an existing counter
    /// belongs to ticket issuance and is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Storage`] if the write fails, or
    /// [`MarketError::Validation`] if an amount does not fit the column.
    pub async fn upsert_event(&self, event: &EventSummary) -> Result<()> {
        let staff: Vec<uuid::Uuid> = event.check_in_staff.iter().map(|u| *u.as_uuid()).collect();
        sqlx::query(
            r"
            INSERT INTO events
                (id, organizer_id, check_in_staff, event_date, ticket_price,
                 current_attendees, max_attendees)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET organizer_id = EXCLUDED.organizer_id,
                check_in_staff = EXCLUDED.check_in_staff,
                event_date = EXCLUDED.event_date,
                ticket_price = EXCLUDED.ticket_price,
                max_attendees = EXCLUDED.max_attendees
            ",
        )
        .bind(event.id.as_uuid())
        .bind(event.organizer_id.as_uuid())
        .bind(staff)
        .bind(event.date)
        .bind(rows::money_to_db(event.ticket_price)?)
        .bind(i64::from(event.current_attendees))
        .bind(i64::from(event.max_attendees))
        .execute(&self.pool)
        .await
        .map_err(rows::storage("upsert event"))?;
        Ok(())
    }
}
