//! Ticket store trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use venue_market_core::{Result, Ticket, TicketCode, UserId};

/// Persistence for tickets.
///
/// # Security Requirements
///
/// 1. **Unique codes**: `insert` MUST reject a duplicate public code with
///    `MarketError::DuplicateTicketCode`
/// 2. **Single check-in**: `claim` MUST set `is_used` only where it is still
///    false (`UPDATE ... WHERE is_used = false`); zero rows is not a success
/// 3. **Terminal states**: `cancel` only touches active, unused tickets
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Persist a new ticket.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTicketCode` on code collision, or a storage error.
    async fn insert(&self, ticket: &Ticket) -> Result<()>;

    /// Load a ticket by its public code.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn get_by_code(&self, code: &TicketCode) -> Result<Option<Ticket>>;

    /// Atomically check the ticket in.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ticket))`: this call won the claim
    /// - `Ok(None)`: ticket missing, already used, or cancelled
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn claim(
        &self,
        code: &TicketCode,
        scanner: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<Ticket>>;

    /// Atomically cancel an active, unused ticket.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn cancel(&self, code: &TicketCode) -> Result<Option<Ticket>>;
}
