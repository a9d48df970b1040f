//! Payment store trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use venue_market_core::{Payment, PaymentId, PaymentSubject, RefundRecord, Result, TicketId};

/// Persistence for payments.
///
/// `paid` and `failed` are terminal: `mark_paid` and `mark_failed` only
/// touch rows that are still `pending`.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persist a new `pending` payment.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn insert(&self, payment: &Payment) -> Result<()>;

    /// Load a payment.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>>;

    /// The `pending` payment for `subject` created for `gateway_order_id`.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn find_pending(
        &self,
        subject: PaymentSubject,
        gateway_order_id: &str,
    ) -> Result<Option<Payment>>;

    /// Set `paid` with the verified gateway ids, only if still `pending`.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn mark_paid(
        &self,
        payment_id: PaymentId,
        gateway_payment_id: &str,
        gateway_signature: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Payment>>;

    /// Set `failed`, only if still `pending`.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn mark_failed(&self, payment_id: PaymentId) -> Result<Option<Payment>>;

    /// Count a rejected verification attempt without changing status.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn record_failed_verification(&self, payment_id: PaymentId) -> Result<()>;

    /// Link a `paid` payment to the ticket it funds, only if unlinked.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn consume(&self, payment_id: PaymentId, ticket_id: TicketId) -> Result<bool>;

    /// Undo [`PaymentStore::consume`] for `ticket_id` (issuance compensation).
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn release_consumption(&self, payment_id: PaymentId, ticket_id: TicketId) -> Result<()>;

    /// Persist a refund attempt.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn record_refund(&self, payment_id: PaymentId, refund: &RefundRecord) -> Result<()>;
}
