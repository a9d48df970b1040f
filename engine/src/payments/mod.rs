//! Payment orchestration for booking advances and ticket purchases.
//!
//! Flow: [`PaymentOrchestrator::initiate_payment`] creates a gateway order and
//! a `pending` payment; the client pays out-of-band; the gateway callback is
//! checked by [`PaymentOrchestrator::verify_payment`], which recomputes the
//! signature and flips the payment to `paid` exactly once.
//!
//! Gateway calls are made once per request. A timeout is reported as
//! [`MarketError::GatewayTimeout`] and never retried here.

mod signature;

pub use signature::GatewaySigner;

use crate::providers::{PaymentGateway, PaymentStore};
use std::sync::Arc;
use tracing::{error, info, warn};
use venue_market_core::{
    Clock, MarketError, Payment, PaymentCheckout, PaymentId, PaymentInitiation, PaymentStatus,
    PaymentSubject, PaymentVerification, RefundRecord, RefundStatus, Result, TicketId,
};

/// Creates gateway orders, verifies callbacks and executes refunds.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    signer: GatewaySigner,
    clock: Arc<dyn Clock>,
    currency: String,
}

impl PaymentOrchestrator {
    /// Create an orchestrator charging in `currency`.
    #[must_use]
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        signer: GatewaySigner,
        clock: Arc<dyn Clock>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            payments,
            gateway,
            signer,
            clock,
            currency: currency.into(),
        }
    }

    /// Create a gateway order and a `pending` payment for `request.subject`.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Validation`] for a zero amount
    /// - [`MarketError::GatewayTimeout`] / [`MarketError::GatewayUnavailable`]
    ///   if order creation fails (nothing is persisted)
    pub async fn initiate_payment(&self, request: PaymentInitiation) -> Result<PaymentCheckout> {
        if request.amount.is_zero() {
            return Err(MarketError::Validation(
                "payment amount must be positive".to_string(),
            ));
        }

        let payment_id = PaymentId::new();
        let receipt = format!("rcpt_{}", payment_id.as_uuid().simple());
        let order = self
            .gateway
            .create_order(request.amount, &self.currency, &receipt)
            .await
            .inspect_err(|e| {
                warn!(
                    payment_id = %payment_id,
                    subject = request.subject.kind(),
                    error = %e,
                    "Gateway order creation failed"
                );
            })?;

        let payment = Payment {
            id: payment_id,
            user_id: request.user_id,
            subject: request.subject,
            amount: request.amount,
            currency: order.currency.clone(),
            gateway_order_id: order.order_id.clone(),
            gateway_payment_id: None,
            gateway_signature: None,
            status: PaymentStatus::Pending,
            failed_verifications: 0,
            consumed_by: None,
            refund: None,
            created_at: self.clock.now(),
            paid_at: None,
        };
        self.payments.insert(&payment).await?;

        metrics::counter!("market.payments.initiated", "subject" => request.subject.kind())
            .increment(1);
        info!(
            payment_id = %payment.id,
            user_id = %payment.user_id,
            subject = payment.subject.kind(),
            reference_id = %payment.subject.reference_id(),
            amount = %payment.amount,
            gateway_order_id = %payment.gateway_order_id,
            "Payment initiated"
        );

        Ok(PaymentCheckout {
            payment_id: payment.id,
            key_id: self.gateway.key_id().to_string(),
            gateway_order_id: order.order_id,
            amount: payment.amount,
            currency: order.currency,
        })
    }

    /// Verify a gateway callback and mark the payment `paid`.
    ///
    /// The signature is recomputed over the order id stored at initiation,
    /// not the one the client sent. Verifying an already-paid payment with a
    /// valid signature returns it unchanged. A mismatch leaves the payment
    /// `pending` and counts the attempt.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the payment does not exist
    /// - [`MarketError::SignatureMismatch`] if the signature does not verify
    /// - [`MarketError::PaymentNotPending`] if the payment already failed
    pub async fn verify_payment(&self, verification: &PaymentVerification) -> Result<Payment> {
        let payment = self.get_payment(verification.payment_id).await?;

        if payment.status == PaymentStatus::Failed {
            return Err(MarketError::PaymentNotPending);
        }

        let order_matches = constant_time_eq::constant_time_eq(
            payment.gateway_order_id.as_bytes(),
            verification.gateway_order_id.as_bytes(),
        );
        let signature_valid = self.signer.verify(
            &payment.gateway_order_id,
            &verification.gateway_payment_id,
            &verification.gateway_signature,
        )?;

        if !(order_matches && signature_valid) {
            if payment.status == PaymentStatus::Pending {
                self.payments.record_failed_verification(payment.id).await?;
            }
            metrics::counter!("market.payments.signature_mismatch").increment(1);
            warn!(
                payment_id = %payment.id,
                user_id = %payment.user_id,
                gateway_order_id = %verification.gateway_order_id,
                "Payment signature mismatch"
            );
            return Err(MarketError::SignatureMismatch);
        }

        if payment.status == PaymentStatus::Paid {
            return Ok(payment);
        }

        let updated = self
            .payments
            .mark_paid(
                payment.id,
                &verification.gateway_payment_id,
                &verification.gateway_signature,
                self.clock.now(),
            )
            .await?;

        match updated {
            Some(paid) => {
                metrics::counter!("market.payments.verified", "subject" => paid.subject.kind())
                    .increment(1);
                info!(
                    payment_id = %paid.id,
                    gateway_payment_id = %verification.gateway_payment_id,
                    amount = %paid.amount,
                    "Payment verified"
                );
                Ok(paid)
            }
            // A concurrent verification got there first.
            None => {
                let current = self.get_payment(payment.id).await?;
                if current.status == PaymentStatus::Paid {
                    Ok(current)
                } else {
                    Err(MarketError::PaymentNotPending)
                }
            }
        }
    }

    /// Record a gateway-reported failure for a pending payment.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the payment does not exist
    /// - [`MarketError::PaymentNotPending`] if it is already paid or failed
    pub async fn mark_failed(&self, payment_id: PaymentId) -> Result<Payment> {
        match self.payments.mark_failed(payment_id).await? {
            Some(failed) => {
                info!(payment_id = %payment_id, "Payment marked failed");
                Ok(failed)
            }
            None => {
                self.get_payment(payment_id).await?;
                Err(MarketError::PaymentNotPending)
            }
        }
    }

    /// Refund a paid payment in full.
    ///
    /// The gateway is called once. Its outcome (processed or failed) is
    /// persisted on the payment and returned; a gateway failure is not an
    /// error for the caller, only for follow-up. An already-processed refund
    /// is returned without calling the gateway again.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the payment does not exist
    /// - [`MarketError::Validation`] if the payment was never paid
    /// - storage errors while persisting the outcome
    pub async fn refund_payment(&self, payment_id: PaymentId, reason: &str) -> Result<RefundRecord> {
        let payment = self.get_payment(payment_id).await?;

        if payment.status != PaymentStatus::Paid {
            return Err(MarketError::Validation(format!(
                "payment {payment_id} is {} and cannot be refunded",
                payment.status
            )));
        }
        if let Some(existing) = payment
            .refund
            .as_ref()
            .filter(|r| r.status == RefundStatus::Processed)
        {
            return Ok(existing.clone());
        }

        let gateway_payment_id = payment.gateway_payment_id.as_deref().ok_or_else(|| {
            MarketError::Internal(format!("paid payment {payment_id} has no gateway payment id"))
        })?;

        let requested_at = self.clock.now();
        let record = match self.gateway.refund(gateway_payment_id, payment.amount).await {
            Ok(refund) => {
                metrics::counter!("market.refunds.processed").increment(1);
                info!(
                    payment_id = %payment_id,
                    refund_id = %refund.refund_id,
                    amount = %refund.amount,
                    "Refund processed"
                );
                RefundRecord {
                    status: RefundStatus::Processed,
                    amount: refund.amount,
                    reason: reason.to_string(),
                    gateway_refund_id: Some(refund.refund_id),
                    failure: None,
                    requested_at,
                }
            }
            Err(e) => {
                metrics::counter!("market.refunds.failed").increment(1);
                error!(
                    payment_id = %payment_id,
                    amount = %payment.amount,
                    error = %e,
                    "Refund failed, needs manual follow-up"
                );
                RefundRecord {
                    status: RefundStatus::Failed,
                    amount: payment.amount,
                    reason: reason.to_string(),
                    gateway_refund_id: None,
                    failure: Some(e.to_string()),
                    requested_at,
                }
            }
        };

        self.payments.record_refund(payment_id, &record).await?;
        Ok(record)
    }

    /// Load a payment.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if it does not exist.
    pub async fn get_payment(&self, payment_id: PaymentId) -> Result<Payment> {
        self.payments
            .get(payment_id)
            .await?
            .ok_or_else(|| MarketError::not_found("payment", payment_id))
    }

    /// The `pending` payment for `subject` created for `gateway_order_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if there is none.
    pub async fn find_pending(
        &self,
        subject: PaymentSubject,
        gateway_order_id: &str,
    ) -> Result<Payment> {
        self.payments
            .find_pending(subject, gateway_order_id)
            .await?
            .ok_or_else(|| MarketError::not_found("pending payment", gateway_order_id))
    }

    /// Bind a paid payment to the ticket it funds.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PaymentConsumed`] if it already funds a ticket.
    pub async fn consume_for_ticket(&self, payment_id: PaymentId, ticket_id: TicketId) -> Result<()> {
        if self.payments.consume(payment_id, ticket_id).await? {
            Ok(())
        } else {
            Err(MarketError::PaymentConsumed)
        }
    }

    /// Undo [`consume_for_ticket`](Self::consume_for_ticket) after a failed issuance.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    pub async fn release_for_ticket(&self, payment_id: PaymentId, ticket_id: TicketId) -> Result<()> {
        self.payments.release_consumption(payment_id, ticket_id).await
    }
}

impl std::fmt::Debug for PaymentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentOrchestrator")
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{FixedClock, MockPaymentGateway, MockPaymentStore};
    use venue_market_core::{BookingId, Money, UserId};

    const SECRET: &str = "test-secret";

    struct Fixture {
        orchestrator: PaymentOrchestrator,
        gateway: MockPaymentGateway,
        store: MockPaymentStore,
    }

    fn fixture() -> Fixture {
        let gateway = MockPaymentGateway::new("rzp_test", SECRET);
        let store = MockPaymentStore::new();
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(gateway.clone()),
            GatewaySigner::new(SECRET),
            Arc::new(FixedClock::default()),
            "INR",
        );
        Fixture {
            orchestrator,
            gateway,
            store,
        }
    }

    fn advance(amount: u64) -> PaymentInitiation {
        PaymentInitiation {
            user_id: UserId::new(),
            subject: PaymentSubject::BookingAdvance {
                booking_id: BookingId::new(),
            },
            amount: Money::new(amount),
        }
    }

    async fn paid_payment(f: &Fixture) -> Payment {
        let checkout = f.orchestrator.initiate_payment(advance(1000)).await.unwrap();
        let (pay_id, signature) = f.gateway.complete_checkout(&checkout.gateway_order_id).unwrap();
        f.orchestrator
            .verify_payment(&PaymentVerification {
                payment_id: checkout.payment_id,
                gateway_order_id: checkout.gateway_order_id,
                gateway_payment_id: pay_id,
                gateway_signature: signature,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn initiate_returns_checkout_and_persists_pending() {
        let f = fixture();
        let checkout = f.orchestrator.initiate_payment(advance(1000)).await.unwrap();

        assert_eq!(checkout.key_id, "rzp_test");
        assert_eq!(checkout.currency, "INR");
        assert_eq!(checkout.amount, Money::new(1000));

        let stored = f.orchestrator.get_payment(checkout.payment_id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert_eq!(stored.gateway_order_id, checkout.gateway_order_id);
    }

    #[tokio::test]
    async fn zero_amount_is_rejected() {
        let f = fixture();
        let err = f.orchestrator.initiate_payment(advance(0)).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[tokio::test]
    async fn gateway_timeout_persists_nothing() {
        let f = fixture();
        f.gateway.fail_orders_with(Some(MarketError::GatewayTimeout));

        let err = f.orchestrator.initiate_payment(advance(1000)).await.unwrap_err();

        assert_eq!(err, MarketError::GatewayTimeout);
        assert!(f.store.all().is_empty());
    }

    #[tokio::test]
    async fn valid_signature_marks_paid_and_is_idempotent() {
        let f = fixture();
        let checkout = f.orchestrator.initiate_payment(advance(1000)).await.unwrap();
        let (pay_id, signature) = f.gateway.complete_checkout(&checkout.gateway_order_id).unwrap();
        let verification = PaymentVerification {
            payment_id: checkout.payment_id,
            gateway_order_id: checkout.gateway_order_id,
            gateway_payment_id: pay_id,
            gateway_signature: signature,
        };

        let first = f.orchestrator.verify_payment(&verification).await.unwrap();
        let second = f.orchestrator.verify_payment(&verification).await.unwrap();

        assert_eq!(first.status, PaymentStatus::Paid);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn tampered_signature_leaves_payment_pending() {
        let f = fixture();
        let checkout = f.orchestrator.initiate_payment(advance(1000)).await.unwrap();
        let (pay_id, mut signature) = f.gateway.complete_checkout(&checkout.gateway_order_id).unwrap();
        signature.replace_range(0..1, if signature.starts_with('0') { "1" } else { "0" });

        let err = f
            .orchestrator
            .verify_payment(&PaymentVerification {
                payment_id: checkout.payment_id,
                gateway_order_id: checkout.gateway_order_id,
                gateway_payment_id: pay_id,
                gateway_signature: signature,
            })
            .await
            .unwrap_err();

        assert_eq!(err, MarketError::SignatureMismatch);
        let stored = f.orchestrator.get_payment(checkout.payment_id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert_eq!(stored.failed_verifications, 1);
    }

    #[tokio::test]
    async fn signature_for_another_order_is_rejected() {
        let f = fixture();
        let mine = f.orchestrator.initiate_payment(advance(1000)).await.unwrap();
        let other = f.orchestrator.initiate_payment(advance(5)).await.unwrap();
        let (pay_id, signature) = f.gateway.complete_checkout(&other.gateway_order_id).unwrap();

        let err = f
            .orchestrator
            .verify_payment(&PaymentVerification {
                payment_id: mine.payment_id,
                gateway_order_id: other.gateway_order_id,
                gateway_payment_id: pay_id,
                gateway_signature: signature,
            })
            .await
            .unwrap_err();

        assert_eq!(err, MarketError::SignatureMismatch);
    }

    #[tokio::test]
    async fn failed_payment_cannot_be_verified() {
        let f = fixture();
        let checkout = f.orchestrator.initiate_payment(advance(1000)).await.unwrap();
        f.orchestrator.mark_failed(checkout.payment_id).await.unwrap();
        let (pay_id, signature) = f.gateway.complete_checkout(&checkout.gateway_order_id).unwrap();

        let err = f
            .orchestrator
            .verify_payment(&PaymentVerification {
                payment_id: checkout.payment_id,
                gateway_order_id: checkout.gateway_order_id,
                gateway_payment_id: pay_id,
                gateway_signature: signature,
            })
            .await
            .unwrap_err();

        assert_eq!(err, MarketError::PaymentNotPending);
        assert_eq!(
            f.orchestrator.mark_failed(checkout.payment_id).await.unwrap_err(),
            MarketError::PaymentNotPending
        );
    }

    #[tokio::test]
    async fn refund_is_recorded_once() {
        let f = fixture();
        let paid = paid_payment(&f).await;

        let first = f.orchestrator.refund_payment(paid.id, "cancelled").await.unwrap();
        let second = f.orchestrator.refund_payment(paid.id, "cancelled").await.unwrap();

        assert_eq!(first.status, RefundStatus::Processed);
        assert_eq!(first, second);
        assert_eq!(f.gateway.refunds().len(), 1);
    }

    #[tokio::test]
    async fn failed_refund_is_persisted_not_raised() {
        let f = fixture();
        let paid = paid_payment(&f).await;
        f.gateway
            .fail_refunds_with(Some(MarketError::GatewayUnavailable("503".to_string())));

        let record = f.orchestrator.refund_payment(paid.id, "cancelled").await.unwrap();

        assert_eq!(record.status, RefundStatus::Failed);
        assert!(record.failure.is_some());
        let stored = f.orchestrator.get_payment(paid.id).await.unwrap();
        assert_eq!(stored.refund, Some(record));
    }

    #[tokio::test]
    async fn unpaid_payment_cannot_be_refunded() {
        let f = fixture();
        let checkout = f.orchestrator.initiate_payment(advance(1000)).await.unwrap();
        let err = f
            .orchestrator
            .refund_payment(checkout.payment_id, "cancelled")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[tokio::test]
    async fn payment_funds_one_ticket() {
        let f = fixture();
        let paid = paid_payment(&f).await;
        let first = TicketId::new();

        f.orchestrator.consume_for_ticket(paid.id, first).await.unwrap();
        assert_eq!(
            f.orchestrator.consume_for_ticket(paid.id, TicketId::new()).await.unwrap_err(),
            MarketError::PaymentConsumed
        );

        f.orchestrator.release_for_ticket(paid.id, first).await.unwrap();
        f.orchestrator.consume_for_ticket(paid.id, TicketId::new()).await.unwrap();
    }
}
