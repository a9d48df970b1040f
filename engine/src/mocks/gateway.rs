//! Mock payment gateway.

use super::lock;
use crate::payments::GatewaySigner;
use crate::providers::{GatewayOrder, GatewayRefund, PaymentGateway};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use venue_market_core::{MarketError, Money, Result};

/// Gateway that creates orders locally and can sign checkout callbacks the
/// way the real processor would.
///
/// Failures are injected per operation with [`fail_orders_with`] and
/// [`fail_refunds_with`].
///
/// [`fail_orders_with`]: MockPaymentGateway::fail_orders_with
/// [`fail_refunds_with`]: MockPaymentGateway::fail_refunds_with
#[derive(Debug, Clone)]
pub struct MockPaymentGateway {
    key_id: String,
    signer: GatewaySigner,
    orders: Arc<Mutex<Vec<GatewayOrder>>>,
    refunds: Arc<Mutex<Vec<(String, Money)>>>,
    order_failure: Arc<Mutex<Option<MarketError>>>,
    refund_failure: Arc<Mutex<Option<MarketError>>>,
}

impl MockPaymentGateway {
    /// Create a gateway that signs with `key_secret`.
    #[must_use]
    pub fn new(key_id: impl Into<String>, key_secret: &str) -> Self {
        Self {
            key_id: key_id.into(),
            signer: GatewaySigner::new(key_secret),
            orders: Arc::new(Mutex::new(Vec::new())),
            refunds: Arc::new(Mutex::new(Vec::new())),
            order_failure: Arc::new(Mutex::new(None)),
            refund_failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Make every subsequent `create_order` fail with `error` (`None` restores).
    pub fn fail_orders_with(&self, error: Option<MarketError>) {
        if let Ok(mut guard) = self.order_failure.lock() {
            *guard = error;
        }
    }

    /// Make every subsequent `refund` fail with `error` (`None` restores).
    pub fn fail_refunds_with(&self, error: Option<MarketError>) {
        if let Ok(mut guard) = self.refund_failure.lock() {
            *guard = error;
        }
    }

    /// Simulate the customer paying `order_id`: returns the gateway payment id
    /// and the callback signature.
    ///
    /// # Errors
    ///
    /// Returns error if the signing key is unusable.
    pub fn complete_checkout(&self, order_id: &str) -> Result<(String, String)> {
        let payment_id = format!("pay_{}", Uuid::new_v4().simple());
        let signature = self.signer.sign(order_id, &payment_id)?;
        Ok((payment_id, signature))
    }

    /// Orders created so far.
    #[must_use]
    pub fn orders(&self) -> Vec<GatewayOrder> {
        self.orders.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Refunds accepted so far, as `(gateway_payment_id, amount)`.
    #[must_use]
    pub fn refunds(&self) -> Vec<(String, Money)> {
        self.refunds.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, amount: Money, currency: &str, _receipt: &str) -> Result<GatewayOrder> {
        if let Some(error) = lock(&self.order_failure)?.clone() {
            return Err(error);
        }

        let order = GatewayOrder {
            order_id: format!("order_{}", Uuid::new_v4().simple()),
            amount,
            currency: currency.to_string(),
        };
        lock(&self.orders)?.push(order.clone());
        Ok(order)
    }

    async fn refund(&self, gateway_payment_id: &str, amount: Money) -> Result<GatewayRefund> {
        if let Some(error) = lock(&self.refund_failure)?.clone() {
            return Err(error);
        }

        lock(&self.refunds)?.push((gateway_payment_id.to_string(), amount));
        Ok(GatewayRefund {
            refund_id: format!("rfnd_{}", Uuid::new_v4().simple()),
            amount,
        })
    }
}
