//! Payment gateway trait.
//!
//! Abstraction over order-based processors (Razorpay-style): the server creates
//! an order, the client pays out-of-band, and the gateway hands back
//! `(order_id, payment_id, signature)` for server-side verification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use venue_market_core::{Money, Result};

/// Order created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    /// Gateway order id
    pub order_id: String,
    /// Amount in whole units
    pub amount: Money,
    /// Currency code
    pub currency: String,
}

/// Refund accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRefund {
    /// Gateway refund id
    pub refund_id: String,
    /// Refunded amount
    pub amount: Money,
}

/// Payment gateway.
///
/// Calls are made exactly once per request; callers never retry them, so a
/// timeout surfaces as `MarketError::GatewayTimeout` rather than risking a
/// double charge or double refund.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id handed to the checkout client.
    fn key_id(&self) -> &str;

    /// Create an order.
    ///
    /// # Errors
    ///
    /// Returns `GatewayTimeout` or `GatewayUnavailable` if the gateway fails.
    async fn create_order(&self, amount: Money, currency: &str, receipt: &str) -> Result<GatewayOrder>;

    /// Refund a captured payment.
    ///
    /// # Errors
    ///
    /// Returns `GatewayTimeout` or `GatewayUnavailable` if the gateway fails.
    async fn refund(&self, gateway_payment_id: &str, amount: Money) -> Result<GatewayRefund>;
}
