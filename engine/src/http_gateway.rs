//! HTTP client for an order-based payment gateway (Razorpay-compatible API).

use crate::config::PaymentConfig;
use crate::providers::{GatewayOrder, GatewayRefund, PaymentGateway};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use venue_market_core::{MarketError, Money, Result};

/// Payment gateway reached over HTTPS with basic auth.
///
/// Every call is sent once. Timeouts map to [`MarketError::GatewayTimeout`] so
/// callers can tell "unknown outcome" apart from a refusal.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    /// Base URL, without trailing slash.
    base_url: String,

    /// Key id (basic-auth user, also handed to checkout).
    key_id: String,

    /// Key secret (basic-auth password).
    key_secret: String,

    /// HTTP client with the configured timeout.
    http_client: Client,
}

impl std::fmt::Debug for HttpPaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPaymentGateway")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: u64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: u64,
    currency: String,
}

#[derive(Serialize)]
struct RefundRequest {
    amount: u64,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
    amount: u64,
}

impl HttpPaymentGateway {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if the HTTP client cannot be built.
    pub fn new(config: &PaymentConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| MarketError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            http_client,
        })
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Response> {
        let response = self
            .http_client
            .post(format!("{}{path}", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(path, status = %status, body = %error_body, "Gateway request failed");
            return Err(MarketError::GatewayUnavailable(format!(
                "gateway returned {status}"
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, amount: Money, currency: &str, receipt: &str) -> Result<GatewayOrder> {
        let response = self
            .post(
                "/v1/orders",
                &CreateOrderRequest {
                    amount: amount.minor_units(),
                    currency,
                    receipt,
                },
            )
            .await?;

        let order: OrderResponse = response.json().await.map_err(map_transport_error)?;
        Ok(GatewayOrder {
            order_id: order.id,
            amount: Money::new(order.amount / 100),
            currency: order.currency,
        })
    }

    async fn refund(&self, gateway_payment_id: &str, amount: Money) -> Result<GatewayRefund> {
        let response = self
            .post(
                &format!("/v1/payments/{gateway_payment_id}/refund"),
                &RefundRequest {
                    amount: amount.minor_units(),
                },
            )
            .await?;

        let refund: RefundResponse = response.json().await.map_err(map_transport_error)?;
        Ok(GatewayRefund {
            refund_id: refund.id,
            amount: Money::new(refund.amount / 100),
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> MarketError {
    if error.is_timeout() {
        MarketError::GatewayTimeout
    } else {
        MarketError::GatewayUnavailable(error.to_string())
    }
}
