//! Gateway callback signatures.
//!
//! `signature = hex(hmac_sha256(secret, "{order_id}|{payment_id}"))`, the
//! scheme order-based gateways use to prove a checkout callback is genuine.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt::Write;
use venue_market_core::{MarketError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Recomputes and checks gateway signatures with the shared key secret.
#[derive(Clone)]
pub struct GatewaySigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for GatewaySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySigner").finish_non_exhaustive()
    }
}

impl GatewaySigner {
    /// Create a signer from the gateway key secret.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Expected signature for an order/payment pair.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if the key cannot initialise the MAC.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| MarketError::Internal(format!("invalid gateway secret: {e}")))?;
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());

        let digest = mac.finalize().into_bytes();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        Ok(hex)
    }

    /// Constant-time comparison of `signature` against the recomputed one.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if the key cannot initialise the MAC.
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<bool> {
        let expected = self.sign(order_id, payment_id)?;
        let supplied = signature.trim().to_ascii_lowercase();
        Ok(constant_time_eq::constant_time_eq(
            expected.as_bytes(),
            supplied.as_bytes(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_lowercase_hex_and_case_insensitive() {
        let signer = GatewaySigner::new("secret");
        let sig = signer.sign("order_1", "pay_1").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(signer.verify("order_1", "pay_1", &sig).unwrap());
        assert!(signer.verify("order_1", "pay_1", &sig.to_uppercase()).unwrap());
    }

    #[test]
    fn swapped_ids_do_not_verify() {
        let signer = GatewaySigner::new("secret");
        let sig = signer.sign("order_1", "pay_1").unwrap();
        assert!(!signer.verify("pay_1", "order_1", &sig).unwrap());
        assert!(!signer.verify("order_1", "pay_2", &sig).unwrap());
    }

    #[test]
    fn different_secret_does_not_verify() {
        let sig = GatewaySigner::new("secret").sign("order_1", "pay_1").unwrap();
        assert!(!GatewaySigner::new("other").verify("order_1", "pay_1", &sig).unwrap());
    }
}
