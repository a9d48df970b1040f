//! Signed ticket QR payloads.
//!
//! Format: `v1.<base64url(json descriptor)>.<base64url(hmac_sha256(payload part))>`.
//! The scan path trusts nothing in the payload until the MAC verifies.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use qrcode::QrCode;
use qrcode::render::svg;
use sha2::Sha256;
use venue_market_core::{MarketError, Result, TicketDescriptor};

type HmacSha256 = Hmac<Sha256>;

const QR_VERSION_V1: &str = "v1";
const MAX_QR_PAYLOAD_LEN: usize = 2048;

fn invalid(reason: impl Into<String>) -> MarketError {
    MarketError::InvalidQr {
        reason: reason.into(),
    }
}

/// Signs descriptors at issuance and verifies them at scan time.
#[derive(Clone)]
pub struct TicketSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TicketSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketSigner").finish_non_exhaustive()
    }
}

impl TicketSigner {
    /// Create a signer with the ticket signing secret.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| MarketError::Internal(format!("invalid ticket secret: {e}")))
    }

    /// Serialize and sign a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if serialization or keying fails.
    pub fn encode(&self, descriptor: &TicketDescriptor) -> Result<String> {
        let json = serde_json::to_vec(descriptor)
            .map_err(|e| MarketError::Internal(format!("descriptor serialization: {e}")))?;
        let payload_part = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(payload_part.as_bytes());
        let sig_part = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{QR_VERSION_V1}.{payload_part}.{sig_part}"))
    }

    /// Verify and parse a scanned payload.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidQr`] for malformed, unsigned, tampered or
    /// unsupported payloads.
    pub fn decode(&self, token: &str) -> Result<TicketDescriptor> {
        let token = token.trim();
        if token.len() > MAX_QR_PAYLOAD_LEN {
            return Err(invalid("payload too long"));
        }

        let mut parts = token.split('.');
        let (Some(version), Some(payload_part), Some(sig_part), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected three dot-separated parts"));
        };
        if version != QR_VERSION_V1 {
            return Err(invalid(format!("unsupported version {version}")));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(sig_part)
            .map_err(|_| invalid("signature is not base64url"))?;
        let mut mac = self.mac()?;
        mac.update(payload_part.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| invalid("signature does not verify"))?;

        let json = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|_| invalid("payload is not base64url"))?;
        serde_json::from_slice(&json).map_err(|e| invalid(format!("payload is not a descriptor: {e}")))
    }
}

/// Render `payload` as an SVG QR code wrapped in a `data:` URL.
///
/// # Errors
///
/// Returns [`MarketError::Internal`] if the payload does not fit in a QR code.
pub fn render_data_url(payload: &str) -> Result<String> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| MarketError::Internal(format!("QR encoding failed: {e}")))?;
    let image = code
        .render::<svg::Color<'_>>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .build();
    Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use venue_market_core::{EventId, TicketCode, UserId};

    fn descriptor() -> TicketDescriptor {
        TicketDescriptor {
            ticket_id: TicketCode::new("TKT-ABC123XYZ0"),
            event_id: EventId::new(),
            user_id: UserId::new(),
            quantity: 2,
            ticket_type: "general".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn signed_payload_decodes() {
        let signer = TicketSigner::new("qr-secret");
        let descriptor = descriptor();
        let token = signer.encode(&descriptor).unwrap();

        assert!(token.starts_with("v1."));
        assert_eq!(signer.decode(&token).unwrap(), descriptor);
    }

    #[test]
    fn forged_payload_is_rejected() {
        let signer = TicketSigner::new("qr-secret");
        let token = signer.encode(&descriptor()).unwrap();
        let sig = token.rsplit('.').next().unwrap();

        let mut forged = descriptor();
        forged.quantity = 50;
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("v1.{forged_payload}.{sig}");

        assert!(matches!(
            signer.decode(&forged_token),
            Err(MarketError::InvalidQr { .. })
        ));
    }

    #[test]
    fn other_key_is_rejected() {
        let token = TicketSigner::new("qr-secret").encode(&descriptor()).unwrap();
        assert!(TicketSigner::new("another").decode(&token).is_err());
    }

    #[test]
    fn malformed_payloads_are_invalid_qr() {
        let signer = TicketSigner::new("qr-secret");
        for token in [
            "",
            "not-a-ticket",
            "v1.onlytwo",
            "v2.abc.def",
            "v1.abc.def.extra",
            "{\"ticketId\":\"TKT-1\"}",
        ] {
            assert!(
                matches!(signer.decode(token), Err(MarketError::InvalidQr { .. })),
                "{token:?} should be rejected"
            );
        }
    }

    #[test]
    fn renders_svg_data_url() {
        let url = render_data_url("v1.payload.sig").unwrap();
        assert!(url.starts_with("data:image/svg+xml;base64,"));
        let svg = STANDARD
            .decode(url.trim_start_matches("data:image/svg+xml;base64,"))
            .unwrap();
        assert!(String::from_utf8(svg).unwrap().contains("<svg"));
    }
}
