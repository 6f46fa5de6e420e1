//! Webhook signature verification.
//!
//! The provider signs `"{timestamp}.{raw body}"` with HMAC-SHA256 and sends
//! `t=<unix seconds>,v1=<hex digest>[,v1=...]` in the signature header.
//! Several `v1` entries appear while a signing secret is being rolled.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header the provider sends the signature in.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Reasons a webhook signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// No signature header on the request.
    #[error("missing signature header")]
    MissingHeader,
    /// Header lacks a timestamp or any `v1` digest.
    #[error("malformed signature header")]
    Malformed,
    /// Timestamp is outside the replay tolerance.
    #[error("timestamp outside tolerance")]
    Expired,
    /// No digest matched the payload.
    #[error("signature mismatch")]
    Mismatch,
}

/// Verifies provider signatures with a shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl SignatureVerifier {
    /// Creates a verifier. A tolerance of zero disables the timestamp check.
    #[must_use]
    pub fn new(secret: impl Into<String>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: i64::try_from(tolerance_secs).unwrap_or(i64::MAX),
        }
    }

    /// Verifies `header` against `payload` at the current time.
    ///
    /// # Errors
    ///
    /// Returns a [`SignatureError`] describing why the signature is invalid.
    pub fn verify(&self, header: Option<&str>, payload: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(header, payload, chrono::Utc::now().timestamp())
    }

    /// Verifies `header` against `payload` as of `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns a [`SignatureError`] describing why the signature is invalid.
    pub fn verify_at(
        &self,
        header: Option<&str>,
        payload: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::MissingHeader)?;

        let mut timestamp = None;
        let mut digests = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => digests.push(value),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
        if digests.is_empty() {
            return Err(SignatureError::Malformed);
        }
        if self.tolerance_secs > 0 && now.abs_diff(timestamp) > self.tolerance_secs.unsigned_abs() {
            return Err(SignatureError::Expired);
        }

        let matched = digests.into_iter().any(|digest| {
            let Ok(expected) = hex::decode(digest) else {
                return false;
            };
            self.mac(timestamp, payload)
                .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
        });
        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Produces a header value for `payload` signed at `timestamp`.
    #[must_use]
    pub fn sign(&self, timestamp: i64, payload: &[u8]) -> String {
        let digest = self
            .mac(timestamp, payload)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default();
        format!("t={timestamp},v1={digest}")
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Some(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new("whsec_test", 300)
    }

    #[test]
    fn valid_signature_passes() {
        let v = verifier();
        let body = br#"{"id":"evt_1"}"#;
        let header = v.sign(NOW, body);
        assert_eq!(v.verify_at(Some(&header), body, NOW + 10), Ok(()));
    }

    #[test]
    fn tampered_body_fails() {
        let v = verifier();
        let header = v.sign(NOW, b"original");
        assert_eq!(
            v.verify_at(Some(&header), b"tampered", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_fails() {
        let header = SignatureVerifier::new("other", 300).sign(NOW, b"body");
        assert_eq!(
            verifier().verify_at(Some(&header), b"body", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stale_timestamp_fails() {
        let v = verifier();
        let header = v.sign(NOW, b"body");
        assert_eq!(
            v.verify_at(Some(&header), b"body", NOW + 301),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn any_matching_v1_is_accepted() {
        let v = verifier();
        let good = v.sign(NOW, b"body");
        let header = format!("{},v1=deadbeef", good.replace(",v1=", ",v1=00ff,v1="));
        assert_eq!(v.verify_at(Some(&header), b"body", NOW), Ok(()));
    }

    #[test]
    fn missing_or_malformed_header_fails() {
        let v = verifier();
        assert_eq!(v.verify_at(None, b"body", NOW), Err(SignatureError::MissingHeader));
        assert_eq!(
            v.verify_at(Some("v1=abcd"), b"body", NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            v.verify_at(Some("t=123"), b"body", NOW),
            Err(SignatureError::Malformed)
        );
    }
}
