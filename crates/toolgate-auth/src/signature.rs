//! Request signing over the canonical `body || timestamp` message.
//!
//! The canonical message is the raw body bytes followed immediately by the
//! decimal text of the timestamp in seconds, with no separator. Signer and
//! verifier must produce byte-identical messages; any difference in encoding
//! or whitespace is an unrecoverable verification failure.

use hmac::Mac;
use subtle::ConstantTimeEq;

use toolgate_common::ApplicationSecret;

use crate::secret::{EndpointSecret, derive_endpoint_secret, keyed_mac};

/// Header carrying the event identifier of the call.
pub const EVENT_ID_HEADER: &str = "X-Event-Id";

/// Header carrying the signing time in decimal seconds since the epoch.
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

/// Header carrying the lowercase hex HMAC-SHA256 signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// A body together with the timestamp and signature that cover it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Exact bytes that were signed and must be sent.
    pub body: Vec<u8>,
    /// Signing time in seconds since the Unix epoch.
    pub timestamp: i64,
    /// Lowercase hex HMAC-SHA256 signature.
    pub signature: String,
}

/// Builds the canonical message for `body` signed at `timestamp`.
#[must_use]
pub fn canonical_message(body: &[u8], timestamp: i64) -> Vec<u8> {
    let ts = timestamp.to_string();
    let mut message = Vec::with_capacity(body.len() + ts.len());
    message.extend_from_slice(body);
    message.extend_from_slice(ts.as_bytes());
    message
}

/// Signs `body` at `timestamp` with an endpoint key, returning lowercase hex.
#[must_use]
pub fn sign(body: &[u8], timestamp: i64, endpoint_secret: &EndpointSecret) -> String {
    let mut mac = keyed_mac(endpoint_secret.expose_bytes());
    mac.update(&canonical_message(body, timestamp));
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `supplied` against the expected signature in constant time.
#[must_use]
pub fn verify_signature(
    body: &[u8],
    timestamp: i64,
    endpoint_secret: &EndpointSecret,
    supplied: &str,
) -> bool {
    let expected = sign(body, timestamp, endpoint_secret);
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// Signs outbound calls for any endpoint from one application secret.
///
/// Endpoint keys are derived on every call rather than cached.
#[derive(Debug, Clone)]
pub struct Signer {
    application_secret: ApplicationSecret,
}

impl Signer {
    /// Creates a signer bound to `application_secret`.
    #[must_use]
    pub const fn new(application_secret: ApplicationSecret) -> Self {
        Self { application_secret }
    }

    /// Derives the key of `endpoint_id`.
    #[must_use]
    pub fn endpoint_secret(&self, endpoint_id: &str) -> EndpointSecret {
        derive_endpoint_secret(endpoint_id, &self.application_secret)
    }

    /// Signs `body` for `endpoint_id` at an explicit `timestamp`.
    #[must_use]
    pub fn sign_request(&self, endpoint_id: &str, body: Vec<u8>, timestamp: i64) -> SignedRequest {
        let signature = sign(&body, timestamp, &self.endpoint_secret(endpoint_id));
        SignedRequest {
            body,
            timestamp,
            signature,
        }
    }

    /// Signs `body` for `endpoint_id` stamped with the current time.
    #[must_use]
    pub fn sign_now(&self, endpoint_id: &str, body: Vec<u8>) -> SignedRequest {
        self.sign_request(endpoint_id, body, chrono::Utc::now().timestamp())
    }
}
