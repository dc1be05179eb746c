//! # toolgate-auth
//!
//! Per-endpoint key derivation, HMAC request signing and the inbound
//! verification gate for signed tool calls.
//!
//! ## Security Properties
//!
//! - **Derived keys**: each endpoint signs with `HMAC-SHA256(application_secret, endpoint_id)`,
//!   so leaking one endpoint key reveals neither the application secret nor any other key
//! - **Canonical message**: the signature covers `body || decimal(timestamp)` with no separator
//! - **Freshness window**: requests more than 300 seconds from the verifier's clock are rejected
//! - **Constant-time comparison**: supplied signatures are checked with [`subtle`]
//!
//! ## Example
//!
//! ```
//! use toolgate_auth::{SecurityHeaders, Signer, VerificationGate};
//! use toolgate_common::ApplicationSecret;
//!
//! let secret = ApplicationSecret::new("S");
//! let signer = Signer::new(secret.clone());
//!
//! let body = br#"{"parameters":{},"eventId":"evt-1"}"#.to_vec();
//! let signed = signer.sign_request("tool-A", body, 1_700_000_000);
//!
//! let headers = SecurityHeaders {
//!     event_id: Some("evt-1".to_string()),
//!     timestamp: Some(signed.timestamp.to_string()),
//!     signature: Some(signed.signature.clone()),
//! };
//!
//! let gate = VerificationGate::new("tool-A", Some(secret));
//! assert!(gate.verify_at(&headers, &signed.body, 1_700_000_100).is_ok());
//! ```

pub mod gate;
pub mod secret;
pub mod signature;

pub use gate::{
    DEFAULT_FRESHNESS_WINDOW_SECS, GateError, RejectionStatus, SecurityHeaders, VerificationGate,
    VerifiedRequest,
};
pub use secret::{
    EndpointSecret, MemorySecretStore, derive_endpoint_secret, ensure_application_secret,
    generate_application_secret,
};
pub use signature::{
    EVENT_ID_HEADER, SIGNATURE_HEADER, SignedRequest, Signer, TIMESTAMP_HEADER, canonical_message,
    sign, verify_signature,
};
