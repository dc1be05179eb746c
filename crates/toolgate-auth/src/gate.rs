//! Inbound verification gate for a single tool endpoint.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. The application secret must be configured (server fault otherwise)
//! 2. `X-Event-Id`, `X-Timestamp` and `X-Signature` must all be present
//! 3. The timestamp must be canonical decimal text within the freshness window
//!    of the local clock
//! 4. The signature must match the one recomputed with this endpoint's key
//!
//! Only a request that passes all four is admitted. Rejections carry a
//! machine-readable [`RejectionStatus`] and a generic public message; the
//! specific reason is logged locally and never returned to the caller.

use log::debug;
use thiserror::Error;

use toolgate_common::ApplicationSecret;

use crate::secret::derive_endpoint_secret;
use crate::signature::{EVENT_ID_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER, verify_signature};

/// Maximum distance, in seconds, between a request timestamp and the local clock.
pub const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 300;

/// The three security headers as received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityHeaders {
    /// Value of `X-Event-Id`.
    pub event_id: Option<String>,
    /// Value of `X-Timestamp`.
    pub timestamp: Option<String>,
    /// Value of `X-Signature`.
    pub signature: Option<String>,
}

impl SecurityHeaders {
    /// Collects the security headers through a name lookup.
    ///
    /// Works with any HTTP stack: pass a closure that returns the header value
    /// for a given name. Empty values count as missing.
    pub fn from_lookup<'a, F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        };

        Self {
            event_id: get(EVENT_ID_HEADER),
            timestamp: get(TIMESTAMP_HEADER),
            signature: get(SIGNATURE_HEADER),
        }
    }
}

/// Machine-readable class of a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionStatus {
    /// Caller fault: the request must be re-signed (HTTP 401).
    Unauthorized,
    /// Operator fault: setup is incomplete (HTTP 500).
    ServerError,
}

impl RejectionStatus {
    /// HTTP status code for this rejection class.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::ServerError => 500,
        }
    }
}

/// Reasons a request is refused by the gate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateError {
    /// No application secret is configured.
    #[error("application secret is not configured")]
    SecretUnavailable,

    /// One or more security headers are absent.
    #[error("missing security headers: {0}")]
    MissingHeaders(String),

    /// The timestamp header is not a decimal integer.
    #[error("timestamp is not a decimal integer")]
    InvalidTimestamp,

    /// The timestamp lies outside the freshness window.
    #[error("timestamp is {skew_secs}s away from local time (window {window_secs}s)")]
    StaleTimestamp {
        /// Absolute distance from the local clock.
        skew_secs: u64,
        /// Configured window.
        window_secs: u64,
    },

    /// The signature does not match the recomputed one.
    #[error("signature mismatch")]
    SignatureMismatch,
}

impl GateError {
    /// Rejection class for this error.
    #[must_use]
    pub const fn status(&self) -> RejectionStatus {
        match self {
            Self::SecretUnavailable => RejectionStatus::ServerError,
            Self::MissingHeaders(_)
            | Self::InvalidTimestamp
            | Self::StaleTimestamp { .. }
            | Self::SignatureMismatch => RejectionStatus::Unauthorized,
        }
    }

    /// Message safe to return to the caller; never names the failed check.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self.status() {
            RejectionStatus::Unauthorized => "Unauthorized",
            RejectionStatus::ServerError => "Server configuration error",
        }
    }
}

/// A request that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRequest {
    /// Event identifier from `X-Event-Id`.
    pub event_id: String,
    /// Signing time from `X-Timestamp`.
    pub timestamp: i64,
}

/// Verifies signed calls addressed to one endpoint.
#[derive(Debug, Clone)]
pub struct VerificationGate {
    endpoint_id: String,
    application_secret: Option<ApplicationSecret>,
    freshness_window_secs: u64,
}

impl VerificationGate {
    /// Creates a gate for `endpoint_id`.
    ///
    /// Passing `None` for the secret models an endpoint whose setup has not
    /// completed; every request is then refused with a server error.
    pub fn new(
        endpoint_id: impl Into<String>,
        application_secret: Option<ApplicationSecret>,
    ) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            application_secret,
            freshness_window_secs: DEFAULT_FRESHNESS_WINDOW_SECS,
        }
    }

    /// Overrides the freshness window.
    #[must_use]
    pub const fn with_freshness_window(mut self, secs: u64) -> Self {
        self.freshness_window_secs = secs;
        self
    }

    /// Endpoint identifier this gate verifies for.
    #[must_use]
    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    /// Verifies against the current wall clock.
    ///
    /// # Errors
    ///
    /// Returns the first failed check, see [`GateError`].
    pub fn verify(
        &self,
        headers: &SecurityHeaders,
        body: &[u8],
    ) -> Result<VerifiedRequest, GateError> {
        self.verify_at(headers, body, chrono::Utc::now().timestamp())
    }

    /// Verifies as if the local clock read `now` (seconds since the epoch).
    ///
    /// # Errors
    ///
    /// Returns the first failed check, see [`GateError`].
    pub fn verify_at(
        &self,
        headers: &SecurityHeaders,
        body: &[u8],
        now: i64,
    ) -> Result<VerifiedRequest, GateError> {
        let result = self.check(headers, body, now);
        if let Err(ref e) = result {
            debug!("Rejected request for endpoint '{}': {e}", self.endpoint_id);
        }
        result
    }

    fn check(
        &self,
        headers: &SecurityHeaders,
        body: &[u8],
        now: i64,
    ) -> Result<VerifiedRequest, GateError> {
        let secret = self
            .application_secret
            .as_ref()
            .filter(|s| !s.is_empty())
            .ok_or(GateError::SecretUnavailable)?;

        let (Some(event_id), Some(timestamp), Some(signature)) = (
            headers.event_id.as_deref(),
            headers.timestamp.as_deref(),
            headers.signature.as_deref(),
        ) else {
            return Err(GateError::MissingHeaders(missing_header_names(headers)));
        };

        let timestamp = parse_timestamp(timestamp)?;

        let skew_secs = now.abs_diff(timestamp);
        if skew_secs > self.freshness_window_secs {
            return Err(GateError::StaleTimestamp {
                skew_secs,
                window_secs: self.freshness_window_secs,
            });
        }

        let endpoint_secret = derive_endpoint_secret(&self.endpoint_id, secret);
        if !verify_signature(body, timestamp, &endpoint_secret, signature) {
            return Err(GateError::SignatureMismatch);
        }

        Ok(VerifiedRequest {
            event_id: event_id.to_string(),
            timestamp,
        })
    }
}

/// Parses the timestamp header, accepting only the canonical decimal text.
///
/// The signature covers the header text as written, so `+1700000000` or
/// `01700000000` must not verify against a signature made at `1700000000`.
fn parse_timestamp(text: &str) -> Result<i64, GateError> {
    let timestamp: i64 = text.parse().map_err(|_| GateError::InvalidTimestamp)?;
    if timestamp.to_string() != text {
        return Err(GateError::InvalidTimestamp);
    }
    Ok(timestamp)
}

fn missing_header_names(headers: &SecurityHeaders) -> String {
    [
        (EVENT_ID_HEADER, headers.event_id.is_none()),
        (TIMESTAMP_HEADER, headers.timestamp.is_none()),
        (SIGNATURE_HEADER, headers.signature.is_none()),
    ]
    .iter()
    .filter(|(_, missing)| *missing)
    .map(|(name, _)| *name)
    .collect::<Vec<_>>()
    .join(", ")
}
