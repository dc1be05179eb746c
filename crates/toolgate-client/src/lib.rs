//! # toolgate-client
//!
//! Outbound delivery of signed tool calls.
//!
//! This crate provides the sending half of a signed tool call:
//! - The [`ToolTransport`] trait the invocation bridge posts through
//! - [`HttpTransport`], a reqwest-backed transport with per-attempt deadlines
//! - Structured transport errors classified into a closed set of [`ErrorKind`]s
//! - A bounded exponential-backoff retry executor
//!
//! ## Example
//!
//! ```no_run
//! use toolgate_auth::Signer;
//! use toolgate_client::{HttpTransport, ToolTransport, with_retry};
//! use toolgate_common::{ApplicationSecret, ClientConfig, RetryConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let transport = HttpTransport::new(ClientConfig::default())?;
//! let signer = Signer::new(ApplicationSecret::new("S"));
//!
//! let body = serde_json::to_vec(&serde_json::json!({
//!     "parameters": { "city": "Lisbon" },
//!     "eventId": "evt-1",
//! }))?;
//! let signed = signer.sign_now("tool-weather", body);
//!
//! let response = with_retry(
//!     "get_weather",
//!     &RetryConfig::default(),
//!     || transport.post_signed("https://tools.example.com/tools/tool-weather", "evt-1", &signed),
//!     None,
//! )
//! .await?;
//! println!("{response}");
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use toolgate_auth::SignedRequest;

pub mod error;
pub mod http;
pub mod retry;

pub use error::{ClientError, ErrorKind};
pub use http::HttpTransport;
pub use retry::{AttemptCallback, RetryError, Retryable, with_retry, with_retry_cancellable};

/// Trait for delivering a signed tool call to its endpoint.
///
/// One call is one attempt; retrying is the caller's business. Implementations
/// must be thread-safe (Send + Sync) so a single transport can be shared by
/// every tool.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// POST the signed body to `url` with the three security headers.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL of the tool endpoint
    /// * `event_id` - Event identifier sent as `X-Event-Id`
    /// * `request` - Body, timestamp and signature to send unchanged
    ///
    /// # Returns
    ///
    /// The parsed JSON response body of a 2xx response.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] whose [`ClientError::kind`] decides whether
    /// the attempt is worth repeating.
    async fn post_signed(
        &self,
        url: &str,
        event_id: &str,
        request: &SignedRequest,
    ) -> Result<Value, ClientError>;
}
