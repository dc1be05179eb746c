//! Error types for the transport layer.

use std::error::Error as StdError;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Error response body returned by a tool endpoint.
///
/// Wraps the detailed error information some endpoints return on failure.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// The error detail object from the endpoint.
    pub error: ErrorDetail,
}

/// Detailed error information from the endpoint.
#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    /// The error message text describing what went wrong.
    pub message: String,
}

/// Closed set of failure categories used for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request or connection timed out.
    Timeout,
    /// The peer reset the connection.
    ConnectionReset,
    /// The host name could not be resolved.
    DnsFailure,
    /// The endpoint answered HTTP 504.
    GatewayTimeout,
    /// Anything else, with the HTTP status when there was one.
    Other(Option<u16>),
}

static GATEWAY_TIMEOUT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b504\b").ok());
static TIMEOUT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)time[ds]?\s?out|ETIMEDOUT").ok());
static CONNECTION_RESET_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)ECONNRESET|connection reset").ok());
static DNS_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)ENOTFOUND|EAI_AGAIN|getaddrinfo|dns error|failed to lookup address").ok()
});

fn matches(pattern: &LazyLock<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(text))
}

impl ErrorKind {
    /// Whether failures of this kind are worth another attempt.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionReset | Self::DnsFailure | Self::GatewayTimeout => true,
            Self::Other(_) => false,
        }
    }

    /// Classifies an HTTP status code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        if status == 504 {
            Self::GatewayTimeout
        } else {
            Self::Other(Some(status))
        }
    }

    /// Classifies an error that is only available as text.
    ///
    /// Recognizes `504`, timeouts, `ECONNRESET` and DNS lookup failures.
    #[must_use]
    pub fn from_message(message: &str) -> Self {
        if matches(&GATEWAY_TIMEOUT_PATTERN, message) {
            Self::GatewayTimeout
        } else if matches(&TIMEOUT_PATTERN, message) {
            Self::Timeout
        } else if matches(&CONNECTION_RESET_PATTERN, message) {
            Self::ConnectionReset
        } else if matches(&DNS_PATTERN, message) {
            Self::DnsFailure
        } else {
            Self::Other(None)
        }
    }
}

/// Errors that can occur when delivering a signed tool call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The attempt exceeded its deadline.
    #[error("Request timeout")]
    Timeout,

    /// The connection was reset by the peer.
    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    /// The endpoint host could not be resolved.
    #[error("DNS lookup failed: {0}")]
    DnsFailure(String),

    /// The connection could not be established for another reason.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The endpoint answered with a non-success status.
    #[error("{message}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// `HTTP <code> <reason>`, followed by the endpoint detail when present.
        message: String,
        /// Structured detail reported by the endpoint, if any.
        detail: Option<String>,
    },

    /// Any other network or HTTP failure.
    #[error("Network error: {0}")]
    NetworkError(#[source] reqwest::Error),

    /// JSON serialization or deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The endpoint returned data that doesn't match the expected format.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid client configuration or request target.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl ClientError {
    /// Builds an error for a non-success HTTP response.
    ///
    /// Extracts `error.message` from the body when it is a JSON error response.
    #[must_use]
    pub fn from_status(status: u16, reason: Option<&str>, body: &str) -> Self {
        let detail = serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .map(|r| r.error.message)
            .filter(|m| !m.trim().is_empty());

        let mut message = format!("HTTP {status}");
        if let Some(reason) = reason {
            message.push(' ');
            message.push_str(reason);
        }
        if let Some(ref detail) = detail {
            message.push_str(": ");
            message.push_str(detail);
        }

        Self::HttpStatus {
            status,
            message,
            detail,
        }
    }

    /// Retry category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout => ErrorKind::Timeout,
            Self::ConnectionReset(_) => ErrorKind::ConnectionReset,
            Self::DnsFailure(_) => ErrorKind::DnsFailure,
            Self::HttpStatus { status, .. } => ErrorKind::from_status(*status),
            Self::NetworkError(e) => ErrorKind::Other(e.status().map(|s| s.as_u16())),
            Self::Connect(_)
            | Self::SerializationError(_)
            | Self::InvalidResponse(_)
            | Self::ConfigurationError(_) => ErrorKind::Other(None),
        }
    }

    /// Check if this error is potentially retryable.
    ///
    /// Returns `true` for timeouts, connection resets, DNS failures and HTTP 504.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// HTTP status code, when the endpoint answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Structured detail reported by the endpoint, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Joins an error and all of its sources into one line.
fn error_chain_text(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

fn io_error_kind(err: &(dyn StdError + 'static)) -> Option<std::io::ErrorKind> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        current = e.source();
    }
    None
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }

        let chain = error_chain_text(&err);
        if io_error_kind(&err) == Some(std::io::ErrorKind::ConnectionReset) {
            return Self::ConnectionReset(chain);
        }

        // Status codes are classified from the response, not from text.
        match ErrorKind::from_message(&chain) {
            ErrorKind::Timeout => Self::Timeout,
            ErrorKind::ConnectionReset => Self::ConnectionReset(chain),
            ErrorKind::DnsFailure => Self::DnsFailure(chain),
            ErrorKind::GatewayTimeout | ErrorKind::Other(_) if err.is_connect() => {
                Self::Connect(chain)
            }
            ErrorKind::GatewayTimeout | ErrorKind::Other(_) => Self::NetworkError(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::ConnectionReset.is_retryable());
        assert!(ErrorKind::DnsFailure.is_retryable());
        assert!(ErrorKind::GatewayTimeout.is_retryable());
        assert!(!ErrorKind::Other(None).is_retryable());
        assert!(!ErrorKind::Other(Some(500)).is_retryable());
    }

    #[test]
    fn test_from_status() {
        assert_eq!(ErrorKind::from_status(504), ErrorKind::GatewayTimeout);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Other(Some(503)));
        assert_eq!(ErrorKind::from_status(500), ErrorKind::Other(Some(500)));
        assert!(!ErrorKind::from_status(502).is_retryable());
    }

    #[test]
    fn test_from_message_matches_reference_patterns() {
        assert_eq!(
            ErrorKind::from_message("HTTP 504: Gateway Timeout"),
            ErrorKind::GatewayTimeout
        );
        assert_eq!(ErrorKind::from_message("request timeout"), ErrorKind::Timeout);
        assert_eq!(
            ErrorKind::from_message("operation timed out"),
            ErrorKind::Timeout
        );
        assert_eq!(
            ErrorKind::from_message("connect ETIMEDOUT 10.0.0.1:443"),
            ErrorKind::Timeout
        );
        assert_eq!(
            ErrorKind::from_message("read ECONNRESET"),
            ErrorKind::ConnectionReset
        );
        assert_eq!(
            ErrorKind::from_message("getaddrinfo ENOTFOUND tools.example.com"),
            ErrorKind::DnsFailure
        );
        assert_eq!(
            ErrorKind::from_message("dns error: failed to lookup address information"),
            ErrorKind::DnsFailure
        );
    }

    #[test]
    fn test_from_message_other() {
        assert_eq!(ErrorKind::from_message("HTTP 400: Bad Request"), ErrorKind::Other(None));
        assert_eq!(ErrorKind::from_message("boom"), ErrorKind::Other(None));
        // 504 only counts as a standalone number
        assert_eq!(ErrorKind::from_message("port 50412 refused"), ErrorKind::Other(None));
    }

    #[test]
    fn test_http_status_message_and_detail() {
        let err = ClientError::from_status(
            500,
            Some("Internal Server Error"),
            r#"{"error": {"message": "tool crashed"}}"#,
        );
        assert_eq!(err.to_string(), "HTTP 500 Internal Server Error: tool crashed");
        assert_eq!(err.detail(), Some("tool crashed"));
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_http_status_without_structured_body() {
        let err = ClientError::from_status(504, Some("Gateway Timeout"), "<html>upstream</html>");
        assert_eq!(err.to_string(), "HTTP 504 Gateway Timeout");
        assert_eq!(err.detail(), None);
        assert_eq!(err.kind(), ErrorKind::GatewayTimeout);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_http_status_message_is_text_classifiable() {
        let err = ClientError::from_status(504, None, "");
        assert_eq!(ErrorKind::from_message(&err.to_string()), ErrorKind::GatewayTimeout);
    }

    #[test]
    fn test_structured_variants() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::ConnectionReset("reset".into()).is_retryable());
        assert!(ClientError::DnsFailure("nx".into()).is_retryable());
        assert!(!ClientError::Connect("refused".into()).is_retryable());
        assert!(!ClientError::InvalidResponse("bad".into()).is_retryable());
        assert!(!ClientError::ConfigurationError("bad".into()).is_retryable());
    }
}
