//! reqwest-backed [`ToolTransport`].

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, Request};
use serde_json::Value;

use toolgate_auth::{EVENT_ID_HEADER, SIGNATURE_HEADER, SignedRequest, TIMESTAMP_HEADER};
use toolgate_common::ClientConfig;

use crate::ToolTransport;
use crate::error::ClientError;

/// HTTP transport for signed tool calls.
///
/// Every request carries the configured connect timeout and a per-attempt
/// deadline, so a hung endpoint surfaces as [`ClientError::Timeout`] instead of
/// stalling the retry sequence.
///
/// The transport is cheaply cloneable and can be shared across multiple tasks.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use toolgate_client::HttpTransport;
/// use toolgate_common::ClientConfig;
///
/// let config = ClientConfig::default().with_timeout(Duration::from_secs(10));
/// let transport = HttpTransport::new(config).unwrap();
/// assert_eq!(transport.config().timeout, Duration::from_secs(10));
/// ```
#[derive(Clone)]
pub struct HttpTransport {
    inner: Client,
    config: Arc<ClientConfig>,
}

impl HttpTransport {
    /// Creates a new transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            inner: client,
            config: Arc::new(config),
        })
    }

    /// The configuration this transport was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Builds the POST for one signed attempt.
    ///
    /// The body bytes are sent exactly as signed.
    fn build_signed_request(
        &self,
        url: &str,
        event_id: &str,
        request: &SignedRequest,
    ) -> Result<Request, ClientError> {
        let parsed_url: reqwest::Url = url
            .parse()
            .map_err(|e| ClientError::ConfigurationError(format!("invalid tool URL {url}: {e}")))?;

        self.inner
            .request(Method::POST, parsed_url)
            .header("Content-Type", "application/json")
            .header(EVENT_ID_HEADER, event_id)
            .header(TIMESTAMP_HEADER, request.timestamp.to_string())
            .header(SIGNATURE_HEADER, &request.signature)
            .body(request.body.clone())
            .build()
            .map_err(|e| ClientError::ConfigurationError(e.to_string()))
    }
}

#[async_trait]
impl ToolTransport for HttpTransport {
    async fn post_signed(
        &self,
        url: &str,
        event_id: &str,
        request: &SignedRequest,
    ) -> Result<Value, ClientError> {
        let http_request = self.build_signed_request(url, event_id, request)?;
        debug!("POST {url} (event {event_id})");

        let response = self.inner.execute(http_request).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Tool endpoint {url} answered {status}");
            return Err(ClientError::from_status(
                status.as_u16(),
                status.canonical_reason(),
                &body,
            ));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ClientError::InvalidResponse(format!("tool endpoint returned non-JSON body: {e}"))
        })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("connect_timeout", &self.config.connect_timeout)
            .field("timeout", &self.config.timeout)
            .field("user_agent", &self.config.user_agent)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use std::time::Duration;

    use serde_json::json;
    use toolgate_auth::Signer;
    use toolgate_common::ApplicationSecret;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::ErrorKind;

    fn signed(body: &[u8]) -> SignedRequest {
        Signer::new(ApplicationSecret::new("S")).sign_request("tool-A", body.to_vec(), 1_700_000_000)
    }

    fn transport() -> HttpTransport {
        HttpTransport::new(ClientConfig::default()).unwrap()
    }

    #[test]
    fn test_request_carries_security_headers() {
        let request = signed(br#"{"parameters":{},"eventId":"evt-1"}"#);
        let built = transport()
            .build_signed_request("https://tools.example.com/tools/tool-A", "evt-1", &request)
            .unwrap();

        assert_eq!(built.method(), &Method::POST);
        assert_eq!(built.url().as_str(), "https://tools.example.com/tools/tool-A");
        let headers = built.headers();
        assert_eq!(headers.get("X-Event-Id").unwrap(), "evt-1");
        assert_eq!(headers.get("X-Timestamp").unwrap(), "1700000000");
        assert_eq!(
            headers.get("X-Signature").unwrap().to_str().unwrap(),
            request.signature
        );
        assert_eq!(headers.get("Content-Type").unwrap(), "application/json");
    }

    #[test]
    fn test_invalid_url_is_configuration_error() {
        let err = transport()
            .build_signed_request("not a url", "evt-1", &signed(b"{}"))
            .unwrap_err();
        assert!(matches!(err, ClientError::ConfigurationError(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_debug_output() {
        let debug_str = format!("{:?}", transport());
        assert!(debug_str.contains("HttpTransport"));
        assert!(debug_str.contains("timeout"));
    }

    #[tokio::test]
    async fn test_post_sends_signed_body_verbatim() {
        let server = MockServer::start().await;
        let body = br#"{"parameters":{"city":"Lisbon"},"eventId":"evt-1"}"#;
        let request = signed(body);

        Mock::given(method("POST"))
            .and(path("/tools/tool-A"))
            .and(header("X-Event-Id", "evt-1"))
            .and(header("X-Timestamp", "1700000000"))
            .and(header("X-Signature", request.signature.as_str()))
            .and(header("Content-Type", "application/json"))
            .and(body_bytes(body.to_vec()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "sunny" })))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport()
            .post_signed(&format!("{}/tools/tool-A", server.uri()), "evt-1", &request)
            .await
            .unwrap();

        assert_eq!(response, json!({ "result": "sunny" }));
    }

    #[tokio::test]
    async fn test_gateway_timeout_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(504))
            .mount(&server)
            .await;

        let err = transport()
            .post_signed(&server.uri(), "evt-1", &signed(b"{}"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::GatewayTimeout);
        assert!(err.is_retryable());
        assert!(err.to_string().starts_with("HTTP 504"));
    }

    #[tokio::test]
    async fn test_server_error_detail_is_captured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({ "error": { "message": "tool crashed" } })),
            )
            .mount(&server)
            .await;

        let err = transport()
            .post_signed(&server.uri(), "evt-1", &signed(b"{}"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(err.detail(), Some("tool crashed"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unauthorized_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "error": { "message": "Unauthorized" } })),
            )
            .mount(&server)
            .await;

        let err = transport()
            .post_signed(&server.uri(), "evt-1", &signed(b"{}"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Other(Some(401)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_slow_endpoint_hits_attempt_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "result": 1 }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(
            ClientConfig::default().with_timeout(Duration::from_millis(100)),
        )
        .unwrap();
        let err = transport
            .post_signed(&server.uri(), "evt-1", &signed(b"{}"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Timeout));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_non_json_success_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let err = transport()
            .post_signed(&server.uri(), "evt-1", &signed(b"{}"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_refused_connection_is_not_retryable() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = transport()
            .post_signed(&format!("http://{addr}/tools/tool-A"), "evt-1", &signed(b"{}"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Connect(_)), "got {err:?}");
        assert!(!err.is_retryable());
    }
}
