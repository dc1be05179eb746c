//! HTTP surface hosting tools behind the verification gate.
//!
//! ## Routes
//!
//! | Method | Path                 | Purpose                                   |
//! |--------|----------------------|-------------------------------------------|
//! | POST   | `/tools/:endpoint_id`| Verify a signed call and run its tool     |
//! | GET    | `/health`            | Liveness probe, unauthenticated           |
//!
//! A signed call carries `{"parameters": {...}, "eventId": "..."}` with the
//! `X-Event-Id`, `X-Timestamp` and `X-Signature` headers. The raw body bytes
//! are verified before anything is parsed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

use toolgate_auth::{SecurityHeaders, VerificationGate};
use toolgate_common::ApplicationSecret;
use toolgate_tools::{CurrentTimeTool, EchoTool, ToolContext, ToolImplementation};

use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};

/// Resolves a built-in tool by name.
#[must_use]
pub fn builtin_tool(name: &str) -> Option<Arc<dyn ToolImplementation>> {
    match name {
        "get_current_time" => Some(Arc::new(CurrentTimeTool)),
        "echo" => Some(Arc::new(EchoTool)),
        _ => None,
    }
}

/// One endpoint: its gate and the tool run for verified calls.
struct HostedEndpoint {
    gate: VerificationGate,
    tool: Arc<dyn ToolImplementation>,
}

/// Shared state for request handlers.
pub struct AppState {
    endpoints: HashMap<String, HostedEndpoint>,
}

impl AppState {
    /// Creates an empty endpoint table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoints: HashMap::new(),
        }
    }

    /// Builds the endpoint table from configuration.
    ///
    /// A `None` secret keeps every endpoint mounted but refusing calls with a
    /// server error until setup completes.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint names an unknown tool.
    pub fn from_config(
        config: &DaemonConfig,
        application_secret: Option<&ApplicationSecret>,
    ) -> Result<Self> {
        let mut state = Self::new();

        for endpoint in &config.endpoints {
            let tool = builtin_tool(&endpoint.tool).ok_or_else(|| {
                DaemonError::Config(format!("Unknown tool '{}'", endpoint.tool))
            })?;
            let gate = VerificationGate::new(endpoint.id.clone(), application_secret.cloned())
                .with_freshness_window(config.settings.freshness_window_secs);
            state.mount(gate, tool);
        }

        Ok(state)
    }

    /// Mounts `tool` under the gate's endpoint id, replacing any previous one.
    pub fn mount(&mut self, gate: VerificationGate, tool: Arc<dyn ToolImplementation>) {
        let id = gate.endpoint_id().to_string();
        self.endpoints.insert(id, HostedEndpoint { gate, tool });
    }

    /// Number of mounted endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether no endpoint is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tools/:endpoint_id", post(handle_tool_call))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves `state` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, endpoints = state.len(), "Serving tool endpoints");
    }

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Handle GET /health
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct CallRequest {
    parameters: Option<Value>,
}

/// Handle POST /tools/:endpoint_id
#[instrument(skip_all, fields(endpoint_id = %endpoint_id))]
async fn handle_tool_call(
    State(state): State<Arc<AppState>>,
    Path(endpoint_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Json<Value>, ApiError> {
    let endpoint = state
        .endpoints
        .get(&endpoint_id)
        .ok_or_else(|| ApiError::not_found(&endpoint_id))?;

    let security = SecurityHeaders::from_lookup(|name| {
        headers.get(name).and_then(|value| value.to_str().ok())
    });

    let verified = endpoint.gate.verify(&security, &body).map_err(|e| {
        warn!(reason = %e, "Rejected tool call");
        let status = StatusCode::from_u16(e.status().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ApiError::new(status, e.public_message(), "authentication_error")
    })?;

    let request: CallRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Malformed request body: {e}")))?;
    let parameters = request
        .parameters
        .ok_or_else(|| ApiError::bad_request("Missing parameters"))?;

    let ctx = ToolContext::new(verified.event_id.clone());
    let output = endpoint.tool.execute(&parameters, &ctx).await.map_err(|e| {
        error!(event_id = %verified.event_id, error = %e, "Tool execution failed");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Tool execution failed: {e}"),
            "tool_error",
        )
    })?;

    info!(event_id = %verified.event_id, "Tool call completed");

    let result = serde_json::from_str(&output).unwrap_or(Value::String(output));
    Ok(Json(json!({ "result": result })))
}

/// Error response with a JSON body of the form `{"error": {"message", "type"}}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    kind: &'static str,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>, kind: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            kind,
        }
    }

    fn not_found(endpoint_id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("Unknown endpoint '{endpoint_id}'"),
            "not_found",
        )
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "invalid_request")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "message": self.message,
                "type": self.kind,
            }
        });

        (self.status, Json(body)).into_response()
    }
}
