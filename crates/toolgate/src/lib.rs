//! # toolgate
//!
//! Signed, retried tool calls for LLM generation loops.
//!
//! Toolgate lets a generation loop call tools that live behind HTTP endpoints it
//! does not control. Each call is signed with a key derived for that endpoint,
//! retried on transient failures, and reported to the platform as a pending
//! operation that is always resolved.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use toolgate::{
//!     ApplicationSecret, ClientConfig, Core, EventSink, HttpTransport, RemoteToolSet,
//!     ToolCall, ToolDescriptor, ToolTransport,
//! };
//!
//! # async fn example(sink: Arc<dyn EventSink>) -> anyhow::Result<()> {
//! let config = ClientConfig::default();
//! let transport: Arc<dyn ToolTransport> = Arc::new(HttpTransport::new(config.clone())?);
//!
//! let descriptors = vec![
//!     ToolDescriptor::builder()
//!         .identifier("tool-weather")
//!         .name("get_weather")
//!         .description("Look up the current weather for a city")
//!         .url("https://tools.example.com/tools/tool-weather")
//!         .build(),
//! ];
//!
//! let tools = RemoteToolSet::from_descriptors(
//!     descriptors,
//!     &transport,
//!     &ApplicationSecret::new("application secret"),
//!     &config.retry,
//! )?;
//! let core = Core::new(tools.into_executor(), sink);
//!
//! // Hand `core.tools()` to the model, then run what it asks for.
//! let call = ToolCall::new("get_weather", serde_json::json!({ "city": "Lisbon" }));
//! let results = core.run_tool_calls("evt-1", &[call]).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Per-endpoint keys**: every endpoint verifies with its own derived key
//! - **Bounded retries**: timeouts, resets, DNS failures and HTTP 504 back off and retry
//! - **Pending operations**: progress, results and failures flow to the platform's sink
//! - **Cancellation**: abandoning a generation step stops its retry sequences

pub mod core;
pub mod error;
pub mod events;

pub use toolgate_client::*;
pub use toolgate_common::*;
pub use toolgate_tools::*;

pub use toolgate_auth::{
    SecurityHeaders, Signer, VerificationGate, derive_endpoint_secret, ensure_application_secret,
};

pub use core::Core;
pub use error::CoreError;
pub use events::{CoreEvent, EventCallback};
