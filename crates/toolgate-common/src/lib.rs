//! # toolgate-common
//!
//! Shared types and collaborator contracts for signed LLM tool calls.
//!
//! This crate provides the foundational types used on both sides of a signed
//! tool call:
//! - Tool descriptors for dynamically registered HTTP endpoints
//! - Model-facing tool definitions and tool call records
//! - Client and retry configuration
//! - The application secret and the store it is persisted in
//! - The pending-operation event sink the generation loop reports into
//!
//! ## Example
//!
//! ```
//! use toolgate_common::{ToolCall, ToolDescriptor};
//!
//! // Describe a remote tool endpoint
//! let descriptor = ToolDescriptor::builder()
//!     .identifier("tool-weather")
//!     .name("get_weather")
//!     .description("Look up the current weather for a city")
//!     .schema(serde_json::json!({
//!         "type": "object",
//!         "properties": { "city": { "type": "string" } },
//!         "required": ["city"],
//!     }))
//!     .url("https://tools.example.com/tools/tool-weather")
//!     .build();
//!
//! assert!(descriptor.validate().is_ok());
//!
//! // The definition handed to the model
//! let tool = descriptor.to_definition();
//! assert_eq!(tool.function.name, "get_weather");
//!
//! // A call the model asked for
//! let call = ToolCall::new("get_weather", serde_json::json!({ "city": "Lisbon" }));
//! assert_eq!(call.name, "get_weather");
//! ```

/// Client, timeout and retry configuration.
pub mod client;
/// Pending-operation and event emission contract.
pub mod events;
/// Application secret and its persistence contract.
pub mod secret;
/// Tool descriptors, definitions and calls.
pub mod tools;

pub use client::{ClientConfig, RetryConfig};
pub use events::{EmitTarget, EventSink, PendingHandle};
pub use secret::{ApplicationSecret, SecretStore};
pub use tools::{DescriptorError, Function, Tool, ToolCall, ToolDescriptor};
