//! # toolgate-tools
//!
//! Tool execution framework and the signed remote tool bridge.
//!
//! This crate provides a flexible system for defining, registering, and executing tools
//! that can be called by Large Language Models (LLMs). Tools may run in-process or live
//! behind an HTTP endpoint that verifies signed calls.
//!
//! ## Core Components
//!
//! - [`ToolImplementation`]: Trait for defining custom tools with execution logic
//! - [`ToolContext`]: Per-call event id, progress sink and cancellation token
//! - [`ToolRegistry`]: Thread-safe registry for managing tool definitions
//! - [`ToolExecutor`]: High-level interface for tool execution with argument parsing
//! - [`RemoteTool`] / [`RemoteToolSet`]: Bridge from descriptors to signed, retried HTTP calls
//!
//! ## Built-in Tools
//!
//! - [`CurrentTimeTool`]: Returns the current UTC time
//! - [`EchoTool`]: Returns its arguments unchanged
//!
//! ## Example: Creating and Executing a Custom Tool
//!
//! ```rust
//! use toolgate_tools::{ToolContext, ToolExecutor, ToolImplementation};
//! use toolgate_common::{Function, Tool, ToolCall};
//! use serde_json::{json, Value};
//! use async_trait::async_trait;
//! use anyhow::Result;
//!
//! // Define a custom tool
//! struct GreetingTool;
//!
//! #[async_trait]
//! impl ToolImplementation for GreetingTool {
//!     fn get_definition(&self) -> Tool {
//!         Tool::builder()
//!             .function(Function {
//!                 name: "greet".to_string(),
//!                 description: "Greet a person by name".to_string(),
//!                 parameters: json!({
//!                     "type": "object",
//!                     "properties": {
//!                         "name": { "type": "string", "description": "The person's name" }
//!                     },
//!                     "required": ["name"]
//!                 }),
//!             })
//!             .build()
//!     }
//!
//!     async fn execute(&self, args: &Value, _ctx: &ToolContext) -> Result<String> {
//!         let name = args["name"].as_str().unwrap_or("stranger");
//!         Ok(format!("Hello, {name}!"))
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let mut executor = ToolExecutor::new();
//! executor.add_tool(GreetingTool);
//!
//! let call = ToolCall::new("greet", json!({ "name": "Ada" }));
//! let output = executor.execute_tool(&call, &ToolContext::new("evt-1")).await?;
//! assert_eq!(output, "Hello, Ada!");
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! The [`ToolRegistry`] uses `DashMap` for concurrent access, making it safe to use
//! from multiple async tasks without additional synchronization.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use toolgate_common::{Tool, ToolCall};

pub mod generic;
pub mod remote;

pub use generic::{CurrentTimeTool, EchoTool};
pub use remote::{InvocationError, RemoteTool, RemoteToolSet};

/// Receives human-readable status text while a tool runs.
pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-call context handed to every tool execution.
#[derive(Clone)]
pub struct ToolContext {
    /// Event identifier the call belongs to.
    pub event_id: String,
    /// Where retry and progress messages go, if anywhere.
    pub progress: Option<ProgressCallback>,
    /// Abandons the call when triggered.
    pub cancel: CancellationToken,
}

impl ToolContext {
    /// Creates a context with no progress sink and a fresh cancellation token.
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Ties the call to `cancel`.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Forwards `status` to the progress sink, if one is set.
    pub fn report(&self, status: &str) {
        if let Some(ref progress) = self.progress {
            progress(status);
        }
    }
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("event_id", &self.event_id)
            .field("progress", &self.progress.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// A tool the model can call.
///
/// Implementations run in-process (the built-in tools) or forward to a signed
/// HTTP endpoint ([`RemoteTool`]).
#[async_trait]
pub trait ToolImplementation: Send + Sync {
    /// Model-facing definition; its function name is the registry key.
    fn get_definition(&self) -> Tool;

    /// Runs the tool with parsed arguments and returns its output as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot produce a result.
    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<String>;
}

/// Thread-safe map from tool name to implementation.
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn ToolImplementation>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: Arc::new(DashMap::new()),
        }
    }

    /// Registers `tool` under its definition name, replacing any previous tool of that name.
    pub fn register(&self, tool: Arc<dyn ToolImplementation>) {
        let name = tool.get_definition().function.name;
        if self.tools.insert(name.clone(), tool).is_some() {
            log::warn!("Tool '{name}' registered twice; keeping the latest");
        }
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolImplementation>> {
        self.tools.get(name).map(|r| r.value().clone())
    }

    /// Definitions of every registered tool, in no particular order.
    #[must_use]
    pub fn get_all_definitions(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.get_definition()).collect()
    }
}

/// Runs model-requested [`ToolCall`]s against a [`ToolRegistry`].
pub struct ToolExecutor {
    registry: ToolRegistry,
}

impl ToolExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: ToolRegistry::new(),
        }
    }

    pub fn add_tool<T: ToolImplementation + 'static>(&mut self, tool: T) {
        self.registry.register(Arc::new(tool));
    }

    pub fn add_tool_arc(&mut self, tool: Arc<dyn ToolImplementation>) {
        self.registry.register(tool);
    }

    /// Definitions to hand to the model.
    #[must_use]
    pub fn get_all_tools(&self) -> Vec<Tool> {
        self.registry.get_all_definitions()
    }

    /// Execute a tool call.
    ///
    /// # Errors
    /// Returns an error if the tool is not found or if execution fails.
    pub async fn execute_tool(&self, tool_call: &ToolCall, ctx: &ToolContext) -> Result<String> {
        let tool = self
            .registry
            .get(&tool_call.name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: '{}'", tool_call.name))?;

        let args = Self::parse_arguments(&tool_call.arguments);

        tool.execute(&args, ctx).await
    }

    /// Normalizes model-produced arguments.
    ///
    /// Missing arguments become an empty object; arguments delivered as a JSON
    /// string are decoded, falling back to the raw string.
    fn parse_arguments(arguments: &Value) -> Value {
        match arguments {
            Value::Null => Value::Object(serde_json::Map::new()),
            Value::String(raw) if raw.trim().is_empty() => Value::Object(serde_json::Map::new()),
            Value::String(raw) => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
            }
            other => other.clone(),
        }
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}
