//! Event types for Core orchestration
//!
//! These are **observability** hooks: fire-and-forget notifications about tool
//! calls as they run. The authoritative record of each call still goes through
//! the platform's [`EventSink`](toolgate_common::EventSink); the callback only
//! mirrors it for logging, metrics or UIs embedded in the host process.

use std::future::Future;
use std::pin::Pin;

/// Events emitted by Core while running tool calls
///
/// Core awaits the callback but does not react to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// A tool call failed transiently and is about to be retried
    ToolRetrying {
        /// Name of the tool being retried
        name: String,
        /// Status text forwarded to the pending operation
        status: String,
    },

    /// Tool execution completed with result
    ToolResult {
        /// Name of the tool that was executed
        name: String,
        /// Result or error message from execution
        result: String,
        /// Whether execution succeeded
        success: bool,
    },
}

/// Async callback for receiving Core events
///
/// Returns `()` because events are notifications, not control flow decisions.
pub type EventCallback =
    Box<dyn Fn(CoreEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;
