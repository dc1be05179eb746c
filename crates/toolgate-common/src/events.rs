//! Pending-operation event contract.
//!
//! The platform that hosts the generation loop owns the event queue and the
//! lifecycle of pending operations. This crate only names the narrow surface
//! the signing core calls into: create a pending handle, update its status
//! text, emit a result against it, or cancel it with a reason.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque handle for in-flight generation work owned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingHandle(pub String);

impl PendingHandle {
    /// Wraps a platform-issued handle id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw handle id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PendingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an emitted payload is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmitTarget {
    /// Resolve the given pending operation with this payload.
    Complete(PendingHandle),
    /// Emit a fresh event, linked to its parents.
    #[serde(rename_all = "camelCase")]
    Echo {
        /// Event ids the emitted event descends from.
        secondary_parent_event_ids: Vec<String>,
    },
}

/// Event and pending-operation sink provided by the orchestration platform.
///
/// Implementations must be safe to call concurrently: several tool calls from
/// one generation step may report at the same time.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Registers in-flight work and returns its handle.
    async fn create_pending(&self, status: &str) -> Result<PendingHandle>;

    /// Replaces the status text shown for a pending operation.
    async fn update_pending(&self, handle: &PendingHandle, status: &str) -> Result<()>;

    /// Emits a payload, either completing a pending operation or as a new event.
    async fn emit(&self, payload: serde_json::Value, target: EmitTarget) -> Result<()>;

    /// Marks a pending operation as failed with a human-readable reason.
    async fn cancel_pending(&self, handle: &PendingHandle, reason: &str) -> Result<()>;
}
