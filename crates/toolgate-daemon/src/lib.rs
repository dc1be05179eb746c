//! # toolgate-daemon
//!
//! Hosts built-in tools behind signed-request verification. Each configured
//! endpoint gets its own [`VerificationGate`](toolgate_auth::VerificationGate)
//! keyed by the endpoint id, so a signature made for one endpoint is refused by
//! every other.

pub mod config;
pub mod error;
pub mod paths;
pub mod secret_store;
pub mod server;

pub use config::{DaemonConfig, EndpointConfig, Settings};
pub use error::{DaemonError, Result};
pub use secret_store::FileSecretStore;
pub use server::{AppState, create_router, serve};
