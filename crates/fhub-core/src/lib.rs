//! # fhub-core
//!
//! Core crate for the fhub live trade-stream client, providing:
//!
//! - **Types** (`types`): `Ticker` state, decoded trade ticks, history records
//! - **Configuration** (`config`): JSON config deserialization and validation
//! - **Error types** (`error`): domain-specific `FhubError` via thiserror
//! - **WebSocket** (`ws`): `Transport` trait and the tokio-tungstenite connection
//! - **Time utilities** (`time_util`): epoch-millisecond conversion
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;
pub mod ws;

pub use error::{FhubError, Result};
// Re-export types at crate root for convenience.
pub use types::*;
