//! Typed error definitions for the fhub client.
//!
//! [`FhubError`] covers every failure the streaming core can observe. Most of
//! them never leave the background task: they are published on the
//! subscription's observer channel and the stream keeps running. Only
//! `connect` and `close` return them to the caller directly.

use std::time::Duration;

use thiserror::Error;

/// Result alias used across the fhub crates.
pub type Result<T> = std::result::Result<T, FhubError>;

/// Domain-specific errors for the fhub client.
#[derive(Debug, Clone, Error)]
pub enum FhubError {
    /// The connection did not reach the open state within the timeout.
    #[error("connection not ready after {0:?}")]
    ConnectTimeout(Duration),

    /// One inbound frame could not be decoded. The frame is skipped.
    #[error("decode error: {0}")]
    Decode(String),

    /// Network-level failure (DNS, TLS, handshake, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// Application error reported by the provider inside a frame.
    #[error("provider error: {0}")]
    Api(String),

    /// The user tick callback panicked.
    #[error("tick callback failed: {0}")]
    Callback(String),

    /// A send was attempted while the connection is not open.
    #[error("connection is not open")]
    NotOpen,

    /// Operation not allowed in the current subscription state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error while reading configuration or log files.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FhubError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for FhubError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}
