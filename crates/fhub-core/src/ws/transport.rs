//! The seam between a subscription and its network connection.
//!
//! A [`Transport`] owns one connection and runs its receive loop on a
//! background tokio task. It reports what happens through [`TransportHooks`]:
//!
//! ```text
//! open() ──► on_open(outbound) ──► on_message(frame)* ──► on_close(reason)
//!                 └─────────── on_error(err) at any point ──────┘
//! ```
//!
//! `on_close` fires exactly once per opened transport, and nothing fires after
//! [`Transport::close`] returns.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{FhubError, Result};

/// Invoked once the connection is established. The [`Outbound`] handle
/// queues messages on the connection being opened.
pub type OnOpenCallback = Arc<dyn Fn(&Outbound) + Send + Sync>;

/// Invoked for each inbound text or binary frame.
pub type OnMessageCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Invoked for each transport-level failure.
pub type OnErrorCallback = Arc<dyn Fn(&FhubError) + Send + Sync>;

/// Invoked exactly once when the receive loop ends.
pub type OnCloseCallback = Arc<dyn Fn(CloseReason) + Send + Sync>;

/// Event hooks a transport reports through.
#[derive(Clone)]
pub struct TransportHooks {
    pub on_open: OnOpenCallback,
    pub on_message: OnMessageCallback,
    pub on_error: OnErrorCallback,
    pub on_close: OnCloseCallback,
}

impl Default for TransportHooks {
    fn default() -> Self {
        Self {
            on_open: Arc::new(|_: &Outbound| {}),
            on_message: Arc::new(|_: &[u8]| {}),
            on_error: Arc::new(|_: &FhubError| {}),
            on_close: Arc::new(|_: CloseReason| {}),
        }
    }
}

impl std::fmt::Debug for TransportHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHooks").finish_non_exhaustive()
    }
}

/// Why a receive loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// [`Transport::close`] was called.
    Requested,
    /// The server closed the connection or the stream ended.
    Remote,
    /// The connection could not be established or broke with an error.
    Failed(String),
}

/// Queue for outbound text messages on one connection.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<String>,
}

impl Outbound {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Queue a message. Fails with [`FhubError::NotOpen`] once the receive
    /// loop has ended.
    pub fn send(&self, msg: impl Into<String>) -> Result<()> {
        self.tx.send(msg.into()).map_err(|_| FhubError::NotOpen)
    }
}

/// One persistent bidirectional streaming connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start the background receive loop and return immediately.
    ///
    /// Fails if the transport was already opened or no tokio runtime is
    /// running. Connection failures are reported through the hooks.
    fn open(&mut self, hooks: TransportHooks) -> Result<()>;

    /// Queue a message on the open connection.
    fn send(&self, msg: String) -> Result<()>;

    /// Request shutdown and wait for the receive loop to finish. Idempotent.
    async fn close(&mut self);

    /// Whether the connection is currently open.
    fn is_open(&self) -> bool;
}
