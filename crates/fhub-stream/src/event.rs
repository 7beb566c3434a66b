//! Subscription lifecycle state and observer events.
//!
//! Errors on the streaming path never reach the caller of `connect`. They are
//! published as [`StreamEvent`]s on a bounded crossbeam channel that the
//! application can drain from any thread.

use fhub_core::FhubError;
use fhub_core::ws::CloseReason;

/// Lifecycle of a [`Subscription`](crate::Subscription).
///
/// ```text
/// Idle ──connect──► Connecting ──open──► Subscribing ──► Streaming ──close──► Closed
///                        └──────────── transport failure ──────────────► Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    Connecting,
    Subscribing,
    Streaming,
    Closed,
    Error,
}

impl SubscriptionState {
    /// Whether the subscription holds a live (or opening) connection.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Subscribing | Self::Streaming)
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// An event published on the observer channel.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The connection opened and subscribe messages were queued.
    Opened {
        /// Number of symbols subscribed.
        symbols: usize,
    },

    /// The connection ended.
    Closed(CloseReason),

    /// A non-fatal error. The stream keeps running.
    Error(FhubError),
}

/// Sender half of the observer channel.
pub type StreamEventSender = crossbeam_channel::Sender<StreamEvent>;

/// Receiver half of the observer channel.
pub type StreamEventReceiver = crossbeam_channel::Receiver<StreamEvent>;
