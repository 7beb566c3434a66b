//! # fhub-stream
//!
//! Live trade streaming: subscribe to a fixed set of symbols over one
//! websocket and keep a [`Ticker`](fhub_core::Ticker) per symbol up to date.
//!
//! ## Architecture
//!
//! ```text
//! Subscription::connect ──► Transport::open ──► background task
//!                                                  │ frame
//!                                                  ▼
//!                                  decoder::decode ──► Session ──► dispatch worker
//!                                                         │            │
//!                                                   StreamEvent     Ticker::apply_trade
//!                                                                      │
//!                                                                  on_tick(&Ticker)
//! ```
//!
//! - [`decoder`]: frame → [`FrameEvent`]
//! - [`subscription`]: connection lifecycle and ticker access
//! - [`event`]: lifecycle state and observer events

pub mod decoder;
pub mod event;
mod session;
pub mod subscription;

pub use decoder::{DecodeError, FrameEvent};
pub use event::{StreamEvent, StreamEventReceiver, SubscriptionState};
pub use session::{OnTick, TickerHandle};
pub use subscription::Subscription;
