//! Streaming connection transport.

pub mod client;
pub mod transport;

pub use client::{WsConnConfig, WsConnection};
pub use transport::{
    CloseReason, OnCloseCallback, OnErrorCallback, OnMessageCallback, OnOpenCallback, Outbound, Transport,
    TransportHooks,
};
