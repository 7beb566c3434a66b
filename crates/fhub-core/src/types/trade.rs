//! Trade data flowing from the decoder to ticker state.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single executed trade, as decoded from a `trade` frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeTick {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
    /// Provider trade-condition codes. Empty when the frame carries none.
    pub conditions: Vec<String>,
}

/// One history entry of a [`Ticker`](super::Ticker).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeRecord {
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Display for TradeTick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade({} {}x{} at {})",
            self.symbol,
            self.price,
            self.volume,
            self.timestamp.to_rfc3339()
        )
    }
}
