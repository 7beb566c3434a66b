//! Per-symbol live state: the latest trade plus a bounded rolling history.
//!
//! History is a `VecDeque` used as a FIFO ring: each trade is pushed to the
//! back and, once the bound is exceeded, the front is popped. Both operations
//! are O(1), so retention cost does not grow with `max_history`.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::trade::TradeRecord;

/// Default number of trades retained per symbol.
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Latest known market state for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticker {
    symbol: String,
    price: Option<f64>,
    volume: Option<f64>,
    timestamp: Option<DateTime<Utc>>,
    trade_count: u64,
    max_history: usize,
    history: VecDeque<TradeRecord>,
}

impl Ticker {
    /// Create an empty ticker. `max_history = 0` disables history retention.
    pub fn new(symbol: impl Into<String>, max_history: usize) -> Self {
        Self {
            symbol: symbol.into(),
            price: None,
            volume: None,
            timestamp: None,
            trade_count: 0,
            max_history,
            // Capacity grows lazily; a 1000-deep history for a symbol that
            // never trades should not cost anything.
            history: VecDeque::new(),
        }
    }

    /// Record a trade as the latest state and append it to history.
    ///
    /// Values are taken as-is, with no sign or magnitude checks.
    pub fn apply_trade(&mut self, price: f64, volume: f64, timestamp: DateTime<Utc>) {
        self.price = Some(price);
        self.volume = Some(volume);
        self.timestamp = Some(timestamp);
        self.trade_count += 1;

        if self.max_history == 0 {
            return;
        }
        self.history.push_back(TradeRecord { price, volume, timestamp });
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn price(&self) -> Option<f64> {
        self.price
    }

    pub fn volume(&self) -> Option<f64> {
        self.volume
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Number of trades applied since creation, including evicted ones.
    pub fn trade_count(&self) -> u64 {
        self.trade_count
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Retained trades, oldest first.
    pub fn history(&self) -> &VecDeque<TradeRecord> {
        &self.history
    }

    /// The most recent trade, if any has been applied.
    pub fn last_trade(&self) -> Option<TradeRecord> {
        match (self.price, self.volume, self.timestamp) {
            (Some(price), Some(volume), Some(timestamp)) => Some(TradeRecord { price, volume, timestamp }),
            _ => None,
        }
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let price = self.price.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
        let volume = self.volume.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
        let ts = self.timestamp.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into());
        write!(
            f,
            "Ticker(symbol: {}, last price: {price}, last datetime: {ts}, last volume: {volume}, history records: {})",
            self.symbol,
            self.history.len()
        )
    }
}
