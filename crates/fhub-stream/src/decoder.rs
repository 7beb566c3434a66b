//! Trade-stream frame decoder.
//!
//! Parses one inbound websocket frame into a [`FrameEvent`]:
//!
//! ```text
//! {"type":"trade","data":[{"s":"AAPL","p":150.2,"v":10,"t":1609459200000}]}  -> Trades
//! {"type":"error","msg":"bad symbol"}                                         -> Error
//! {"type":"ping"} / any other type                                            -> nothing
//! ```
//!
//! Trade fields are renamed (`s`, `p`, `v`, `t`, `c`) and the epoch-ms
//! timestamp becomes a UTC calendar timestamp.

use fhub_core::{FhubError, TradeTick, time_util};
use serde::Deserialize;
use thiserror::Error;

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// A batch of trades, in server order.
    Trades(Vec<TradeTick>),
    /// A provider-reported error message.
    Error(String),
}

/// A frame that could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("timestamp out of range for {symbol}: {millis}")]
    Timestamp { symbol: String, millis: i64 },
}

impl From<DecodeError> for FhubError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e.to_string())
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Envelope {
    Trade {
        #[serde(default)]
        data: Vec<RawTrade>,
    },
    Error {
        #[serde(default)]
        msg: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct RawTrade {
    s: String,
    p: f64,
    v: f64,
    t: i64,
    #[serde(default)]
    c: Option<Vec<String>>,
}

/// Decode one frame.
///
/// Returns `Ok(None)` for frame types the stream does not act on.
///
/// A trade batch decodes all or nothing: one bad record (malformed fields or
/// an out-of-range timestamp) fails the whole frame, and the valid trades in
/// it are dropped with it.
pub fn decode(frame: &[u8]) -> Result<Option<FrameEvent>, DecodeError> {
    match serde_json::from_slice::<Envelope>(frame)? {
        Envelope::Trade { data } => {
            let trades = data.into_iter().map(into_tick).collect::<Result<Vec<_>, _>>()?;
            Ok(Some(FrameEvent::Trades(trades)))
        }
        Envelope::Error { msg } => Ok(Some(FrameEvent::Error(msg))),
        Envelope::Other => Ok(None),
    }
}

/// [`decode`] for text frames.
#[inline]
pub fn decode_text(frame: &str) -> Result<Option<FrameEvent>, DecodeError> {
    decode(frame.as_bytes())
}

/// Build the subscribe message for one symbol.
pub fn subscribe_message(symbol: &str) -> String {
    serde_json::json!({ "type": "subscribe", "symbol": symbol }).to_string()
}

fn into_tick(raw: RawTrade) -> Result<TradeTick, DecodeError> {
    let timestamp = time_util::from_epoch_ms(raw.t).ok_or(DecodeError::Timestamp {
        symbol: raw.s.clone(),
        millis: raw.t,
    })?;
    Ok(TradeTick {
        symbol: raw.s,
        price: raw.p,
        volume: raw.v,
        timestamp,
        conditions: raw.c.unwrap_or_default(),
    })
}
