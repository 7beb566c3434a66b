//! Configuration parsing for the fhub stream client.
//!
//! The runner reads its settings from a single JSON file with a `logging`
//! block and a `stream` block. Every field except the symbol list has a
//! default, and the API key may come from the environment instead.
//!
//! # Example config
//!
//! ```json
//! {
//!   "logging": { "level": "info", "log_dir": "/tmp/log", "module_name": "fhub" },
//!   "stream": {
//!     "symbols": ["AAPL", "MSFT", "BINANCE:BTCUSDT"],
//!     "max_history": 1000,
//!     "connect_timeout_sec": 5
//!   }
//! }
//! ```

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{FhubError, Result};
use crate::types::DEFAULT_MAX_HISTORY;

/// Environment variable consulted when `stream.api_key` is not set.
pub const API_KEY_ENV: &str = "FINNHUB_API_KEY";

/// Default streaming endpoint.
pub const DEFAULT_WS_URL: &str = "wss://ws.finnhub.io";

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Subscription settings.
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Logging settings consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default level if `RUST_LOG` is not set (e.g. `"info"`).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional directory for daily-rotating log files.
    pub log_dir: Option<String>,
    /// Log file prefix.
    #[serde(default = "default_module_name")]
    pub module_name: String,
    /// Emit console logs as JSON lines.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
            module_name: default_module_name(),
            json: false,
        }
    }
}

/// Settings for one streaming subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// API key. Falls back to the `FINNHUB_API_KEY` environment variable.
    pub api_key: Option<String>,

    /// Streaming endpoint without the token query parameter.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Symbols to subscribe (e.g. `["AAPL", "BINANCE:BTCUSDT"]`).
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Trades kept per symbol; 0 disables history.
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// How long `connect` waits for the connection to open.
    #[serde(default = "default_connect_timeout_sec")]
    pub connect_timeout_sec: u64,

    /// How often `connect` checks for readiness.
    #[serde(default = "default_ready_poll_interval_ms")]
    pub ready_poll_interval_ms: u64,

    /// Websocket ping keep-alive interval. Disabled when absent.
    pub ping_interval_sec: Option<u64>,

    /// Log every raw inbound frame at `trace` level.
    #[serde(default)]
    pub trace_frames: bool,

    /// Capacity of the observer event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Trades buffered between the receive task and the callback worker.
    /// Trades arriving while it is full are dropped with a warning.
    #[serde(default = "default_dispatch_capacity")]
    pub dispatch_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            ws_url: default_ws_url(),
            symbols: Vec::new(),
            max_history: default_max_history(),
            connect_timeout_sec: default_connect_timeout_sec(),
            ready_poll_interval_ms: default_ready_poll_interval_ms(),
            ping_interval_sec: None,
            trace_frames: false,
            event_capacity: default_event_capacity(),
            dispatch_capacity: default_dispatch_capacity(),
        }
    }
}

impl StreamConfig {
    /// Config with the given key and all defaults.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Returns the configured API key, or the one from the environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        let key = match &self.api_key {
            Some(k) => k.clone(),
            None => std::env::var(API_KEY_ENV)
                .map_err(|_| FhubError::Config(format!("no api_key configured and {API_KEY_ENV} not set")))?,
        };
        if key.trim().is_empty() {
            return Err(FhubError::Config("api_key is empty".into()));
        }
        Ok(key)
    }

    /// Full websocket URL with the API key as the `token` query parameter.
    pub fn endpoint_url(&self) -> Result<String> {
        let key = self.resolve_api_key()?;
        let mut url = Url::parse(&self.ws_url).map_err(|e| FhubError::Config(format!("ws_url: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(FhubError::Config(format!("ws_url must be ws:// or wss://, got {}", self.ws_url)));
        }
        url.query_pairs_mut().append_pair("token", &key);
        Ok(url.into())
    }

    /// Checks that the settings describe a connectable subscription.
    pub fn validate(&self) -> Result<()> {
        self.endpoint_url()?;
        if self.connect_timeout_sec == 0 {
            return Err(FhubError::Config("connect_timeout_sec must be > 0".into()));
        }
        if self.ready_poll_interval_ms == 0 {
            return Err(FhubError::Config("ready_poll_interval_ms must be > 0".into()));
        }
        if self.event_capacity == 0 {
            return Err(FhubError::Config("event_capacity must be > 0".into()));
        }
        if self.dispatch_capacity == 0 {
            return Err(FhubError::Config("dispatch_capacity must be > 0".into()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        self.ping_interval_sec.map(Duration::from_secs)
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_module_name() -> String {
    "fhub".into()
}

fn default_ws_url() -> String {
    DEFAULT_WS_URL.into()
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

fn default_connect_timeout_sec() -> u64 {
    5
}

fn default_ready_poll_interval_ms() -> u64 {
    100
}

fn default_event_capacity() -> usize {
    1024
}

fn default_dispatch_capacity() -> usize {
    8192
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
