//! # fhub-runner
//!
//! Streams live trades for a set of symbols and logs every ticker update.
//!
//! Settings come from an optional JSON config file; command-line flags
//! override it. The API key may also come from `FINNHUB_API_KEY`.
//!
//! # Usage
//!
//! ```bash
//! fhub-runner --symbols AAPL,MSFT,BINANCE:BTCUSDT --log-level info
//! fhub-runner config.json --max-history 50
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use fhub_core::config::AppConfig;
use fhub_core::{Ticker, config, logging};
use fhub_stream::{OnTick, StreamEvent, Subscription};
use tracing::{error, info, warn};

/// Finnhub live trade stream runner.
#[derive(Parser)]
#[command(name = "fhub-runner", about = "Finnhub live trade stream runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: Option<PathBuf>,

    /// Symbols to subscribe, comma separated.
    #[arg(short, long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// API key (overrides the config file and FINNHUB_API_KEY).
    #[arg(long)]
    api_key: Option<String>,

    /// Trades kept per symbol.
    #[arg(long)]
    max_history: Option<usize>,

    /// Connect timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_config(path)?,
            None => AppConfig::default(),
        };
        if !self.symbols.is_empty() {
            cfg.stream.symbols = self.symbols;
        }
        if self.api_key.is_some() {
            cfg.stream.api_key = self.api_key;
        }
        if let Some(n) = self.max_history {
            cfg.stream.max_history = n;
        }
        if let Some(secs) = self.timeout {
            cfg.stream.connect_timeout_sec = secs;
        }
        if let Some(level) = self.log_level {
            cfg.logging.level = level;
        }
        if self.log_dir.is_some() {
            cfg.logging.log_dir = self.log_dir;
        }
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Cli::parse().into_config()?;

    // 1. Initialize logging
    logging::init_logging(&cfg.logging)?;

    let stream = &cfg.stream;
    if stream.symbols.is_empty() {
        bail!("no symbols given; pass --symbols or set stream.symbols in the config file");
    }
    info!("fhub-runner starting, symbols={:?}, max_history={}", stream.symbols, stream.max_history);

    // 2. Build the subscription
    let mut sub = Subscription::from_config(stream)?;

    // 3. Forward observer events to the log
    let events = sub.events();
    let observer = tokio::task::spawn_blocking(move || {
        for event in events.iter() {
            match event {
                StreamEvent::Opened { symbols } => info!("stream open, {symbols} symbol(s) subscribed"),
                StreamEvent::Closed(reason) => info!("stream closed: {reason:?}"),
                StreamEvent::Error(e) => warn!("stream error: {e}"),
            }
        }
    });

    // 4. Connect
    let on_tick: OnTick = Arc::new(|t: &Ticker| info!("{t}"));
    let timeout = Duration::from_secs(stream.connect_timeout_sec);
    if let Err(e) = sub.connect(&stream.symbols, Some(on_tick), stream.max_history, timeout).await {
        error!("connect failed: {e}");
        drop(sub);
        observer.await?;
        return Err(e.into());
    }
    info!("streaming, press Ctrl+C to stop");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    sub.close().await;
    drop(sub);
    observer.await?;

    info!("goodbye");
    Ok(())
}
