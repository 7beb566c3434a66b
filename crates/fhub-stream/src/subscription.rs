//! Live trade subscription.
//!
//! A [`Subscription`] owns one [`Transport`], the set of [`Ticker`]s for the
//! symbols it tracks, and the observer channel. `connect` opens the transport,
//! waits (bounded) for the subscribe messages to go out, and returns; from
//! then on every trade frame is decoded on the transport's background task
//! and handed to a blocking dispatch worker that updates the ticker and runs
//! the callback.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use fhub_stream::{OnTick, Subscription};
//!
//! # async fn run() -> fhub_core::Result<()> {
//! let mut sub = Subscription::new("api-key")?;
//! let on_tick: OnTick = Arc::new(|t: &fhub_core::Ticker| println!("{t}"));
//! sub.connect(&["AAPL", "MSFT"], Some(on_tick), 1000, Duration::from_secs(5)).await?;
//! // ...
//! sub.close().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use fhub_core::config::StreamConfig;
use fhub_core::ws::{CloseReason, Transport, WsConnConfig, WsConnection};
use fhub_core::{FhubError, Result, Ticker};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::event::{StreamEvent, StreamEventReceiver, StreamEventSender, SubscriptionState};
use crate::session::{OnTick, Session, TickerHandle};

/// One streaming session covering a fixed set of symbols.
pub struct Subscription {
    config: StreamConfig,
    transport: Box<dyn Transport>,
    session: Option<Arc<Session>>,
    dispatcher: Option<tokio::task::JoinHandle<()>>,
    closed: bool,
    events_tx: StreamEventSender,
    events_rx: StreamEventReceiver,
}

impl Subscription {
    /// Subscription against the default endpoint with default settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::from_config(&StreamConfig::with_api_key(api_key))
    }

    /// Subscription over a websocket built from `config`.
    pub fn from_config(config: &StreamConfig) -> Result<Self> {
        config.validate()?;
        let ws = WsConnConfig {
            url: config.endpoint_url()?,
            ping_interval: config.ping_interval(),
            label: "fhub-ws".into(),
        };
        Ok(Self::with_transport(config.clone(), WsConnection::new(ws)))
    }

    /// Subscription over any transport.
    pub fn with_transport(config: StreamConfig, transport: impl Transport + 'static) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::bounded(config.event_capacity.max(1));
        Self {
            config,
            transport: Box::new(transport),
            session: None,
            dispatcher: None,
            closed: false,
            events_tx,
            events_rx,
        }
    }

    /// Open the connection and subscribe to `symbols`.
    ///
    /// Creates one ticker per symbol, opens the transport, and waits until the
    /// subscribe messages are queued. Fails with [`FhubError::ConnectTimeout`]
    /// if that does not happen within `timeout`, or [`FhubError::Transport`]
    /// if the connection fails first; the transport is closed in both cases.
    pub async fn connect<S: AsRef<str>>(
        &mut self,
        symbols: &[S],
        on_tick: Option<OnTick>,
        max_history: usize,
        timeout: Duration,
    ) -> Result<()> {
        let state = self.state();
        if state != SubscriptionState::Idle {
            return Err(FhubError::InvalidState(format!("connect called while {state}")));
        }
        if symbols.is_empty() {
            return Err(FhubError::Config("no symbols to subscribe".into()));
        }

        info!("starting connection for {} symbol(s)", symbols.len());
        let (dispatch_tx, dispatch_rx) = crossbeam_channel::bounded(self.config.dispatch_capacity.max(1));
        let session = Arc::new(Session::new(
            symbols,
            max_history,
            on_tick,
            dispatch_tx,
            self.events_tx.clone(),
            self.config.trace_frames,
        ));
        session.set_state(SubscriptionState::Connecting);
        self.session = Some(session.clone());

        if let Err(e) = self.transport.open(session.hooks()) {
            error!("could not open transport: {e}");
            session.set_state(SubscriptionState::Error);
            return Err(e);
        }

        let worker = session.clone();
        self.dispatcher = Some(tokio::task::spawn_blocking(move || worker.run_dispatch(dispatch_rx)));

        if let Err(e) = self.wait_ready(&session, timeout).await {
            error!("connection failed: {e}");
            self.close().await;
            return Err(e);
        }
        Ok(())
    }

    /// Poll the session state until it is streaming or `timeout` elapses.
    ///
    /// A timeout too large to represent as a deadline waits without bound.
    async fn wait_ready(&self, session: &Session, timeout: Duration) -> Result<()> {
        let deadline = Instant::now().checked_add(timeout);
        let poll = self.config.ready_poll_interval();
        loop {
            match session.state() {
                SubscriptionState::Streaming => return Ok(()),
                SubscriptionState::Closed if session.reached_streaming() => {
                    info!("connection closed right after subscribing");
                    return Ok(());
                }
                SubscriptionState::Error | SubscriptionState::Closed => {
                    let msg = match session.close_reason() {
                        Some(CloseReason::Failed(msg)) => msg,
                        _ => "connection closed before it was ready".into(),
                    };
                    return Err(FhubError::Transport(msg));
                }
                _ => {}
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(FhubError::ConnectTimeout(timeout));
                    }
                    poll.min(deadline - now)
                }
                None => poll,
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Close the connection. Idempotent.
    ///
    /// Once this returns the tick callback is never invoked again, even for
    /// frames that were already received. A callback already running is
    /// waited for. Tickers are dropped.
    pub async fn close(&mut self) {
        let Some(session) = self.session.take() else {
            debug!("close: no active session");
            return;
        };
        session.mark_closed();
        self.transport.close().await;
        if let Some(worker) = self.dispatcher.take()
            && let Err(e) = worker.await
        {
            warn!("dispatch worker ended abnormally: {e}");
        }
        session.set_state(SubscriptionState::Closed);
        self.closed = true;
        info!("subscription closed by caller");
    }

    pub fn state(&self) -> SubscriptionState {
        match &self.session {
            Some(session) => session.state(),
            None if self.closed => SubscriptionState::Closed,
            None => SubscriptionState::Idle,
        }
    }

    /// Tracked symbols, in subscription order.
    pub fn symbols(&self) -> &[String] {
        self.session.as_deref().map(Session::symbols).unwrap_or(&[])
    }

    /// Snapshot of one symbol's ticker.
    pub fn ticker(&self, symbol: &str) -> Option<Ticker> {
        self.ticker_handle(symbol).map(|h| h.read().clone())
    }

    /// Shared handle to one symbol's ticker, for reading without copying.
    pub fn ticker_handle(&self, symbol: &str) -> Option<TickerHandle> {
        self.session.as_ref()?.ticker(symbol).cloned()
    }

    /// Observer channel for non-fatal errors and lifecycle events.
    pub fn events(&self) -> StreamEventReceiver {
        self.events_rx.clone()
    }

    /// Drain the events currently queued on the observer channel.
    pub fn drain_events(&self) -> Vec<StreamEvent> {
        self.events_rx.try_iter().collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The transport task ends once its shutdown sender is dropped and the
        // dispatch worker once its channel closes; neither may reach the
        // callback in between.
        if let Some(session) = &self.session {
            session.mark_closed();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("state", &self.state())
            .field("symbols", &self.symbols())
            .finish_non_exhaustive()
    }
}
