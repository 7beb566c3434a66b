//! State shared between a [`Subscription`](crate::Subscription) and its
//! background receive task.
//!
//! The symbol → ticker map is built once by `connect` and never changes
//! afterwards, so lookups need no lock. Each ticker has its own `RwLock`:
//! the dispatch worker is its only writer, callers read snapshots.
//!
//! ```text
//! transport task ── decode ──► bounded channel ──► dispatch worker (blocking thread)
//!                                                    apply_trade + on_tick
//! ```
//!
//! The tick callback runs on the worker, so a slow or blocking callback never
//! stalls the websocket read loop or the caller's runtime.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use fhub_core::ws::{CloseReason, Outbound, TransportHooks};
use fhub_core::{FhubError, Ticker, TradeTick};
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use tracing::{debug, error, info, trace, warn};

use crate::decoder::{self, FrameEvent};
use crate::event::{StreamEvent, StreamEventSender, SubscriptionState};

/// User callback invoked with the updated ticker after each trade.
pub type OnTick = Arc<dyn Fn(&Ticker) + Send + Sync>;

/// Shared, lockable handle to one symbol's ticker.
pub type TickerHandle = Arc<RwLock<Ticker>>;

pub(crate) struct Session {
    symbols: Vec<String>,
    tickers: AHashMap<String, TickerHandle>,
    on_tick: Option<OnTick>,
    state: Mutex<SubscriptionState>,
    close_reason: Mutex<Option<CloseReason>>,
    closed: AtomicBool,
    streamed: AtomicBool,
    dispatch_tx: Mutex<Option<Sender<TradeTick>>>,
    events: StreamEventSender,
    trace_frames: bool,
}

impl Session {
    /// One ticker per distinct symbol, in first-seen order.
    pub(crate) fn new<S: AsRef<str>>(
        symbols: &[S],
        max_history: usize,
        on_tick: Option<OnTick>,
        dispatch_tx: Sender<TradeTick>,
        events: StreamEventSender,
        trace_frames: bool,
    ) -> Self {
        let mut ordered = Vec::with_capacity(symbols.len());
        let mut tickers = AHashMap::with_capacity(symbols.len());
        for sym in symbols {
            let sym = sym.as_ref();
            if tickers.contains_key(sym) {
                continue;
            }
            tickers.insert(sym.to_string(), Arc::new(RwLock::new(Ticker::new(sym, max_history))));
            ordered.push(sym.to_string());
        }
        Self {
            symbols: ordered,
            tickers,
            on_tick,
            state: Mutex::new(SubscriptionState::Idle),
            close_reason: Mutex::new(None),
            closed: AtomicBool::new(false),
            streamed: AtomicBool::new(false),
            dispatch_tx: Mutex::new(Some(dispatch_tx)),
            events,
            trace_frames,
        }
    }

    pub(crate) fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub(crate) fn ticker(&self, symbol: &str) -> Option<&TickerHandle> {
        self.tickers.get(symbol)
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: SubscriptionState) {
        let mut current = self.state.lock();
        if *current != state {
            debug!("subscription state {} -> {state}", *current);
            *current = state;
        }
    }

    pub(crate) fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.lock().clone()
    }

    /// Whether the open hook ever completed its subscribe step.
    pub(crate) fn reached_streaming(&self) -> bool {
        self.streamed.load(Ordering::Acquire)
    }

    /// Stop dispatching. Frames and trades still in flight are dropped, and
    /// the dispatch worker exits once it sees the closed channel.
    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
        self.dispatch_tx.lock().take();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Hooks wiring a transport's events into this session.
    pub(crate) fn hooks(self: &Arc<Self>) -> TransportHooks {
        let (open, message, err, close) = (self.clone(), self.clone(), self.clone(), self.clone());
        TransportHooks {
            on_open: Arc::new(move |out: &Outbound| open.on_open(out)),
            on_message: Arc::new(move |frame: &[u8]| message.on_frame(frame)),
            on_error: Arc::new(move |e: &FhubError| err.on_error(e)),
            on_close: Arc::new(move |reason: CloseReason| close.on_close(reason)),
        }
    }

    fn on_open(&self, outbound: &Outbound) {
        self.set_state(SubscriptionState::Subscribing);
        for sym in &self.symbols {
            if let Err(e) = outbound.send(decoder::subscribe_message(sym)) {
                warn!("subscribe {sym} failed: {e}");
                self.publish(StreamEvent::Error(e));
            }
        }
        info!("subscription started ({} symbols)", self.symbols.len());
        self.publish(StreamEvent::Opened {
            symbols: self.symbols.len(),
        });
        self.streamed.store(true, Ordering::Release);
        self.set_state(SubscriptionState::Streaming);
    }

    pub(crate) fn on_frame(&self, frame: &[u8]) {
        if self.is_closed() {
            return;
        }
        if self.trace_frames {
            trace!("frame: {}", String::from_utf8_lossy(frame));
        }
        match decoder::decode(frame) {
            Ok(Some(FrameEvent::Trades(trades))) => {
                for tick in trades {
                    if !self.enqueue_trade(tick) {
                        return;
                    }
                }
            }
            Ok(Some(FrameEvent::Error(msg))) => {
                warn!("provider error: {msg}");
                self.publish(StreamEvent::Error(FhubError::Api(msg)));
            }
            Ok(None) => {}
            Err(e) => {
                warn!("skipping frame: {e}");
                self.publish(StreamEvent::Error(e.into()));
            }
        }
    }

    /// Hand one trade to the dispatch worker. Returns `false` once the
    /// session is closed.
    fn enqueue_trade(&self, tick: TradeTick) -> bool {
        if self.is_closed() {
            return false;
        }
        if !self.tickers.contains_key(&tick.symbol) {
            debug!("dropping trade for untracked symbol {}", tick.symbol);
            return true;
        }
        let guard = self.dispatch_tx.lock();
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        match tx.try_send(tick) {
            Ok(()) => true,
            Err(TrySendError::Full(tick)) => {
                warn!("dispatch channel full, dropping trade for {}", tick.symbol);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Dispatch worker body: apply each queued trade and run the callback.
    ///
    /// Runs on a blocking thread until the session is closed.
    pub(crate) fn run_dispatch(&self, rx: Receiver<TradeTick>) {
        debug!("dispatch worker started");
        while let Ok(tick) = rx.recv() {
            if self.is_closed() {
                break;
            }
            self.dispatch_trade(&tick);
        }
        debug!("dispatch worker exited");
    }

    fn dispatch_trade(&self, tick: &TradeTick) {
        let Some(handle) = self.tickers.get(&tick.symbol) else {
            return;
        };

        let mut ticker = handle.write();
        ticker.apply_trade(tick.price, tick.volume, tick.timestamp);
        let ticker = RwLockWriteGuard::downgrade(ticker);

        let Some(on_tick) = &self.on_tick else {
            return;
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| on_tick(&*ticker))) {
            let msg = panic_message(panic.as_ref());
            error!("tick callback for {} panicked: {msg}", tick.symbol);
            self.publish(StreamEvent::Error(FhubError::Callback(format!("{}: {msg}", tick.symbol))));
        }
    }

    fn on_error(&self, err: &FhubError) {
        warn!("transport error: {err}");
        self.publish(StreamEvent::Error(err.clone()));
    }

    fn on_close(&self, reason: CloseReason) {
        let next = match &reason {
            CloseReason::Failed(_) if !self.is_closed() => SubscriptionState::Error,
            _ => SubscriptionState::Closed,
        };
        info!("subscription closed: {reason:?}");
        *self.close_reason.lock() = Some(reason.clone());
        self.set_state(next);
        self.publish(StreamEvent::Closed(reason));
    }

    fn publish(&self, event: StreamEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => warn!("observer channel full, dropping {event:?}"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".into()
    }
}
