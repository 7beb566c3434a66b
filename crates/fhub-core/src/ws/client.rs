//! Single WebSocket connection with ping keep-alive.
//!
//! Each `WsConnection` runs as a tokio task that:
//! 1. Connects to the streaming endpoint (TLS).
//! 2. Reports the open connection through `on_open`.
//! 3. Reads frames and forwards them to `on_message`.
//! 4. Writes queued outbound messages and optional ping frames.
//! 5. Reports the end of the session through `on_close`.
//!
//! There is no reconnection: once the loop ends the connection stays closed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, error, info, warn};

use super::transport::{CloseReason, Outbound, Transport, TransportHooks};
use crate::error::{FhubError, Result};

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration for a single WebSocket connection.
#[derive(Debug, Clone)]
pub struct WsConnConfig {
    /// Full WebSocket URL, including any credential query parameters.
    pub url: String,
    /// Interval between WebSocket ping frames.
    pub ping_interval: Option<Duration>,
    /// Label used as the log prefix.
    pub label: String,
}

impl WsConnConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ping_interval: None,
            label: "ws".into(),
        }
    }
}

/// A single WebSocket connection managed by a background tokio task.
pub struct WsConnection {
    /// Connection configuration.
    pub config: WsConnConfig,
    /// Channel to send outbound messages.
    outbound_tx: Option<mpsc::UnboundedSender<String>>,
    /// Shutdown signal sender.
    shutdown_tx: Option<watch::Sender<bool>>,
    /// Task join handle.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Set while the socket is connected.
    open: Arc<AtomicBool>,
}

impl WsConnection {
    /// Create a new (not yet opened) connection.
    pub fn new(config: WsConnConfig) -> Self {
        Self {
            config,
            outbound_tx: None,
            shutdown_tx: None,
            task: None,
            open: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Transport for WsConnection {
    fn open(&mut self, hooks: TransportHooks) -> Result<()> {
        if self.shutdown_tx.is_some() {
            return Err(FhubError::InvalidState("transport already opened".into()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| FhubError::InvalidState(format!("no tokio runtime: {e}")))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let config = self.config.clone();
        let outbound = Outbound::new(outbound_tx.clone());
        let open = self.open.clone();

        let task = runtime.spawn(async move {
            let label = config.label.clone();
            let reason = connection_loop(config, &hooks, outbound, outbound_rx, shutdown_rx, &open).await;
            open.store(false, Ordering::Release);
            info!("[{label}] closed: {reason:?}");
            (hooks.on_close)(reason);
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.outbound_tx = Some(outbound_tx);
        self.task = Some(task);
        Ok(())
    }

    fn send(&self, msg: String) -> Result<()> {
        if !self.is_open() {
            return Err(FhubError::NotOpen);
        }
        match &self.outbound_tx {
            Some(tx) => tx.send(msg).map_err(|_| FhubError::NotOpen),
            None => Err(FhubError::NotOpen),
        }
    }

    async fn close(&mut self) {
        if let Some(tx) = &self.shutdown_tx {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!("[{}] connection task ended abnormally: {e}", self.config.label);
        }
        self.outbound_tx = None;
        self.open.store(false, Ordering::Release);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Connection loop: connect, then pump reads, writes and pings until shutdown.
///
/// Returns why the session ended; the caller fires `on_close` with it.
async fn connection_loop(
    config: WsConnConfig,
    hooks: &TransportHooks,
    outbound: Outbound,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
    open: &AtomicBool,
) -> CloseReason {
    let label = &config.label;

    if *shutdown_rx.borrow() {
        return CloseReason::Requested;
    }

    info!("[{label}] connecting to {}", display_url(&config.url));

    let ws_stream = tokio::select! {
        biased;
        _ = shutdown_rx.changed() => return CloseReason::Requested,
        res = connect_ws(&config.url) => match res {
            Ok(s) => s,
            Err(e) => {
                error!("[{label}] connection failed: {e}");
                (hooks.on_error)(&e);
                return CloseReason::Failed(e.to_string());
            }
        },
    };

    let (mut ws_write, mut ws_read) = ws_stream.split();
    open.store(true, Ordering::Release);
    info!("[{label}] connected");
    (hooks.on_open)(&outbound);

    let mut ping = config.ping_interval.map(|d| tokio::time::interval_at(Instant::now() + d, d));

    // Shutdown is polled first so no frame is delivered once close is requested.
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                info!("[{label}] shutdown signal received");
                let _ = ws_write.close().await;
                return CloseReason::Requested;
            }

            Some(msg) = outbound_rx.recv() => {
                debug!("[{label}] sending: {msg}");
                if let Err(e) = ws_write.send(Message::Text(msg.into())).await {
                    let err = FhubError::Transport(format!("send failed: {e}"));
                    error!("[{label}] {err}");
                    (hooks.on_error)(&err);
                    return CloseReason::Failed(err.to_string());
                }
            }

            msg = ws_read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        (hooks.on_message)(text.as_bytes());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        (hooks.on_message)(&data);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!("[{label}] received close frame: {frame:?}");
                        return CloseReason::Remote;
                    }
                    Some(Err(e)) => {
                        let err = FhubError::Transport(format!("read failed: {e}"));
                        error!("[{label}] {err}");
                        (hooks.on_error)(&err);
                        return CloseReason::Failed(err.to_string());
                    }
                    None => {
                        warn!("[{label}] stream ended");
                        return CloseReason::Remote;
                    }
                    _ => {} // Pong, Frame
                }
            }

            _ = ping_tick(&mut ping) => {
                if let Err(e) = ws_write.send(Message::Ping(Vec::new().into())).await {
                    let err = FhubError::Transport(format!("ping failed: {e}"));
                    error!("[{label}] {err}");
                    (hooks.on_error)(&err);
                    return CloseReason::Failed(err.to_string());
                }
            }
        }
    }
}

/// Next ping deadline, or never when pinging is disabled.
async fn ping_tick(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Establish a (possibly TLS) WebSocket connection.
async fn connect_ws(url: &str) -> Result<WsStream> {
    let request = url
        .into_client_request()
        .map_err(|e| FhubError::Transport(format!("invalid request: {e}")))?;
    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| FhubError::Transport(e.to_string()))?;
    Ok(stream)
}

/// URL without its query string, so credentials stay out of the logs.
fn display_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut u) => {
            u.set_query(None);
            u.to_string()
        }
        Err(_) => "<invalid url>".into(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::net::TcpListener;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum Seen {
        Open,
        Frame(Vec<u8>),
        Error,
        Close(CloseReason),
    }

    fn recording_hooks(greeting: Option<&'static str>) -> (TransportHooks, mpsc::UnboundedReceiver<Seen>, Arc<AtomicUsize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        let (t1, t2, t3, t4) = (tx.clone(), tx.clone(), tx.clone(), tx);
        let close_count = closes.clone();
        let hooks = TransportHooks {
            on_open: Arc::new(move |out: &Outbound| {
                if let Some(msg) = greeting {
                    out.send(msg).unwrap();
                }
                let _ = t1.send(Seen::Open);
            }),
            on_message: Arc::new(move |frame: &[u8]| {
                let _ = t2.send(Seen::Frame(frame.to_vec()));
            }),
            on_error: Arc::new(move |_: &FhubError| {
                let _ = t3.send(Seen::Error);
            }),
            on_close: Arc::new(move |reason: CloseReason| {
                close_count.fetch_add(1, Ordering::SeqCst);
                let _ = t4.send(Seen::Close(reason));
            }),
        };
        (hooks, rx, closes)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
        tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn delivers_frames_and_outbound_messages() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let greeting = ws.next().await.unwrap().unwrap();
            ws.send(Message::Text("first".to_string().into())).await.unwrap();
            ws.send(Message::Binary(vec![1u8, 2, 3].into())).await.unwrap();
            ws.close(None).await.unwrap();
            greeting.into_text().unwrap().as_str().to_owned()
        });

        let (hooks, mut rx, closes) = recording_hooks(Some("hello"));
        let mut conn = WsConnection::new(WsConnConfig::new(format!("ws://{addr}")));
        conn.open(hooks).unwrap();

        assert_eq!(next(&mut rx).await, Seen::Open);
        assert_eq!(next(&mut rx).await, Seen::Frame(b"first".to_vec()));
        assert_eq!(next(&mut rx).await, Seen::Frame(vec![1, 2, 3]));
        assert_eq!(next(&mut rx).await, Seen::Close(CloseReason::Remote));
        assert_eq!(server.await.unwrap(), "hello");

        conn.close().await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn requested_close_fires_hook_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (hooks, mut rx, closes) = recording_hooks(None);
        let mut conn = WsConnection::new(WsConnConfig::new(format!("ws://{addr}")));
        conn.open(hooks).unwrap();
        assert_eq!(next(&mut rx).await, Seen::Open);
        assert!(conn.is_open());
        conn.send("ping-me".into()).unwrap();

        conn.close().await;
        conn.close().await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(next(&mut rx).await, Seen::Close(CloseReason::Requested));
        assert!(matches!(conn.send("late".into()), Err(FhubError::NotOpen)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_error_then_close() {
        // Bind and drop to get a port nothing listens on.
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();

        let (hooks, mut rx, closes) = recording_hooks(None);
        let mut conn = WsConnection::new(WsConnConfig::new(format!("ws://{addr}")));
        conn.open(hooks).unwrap();

        assert_eq!(next(&mut rx).await, Seen::Error);
        assert!(matches!(next(&mut rx).await, Seen::Close(CloseReason::Failed(_))));
        conn.close().await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_twice_is_rejected() {
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let mut conn = WsConnection::new(WsConnConfig::new(format!("ws://{addr}")));
        conn.open(TransportHooks::default()).unwrap();
        assert!(matches!(conn.open(TransportHooks::default()), Err(FhubError::InvalidState(_))));
        conn.close().await;
    }

    #[test]
    fn send_before_open_fails() {
        let conn = WsConnection::new(WsConnConfig::new("ws://127.0.0.1:1"));
        assert!(matches!(conn.send("x".into()), Err(FhubError::NotOpen)));
    }

    #[test]
    fn token_is_not_logged() {
        assert_eq!(display_url("wss://ws.finnhub.io?token=secret"), "wss://ws.finnhub.io/");
    }
}
