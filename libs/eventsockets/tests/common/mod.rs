//! Common test utilities for EventSockets integration tests
//!
//! - [`ScriptedFactory`]: in-memory transports driven by the test
//! - [`MockWsServer`]: real WebSocket server that records handshakes

#![allow(dead_code)]

use async_trait::async_trait;
use eventsockets::*;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Upper bound for any single wait in the tests
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for the next event, failing the test on timeout or end of stream
pub async fn next_event(events: &mut Subscription) -> SocketEvent {
    let event = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("subscription ended");
    verbose_println!("event: {:?}", event);
    event
}

pub async fn next_decoded(events: &mut DecodedSubscription) -> SocketEvent {
    let event = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("subscription ended");
    verbose_println!("decoded event: {:?}", event);
    event
}

pub async fn next_shared(events: &mut SharedSubscription) -> SocketEvent {
    let event = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("subscription ended");
    verbose_println!("shared event: {:?}", event);
    event
}

/// Poll `condition` until it holds, failing the test on timeout
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn text(s: &str) -> SocketEvent {
    SocketEvent::Message(Payload::Text(s.to_string()))
}

/// Outcome of one connect attempt against a [`ScriptedFactory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Refuse,
    Accept,
}

#[derive(Default)]
struct FactoryState {
    plan: Mutex<VecDeque<Attempt>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    closes_finished: AtomicUsize,
    close_delay: Mutex<Option<Duration>>,
    pings: AtomicUsize,
    sent: Mutex<Vec<WsMessage>>,
    remotes: Mutex<Vec<Remote>>,
}

/// Transport factory whose attempts follow a plan
///
/// Attempts beyond the plan use the fallback outcome. Accepted transports
/// stay open until the test pushes signals through [`ScriptedFactory::remote`].
#[derive(Clone)]
pub struct ScriptedFactory {
    state: Arc<FactoryState>,
    fallback: Attempt,
}

impl ScriptedFactory {
    /// Every attempt succeeds
    pub fn accepting() -> Self {
        Self {
            state: Arc::default(),
            fallback: Attempt::Accept,
        }
    }

    /// Every attempt is refused
    pub fn refusing() -> Self {
        Self {
            state: Arc::default(),
            fallback: Attempt::Refuse,
        }
    }

    /// Queue explicit outcomes for the next attempts
    pub fn with_plan(self, plan: impl IntoIterator<Item = Attempt>) -> Self {
        self.state.plan.lock().extend(plan);
        self
    }

    /// Make every transport close take `delay`
    pub fn with_slow_close(self, delay: Duration) -> Self {
        *self.state.close_delay.lock() = Some(delay);
        self
    }

    pub fn shared(&self) -> Arc<dyn TransportFactory> {
        Arc::new(self.clone())
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Close requests received by accepted transports
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Close requests that have run to completion
    pub fn closes_finished(&self) -> usize {
        self.state.closes_finished.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<WsMessage> {
        self.state.sent.lock().clone()
    }

    pub fn accepted(&self) -> usize {
        self.state.remotes.lock().len()
    }

    /// Remote side of the `index`-th accepted transport
    pub fn remote(&self, index: usize) -> Remote {
        self.state.remotes.lock()[index].clone()
    }

    /// Remote side of the most recently accepted transport
    pub fn last_remote(&self) -> Remote {
        self.state
            .remotes
            .lock()
            .last()
            .cloned()
            .expect("no transport accepted yet")
    }
}

#[async_trait]
impl TransportFactory for ScriptedFactory {
    async fn open(&self, _url: &str, _options: &TransportOptions) -> eventsockets::Result<Box<dyn Transport>> {
        let attempt = self.state.opens.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self.state.plan.lock().pop_front().unwrap_or(self.fallback);
        verbose_println!("scripted attempt {}: {:?}", attempt, outcome);

        match outcome {
            Attempt::Refuse => Err(SocketError::Connect(format!("attempt {} refused", attempt))),
            Attempt::Accept => {
                let (tx, rx) = unbounded_channel();
                let hang_up = Arc::new(Notify::new());
                self.state.remotes.lock().push(Remote {
                    tx,
                    hang_up: Arc::clone(&hang_up),
                });
                Ok(Box::new(ScriptedTransport {
                    rx,
                    hang_up,
                    state: Arc::clone(&self.state),
                }))
            }
        }
    }
}

struct ScriptedTransport {
    rx: UnboundedReceiver<TransportSignal>,
    hang_up: Arc<Notify>,
    state: Arc<FactoryState>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn next_signal(&mut self) -> Option<TransportSignal> {
        tokio::select! {
            signal = self.rx.recv() => signal,
            _ = self.hang_up.notified() => None,
        }
    }

    async fn send(&mut self, message: WsMessage) -> eventsockets::Result<()> {
        self.state.sent.lock().push(message);
        Ok(())
    }

    async fn ping(&mut self, _payload: Vec<u8>) -> eventsockets::Result<()> {
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.close_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.closes_finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Test-side handle that injects signals into a scripted transport
#[derive(Clone)]
pub struct Remote {
    tx: UnboundedSender<TransportSignal>,
    hang_up: Arc<Notify>,
}

impl Remote {
    pub fn text(&self, text: &str) {
        let _ = self.tx.send(TransportSignal::Message(WsMessage::Text(text.to_string())));
    }

    pub fn binary(&self, data: &[u8]) {
        let _ = self.tx.send(TransportSignal::Message(WsMessage::Binary(data.to_vec())));
    }

    pub fn error(&self, message: &str) {
        let _ = self.tx.send(TransportSignal::Error(SocketError::WebSocket(message.to_string())));
    }

    /// End the stream without a close frame
    pub fn hang_up(&self) {
        self.hang_up.notify_one();
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.send(TransportSignal::Closed {
            code: Some(code),
            reason: reason.to_string(),
        });
    }
}

/// Handshake seen by the mock server
#[derive(Debug, Clone)]
pub struct Handshake {
    pub uri: String,
    pub headers: HashMap<String, String>,
}

impl Handshake {
    /// Decoded query parameters of the request
    pub fn query(&self) -> HashMap<String, String> {
        let url = url::Url::parse(&format!("ws://localhost{}", self.uri)).expect("request uri");
        url.query_pairs().into_owned().collect()
    }
}

#[derive(Debug)]
enum ServerCommand {
    Text(String),
    Close,
}

#[derive(Default)]
struct ServerState {
    handshakes: Vec<Handshake>,
    clients: Vec<UnboundedSender<ServerCommand>>,
    pings: usize,
}

/// A mock WebSocket server for testing
pub struct MockWsServer {
    pub addr: SocketAddr,
    state: Arc<Mutex<ServerState>>,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    /// Create and start a server that accepts every handshake
    pub async fn start() -> Self {
        Self::spawn(false).await
    }

    /// Create and start a server that rejects every handshake with 403
    pub async fn start_rejecting() -> Self {
        Self::spawn(true).await
    }

    async fn spawn(reject: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(ServerState::default()));
        let shutdown = Arc::new(Notify::new());

        let accept_state = Arc::clone(&state);
        let accept_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let state = Arc::clone(&accept_state);
                                let shutdown = Arc::clone(&accept_shutdown);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, state, shutdown, reject).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = accept_shutdown.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, state, shutdown }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        state: Arc<Mutex<ServerState>>,
        shutdown: Arc<Notify>,
        reject: bool,
    ) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
        use tokio_tungstenite::tungstenite::http::StatusCode;
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
        use tokio_tungstenite::tungstenite::protocol::CloseFrame;
        use tokio_tungstenite::tungstenite::Message;

        let record_state = Arc::clone(&state);
        let callback = move |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
            let headers = request
                .headers()
                .iter()
                .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
                .collect();
            record_state.lock().handshakes.push(Handshake {
                uri: request.uri().to_string(),
                headers,
            });

            if reject {
                let mut denied = ErrorResponse::new(Some("forbidden".to_string()));
                *denied.status_mut() = StatusCode::FORBIDDEN;
                return Err(denied);
            }
            Ok(response)
        };

        let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
            Ok(ws) => ws,
            Err(e) => {
                verbose_println!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (command_tx, mut command_rx) = unbounded_channel();
        state.lock().clients.push(command_tx);
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Ping(payload))) => {
                            state.lock().pings += 1;
                            if write.send(Message::Pong(payload)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                command = command_rx.recv() => {
                    match command {
                        Some(ServerCommand::Text(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerCommand::Close) | None => {
                            let frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: "server restart".into(),
                            };
                            let _ = write.send(Message::Close(Some(frame))).await;
                            break;
                        }
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Base WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ari/events", self.addr)
    }

    pub fn handshakes(&self) -> Vec<Handshake> {
        self.state.lock().handshakes.clone()
    }

    pub fn handshake_count(&self) -> usize {
        self.state.lock().handshakes.len()
    }

    pub fn pings(&self) -> usize {
        self.state.lock().pings
    }

    /// Send a text frame to every connected client
    pub fn broadcast(&self, text: &str) {
        for client in &self.state.lock().clients {
            let _ = client.send(ServerCommand::Text(text.to_string()));
        }
    }

    /// Close every connected client with a normal close frame
    pub fn close_clients(&self) {
        for client in self.state.lock().clients.drain(..) {
            let _ = client.send(ServerCommand::Close);
        }
    }

    pub fn client_count(&self) -> usize {
        self.state.lock().clients.len()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
