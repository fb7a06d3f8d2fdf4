use crate::core::config::ManagerConfig;
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
use crate::core::event::{DisconnectDetails, SocketEvent};
use crate::core::registry::{ListenerRegistry, Subscription};
use crate::traits::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

/// Requests forwarded from the handle to the driver task
#[derive(Debug)]
enum ClientCommand {
    Send(WsMessage),
    Ping(Vec<u8>),
}

/// State shared between the handle and its driver task
struct Shared {
    endpoint: String,
    state: AtomicConnectionState,
    metrics: AtomicMetrics,
    registry: Arc<ListenerRegistry>,
    /// Wakes the driver out of connect attempts, backoff waits and reads
    shutdown: Notify,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }

    /// Terminal transition: optional `Error`, then `Close`, exactly once
    fn terminate(&self, error: Option<SocketError>) {
        self.state.set(ConnectionState::Closed);
        if self.registry.close_with(error.map(SocketEvent::Error)) {
            info!("connection closed");
        }
    }
}

/// Reconnecting connection manager
///
/// Owns at most one [`Transport`] at a time and drives it from a
/// dedicated tokio task, which is the only place socket I/O and backoff
/// timers run. Lifecycle and data events are fanned out to every
/// [`Subscription`].
///
/// - Connect failures are retried per the [`ReconnectionStrategy`];
///   when the budget runs out `Error` then `Close` are emitted.
/// - After a successful open, an error or close from the transport emits
///   `Disconnected` and starts a new connect cycle (`Reconnected` on
///   success), unless auto-reconnect is disabled, in which case the
///   manager closes.
/// - [`close`](Self::close) is idempotent and can be called at any time.
///
/// Dropping the manager closes it.
pub struct ConnectionManager {
    id: u64,
    shared: Arc<Shared>,
    command_tx: UnboundedSender<ClientCommand>,
    task_handle: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create a manager and immediately begin connecting
    ///
    /// Must be called from within a tokio runtime. Events emitted before
    /// the caller subscribes are not replayed; use
    /// [`connect_subscribed`](Self::connect_subscribed) to observe the
    /// connection from its first event.
    pub fn connect(config: ManagerConfig, factory: Arc<dyn TransportFactory>) -> Result<Self> {
        Self::start(config, factory, false).map(|(manager, _)| manager)
    }

    /// Create a manager with a subscription attached before the first
    /// connect attempt
    pub fn connect_subscribed(
        config: ManagerConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<(Self, Subscription)> {
        let (manager, subscription) = Self::start(config, factory, true)?;
        let subscription = subscription.ok_or_else(|| {
            SocketError::Configuration("initial subscription was not created".into())
        })?;
        Ok((manager, subscription))
    }

    fn start(
        config: ManagerConfig,
        factory: Arc<dyn TransportFactory>,
        subscribe_first: bool,
    ) -> Result<(Self, Option<Subscription>)> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            SocketError::Configuration(format!("connection manager requires a tokio runtime: {}", e))
        })?;

        let id = NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(Shared {
            endpoint: config.endpoint.clone(),
            state: AtomicConnectionState::new(ConnectionState::Idle),
            metrics: AtomicMetrics::new(),
            registry: ListenerRegistry::new(),
            shutdown: Notify::new(),
        });

        let subscription = subscribe_first.then(|| shared.registry.attach());
        let (command_tx, command_rx) = unbounded_channel();

        let span = info_span!("connection", id, endpoint = %redact_endpoint(&config.endpoint));
        span.in_scope(|| debug!("attempting initial connection"));

        let task_handle = {
            let shared = Arc::clone(&shared);
            runtime.spawn(run_manager(shared, config, factory, command_rx).instrument(span))
        };

        Ok((
            Self {
                id,
                shared,
                command_tx,
                task_handle: Some(task_handle),
            },
            subscription,
        ))
    }

    /// Start configuring a manager
    pub fn builder() -> crate::core::builder::ConnectionBuilder<crate::core::builder::states::NoEndpoint> {
        crate::core::builder::ConnectionBuilder::new()
    }

    /// Attach a new listener
    ///
    /// Subscribing to a closed manager yields a subscription that ends
    /// immediately.
    pub fn subscribe(&self) -> Subscription {
        self.shared.registry.attach()
    }

    /// Close the connection
    ///
    /// Emits `Close` exactly once, releases every listener and tears
    /// down the live transport. A pending backoff timer will not start
    /// another attempt. Calling it again has no effect.
    pub fn close(&self) {
        self.shared.state.set(ConnectionState::Closed);
        if self.shared.registry.close_with(None) {
            info!(id = self.id, "closing connection");
        }
        self.shared.shutdown.notify_one();
    }

    /// Close and wait for the driver task to release the transport
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
    }

    /// Send a liveness probe on the open transport
    ///
    /// Fails with [`SocketError::TransportUnavailable`] (also emitted as an
    /// `Error` event) when no transport is open. Connection state is not
    /// affected.
    pub fn ping(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.dispatch(ClientCommand::Ping(payload.into()), "ping")
    }

    /// Send a data frame on the open transport, same failure rules as `ping`
    pub fn send(&self, message: WsMessage) -> Result<()> {
        self.dispatch(ClientCommand::Send(message), "send")
    }

    fn dispatch(&self, command: ClientCommand, operation: &str) -> Result<()> {
        let state = self.shared.state.get();
        if state != ConnectionState::Open {
            let err = SocketError::TransportUnavailable(format!(
                "cannot {} while connection is {}",
                operation, state
            ));
            warn!(id = self.id, "{}", err);
            self.shared.registry.emit(SocketEvent::Error(err.clone()));
            return Err(err);
        }

        self.command_tx.send(command).map_err(|_| {
            SocketError::TransportUnavailable("connection task has stopped".into())
        })
    }

    /// Unique id of this manager, also recorded on its tracing span
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The full endpoint address, including credentials in the query
    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.shared.state.is_open()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn listener_count(&self) -> usize {
        self.shared.registry.listener_count()
    }

    pub fn metrics(&self) -> Metrics {
        let metrics = &self.shared.metrics;
        Metrics {
            connect_attempts: metrics.connect_attempts(),
            reconnect_count: metrics.reconnect_count(),
            messages_received: metrics.messages_received(),
            messages_sent: metrics.messages_sent(),
            state: self.shared.state.get(),
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

/// How a connect cycle ended
enum CycleOutcome {
    Connected(Box<dyn Transport>),
    Exhausted(SocketError),
    Cancelled,
}

/// Why an open transport stopped
enum Failure {
    Error(SocketError),
    Closed { code: Option<u16>, reason: String },
}

enum PumpOutcome {
    Failed(Failure),
    Cancelled,
}

/// Driver task: connect, pump, reconnect, until closed
async fn run_manager(
    shared: Arc<Shared>,
    mut config: ManagerConfig,
    factory: Arc<dyn TransportFactory>,
    mut command_rx: UnboundedReceiver<ClientCommand>,
) {
    let mut has_opened = false;

    loop {
        let transport = match connect_cycle(&shared, &mut config, factory.as_ref()).await {
            CycleOutcome::Connected(transport) => transport,
            CycleOutcome::Exhausted(err) => {
                error!("connection attempts exhausted: {}", err);
                shared.terminate(Some(err));
                break;
            }
            CycleOutcome::Cancelled => break,
        };

        // Commands queued while no transport was open are stale
        while let Ok(command) = command_rx.try_recv() {
            debug!("dropping stale {:?}", command);
        }

        if !shared.state.set(ConnectionState::Open) {
            release(transport).await;
            break;
        }
        let event = if has_opened {
            shared.metrics.increment_reconnects();
            info!("reconnected");
            SocketEvent::Reconnected
        } else {
            info!("connected");
            SocketEvent::Open
        };
        has_opened = true;
        if !shared.registry.emit(event) {
            release(transport).await;
            break;
        }

        let (outcome, transport) = pump(&shared, transport, &mut command_rx).await;
        let failure = match outcome {
            PumpOutcome::Failed(failure) => failure,
            PumpOutcome::Cancelled => {
                release(transport).await;
                break;
            }
        };

        // Leave `Open` before the teardown so `ping`/`send` are refused
        // while the transport is closing
        if !config.auto_reconnect {
            match failure {
                Failure::Error(err) => shared.terminate(Some(err)),
                Failure::Closed { .. } => shared.terminate(None),
            }
            release(transport).await;
            break;
        }

        let details = match failure {
            Failure::Error(err) => DisconnectDetails::error(err),
            Failure::Closed { code, reason } => DisconnectDetails::close(code, reason),
        };
        let announced = shared.state.set(ConnectionState::Disconnected)
            && shared.registry.emit(SocketEvent::Disconnected(details));
        release(transport).await;
        if !announced {
            break;
        }
        info!("attempting to reconnect");
    }

    debug!("driver task exiting");
}

/// One connect cycle with a fresh retry budget
async fn connect_cycle(
    shared: &Shared,
    config: &mut ManagerConfig,
    factory: &dyn TransportFactory,
) -> CycleOutcome {
    config.reconnect_strategy.reset();
    let mut retry = 0usize;

    loop {
        if shared.is_closed() || !shared.state.set(ConnectionState::Connecting) {
            return CycleOutcome::Cancelled;
        }
        shared.metrics.increment_attempts();
        debug!(attempt = retry + 1, "opening transport");

        let result = tokio::select! {
            biased;
            _ = shared.shutdown.notified() => return CycleOutcome::Cancelled,
            result = open_transport(factory, &shared.endpoint, &config.transport) => result,
        };

        let err = match result {
            Ok(transport) if shared.is_closed() => {
                release(transport).await;
                return CycleOutcome::Cancelled;
            }
            Ok(transport) => return CycleOutcome::Connected(transport),
            Err(err) => err,
        };
        warn!(attempt = retry + 1, "connection attempt failed: {}", err);

        let Some(delay) = config.reconnect_strategy.next_delay(retry) else {
            return CycleOutcome::Exhausted(SocketError::ReconnectionFailed {
                attempts: retry + 1,
                source: Box::new(err),
            });
        };

        info!("Reconnecting in {:?} (attempt {})", delay, retry + 2);
        tokio::select! {
            biased;
            _ = shared.shutdown.notified() => return CycleOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
        retry += 1;
    }
}

async fn open_transport(
    factory: &dyn TransportFactory,
    endpoint: &str,
    options: &TransportOptions,
) -> Result<Box<dyn Transport>> {
    match options.connect_timeout {
        Some(limit) => tokio::time::timeout(limit, factory.open(endpoint, options))
            .await
            .map_err(|_| SocketError::Timeout(format!("connect did not complete within {:?}", limit)))?,
        None => factory.open(endpoint, options).await,
    }
}

/// Forward transport signals until the transport fails or the manager closes
///
/// The transport is handed back unreleased; the caller closes it.
async fn pump(
    shared: &Shared,
    mut transport: Box<dyn Transport>,
    command_rx: &mut UnboundedReceiver<ClientCommand>,
) -> (PumpOutcome, Box<dyn Transport>) {
    let outcome = loop {
        tokio::select! {
            biased;
            _ = shared.shutdown.notified() => break PumpOutcome::Cancelled,

            signal = transport.next_signal() => match signal {
                Some(TransportSignal::Message(message)) => {
                    shared.metrics.increment_received();
                    if !shared.registry.emit(SocketEvent::Message(message.into())) {
                        break PumpOutcome::Cancelled;
                    }
                }
                Some(TransportSignal::Error(err)) => {
                    error!("transport error: {}", err);
                    break PumpOutcome::Failed(Failure::Error(err));
                }
                Some(TransportSignal::Closed { code, reason }) => {
                    warn!(?code, "transport closed by remote: {}", reason);
                    break PumpOutcome::Failed(Failure::Closed { code, reason });
                }
                None => {
                    warn!("transport stream ended without a close frame");
                    break PumpOutcome::Failed(Failure::Error(SocketError::ConnectionClosed(
                        "stream ended without a close frame".into(),
                    )));
                }
            },

            command = command_rx.recv() => {
                let result = match command {
                    Some(ClientCommand::Send(message)) => transport.send(message).await.map(|_| {
                        shared.metrics.increment_sent();
                    }),
                    Some(ClientCommand::Ping(payload)) => transport.ping(payload).await,
                    None => break PumpOutcome::Cancelled,
                };
                if let Err(err) = result {
                    error!("write failed: {}", err);
                    break PumpOutcome::Failed(Failure::Error(err));
                }
            }
        }
    };

    (outcome, transport)
}

/// Tear down a transport
async fn release(mut transport: Box<dyn Transport>) {
    transport.close().await;
}

/// Endpoint without query string or credentials, for log output
pub(crate) fn redact_endpoint(endpoint: &str) -> String {
    match url::Url::parse(endpoint) {
        Ok(mut url) => {
            url.set_query(None);
            let _ = url.set_password(None);
            let _ = url.set_username("");
            url.to_string()
        }
        Err(_) => "<invalid endpoint>".to_string(),
    }
}
