#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use async_stream::stream;
use backoff::backoff::Backoff as _;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use url::Url;

use super::config::Config;
use super::dispatcher::{Callback, Dispatcher, Subscription};
use super::envelope::{
    ABNORMAL_CLOSURE, ConnectionStatus, Envelope, Event, NORMAL_CLOSURE, PING,
};
use super::error::WsError;
use super::heartbeat;
use super::reconnect::ReconnectScheduler;
use super::task::TaskHandle;
use super::traits::{Frame, Transport, TransportEvent, TransportHandle};
#[cfg(feature = "ws")]
use super::transport::WsTransport;
use crate::Result;
#[cfg(feature = "ws")]
use crate::error::Error;

/// Emit a `debug!` event only when [`Config::debug`] is set.
macro_rules! debug_log {
    ($config:expr, $($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        {
            if $config.debug {
                tracing::debug!($($arg)+);
            }
        }
    };
}

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// A transport has been opened and is waiting for its handshake
    Connecting,
    /// The transport is established
    Open,
    /// The peer started closing the transport
    Closing,
    /// No transport. Both the initial state and the state between reconnect attempts.
    Closed,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Manages the realtime channel lifecycle, reconnection, heartbeat and message routing.
///
/// The manager owns one transport at a time. Inbound envelopes are routed to
/// subscribers registered with [`ConnectionManager::on`]; lifecycle changes are
/// reported as local `connection` and `error` events through the same registry.
/// Subscriptions survive reconnects. Callbacks run one at a time, in the order
/// the events happened.
///
/// Handles are cheap to clone and share one connection. Separate calls to
/// [`ConnectionManager::new`] produce fully independent connections. Methods that
/// start work ([`connect`](Self::connect), [`stream`](Self::stream)) must be
/// called from within a Tokio runtime.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use preipo_client_sdk::ws::config::Config;
/// use preipo_client_sdk::ws::{ConnectionManager, Event};
///
/// # async fn example() -> preipo_client_sdk::Result<()> {
/// let config = Config::builder().endpoint("wss://realtime.example.com/ws").build();
/// let connection = ConnectionManager::new(config)?;
///
/// let orders = connection.on(
///     "order:update",
///     Arc::new(|event: &Event| println!("order update: {}", event.data)),
/// );
///
/// connection.connect();
/// connection.send("chat", &serde_json::json!({ "text": "hi" }))?;
///
/// orders.unsubscribe();
/// connection.disconnect();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    transport: Box<dyn Transport>,
    dispatcher: Dispatcher,
    /// Events awaiting delivery; only fed while `session` is locked
    deliveries: mpsc::UnboundedSender<Event>,
    /// Current state; only written while `session` is locked
    state_tx: watch::Sender<ConnectionState>,
    session: Mutex<Session>,
}

struct Session {
    /// Incremented on every open and on disconnect. Events, heartbeats and
    /// reconnect timers tagged with an older epoch are ignored.
    epoch: u64,
    outgoing: Option<mpsc::UnboundedSender<Frame>>,
    intentionally_closed: bool,
    scheduler: ReconnectScheduler,
    heartbeat: Option<TaskHandle>,
    reconnect: Option<TaskHandle>,
    last_pong: Option<Instant>,
    /// Taken by the delivery task on the first connect
    pending_deliveries: Option<mpsc::UnboundedReceiver<Event>>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.config.endpoint)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a manager for a `ws://` or `wss://` endpoint. No connection is made
    /// until [`connect`](Self::connect) is called.
    #[cfg(feature = "ws")]
    pub fn new(config: Config) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "unsupported endpoint scheme `{}`, expected `ws` or `wss`",
                endpoint.scheme()
            )));
        }

        Self::with_transport(config, WsTransport)
    }

    /// Create a manager over a custom [`Transport`].
    pub fn with_transport<T: Transport>(config: Config, transport: T) -> Result<Self> {
        Url::parse(&config.endpoint)?;

        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        let (deliveries, pending_deliveries) = mpsc::unbounded_channel();
        let scheduler = ReconnectScheduler::new(config.reconnect.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                transport: Box::new(transport),
                dispatcher: Dispatcher::new(),
                deliveries,
                state_tx,
                session: Mutex::new(Session {
                    epoch: 0,
                    outgoing: None,
                    intentionally_closed: false,
                    scheduler,
                    heartbeat: None,
                    reconnect: None,
                    last_pong: None,
                    pending_deliveries: Some(pending_deliveries),
                }),
            }),
        })
    }

    /// Open the connection.
    ///
    /// No-op while [`ConnectionState::Connecting`] or [`ConnectionState::Open`].
    /// Otherwise resets the reconnect attempt counter, cancels any pending
    /// reconnect and opens a fresh transport.
    pub fn connect(&self) {
        let mut session = self.inner.lock();
        let state = self.state();
        if matches!(state, ConnectionState::Connecting | ConnectionState::Open) {
            debug_log!(self.inner.config, %state, "Connect ignored, connection already active");
            return;
        }

        if let Some(events) = session.pending_deliveries.take() {
            tokio::spawn(deliver(self.inner.dispatcher.clone(), events));
        }

        session.intentionally_closed = false;
        session.scheduler.reset();
        session.reconnect = None;
        self.inner.open(&mut session);
    }

    /// Close the connection and suppress automatic reconnection.
    ///
    /// Cancels the heartbeat and any pending reconnect, closes the transport and
    /// moves to [`ConnectionState::Closed`] before returning. Subscribers receive a
    /// `connection`/`disconnected` event if the connection was not already closed.
    pub fn disconnect(&self) {
        let mut session = self.inner.lock();
        session.intentionally_closed = true;
        session.reconnect = None;
        session.heartbeat = None;
        if let Some(outgoing) = session.outgoing.take() {
            _ = outgoing.send(Frame::Close);
        }
        session.epoch += 1;
        let previous = self.inner.set_state(ConnectionState::Closed);

        debug_log!(self.inner.config, %previous, "Disconnected by caller");

        if previous != ConnectionState::Closed {
            self.inner.emit(
                &session,
                Event::status(ConnectionStatus::disconnected(Some(NORMAL_CLOSURE))),
            );
        }
    }

    /// Send an envelope of `msg_type` carrying `data`.
    ///
    /// When the connection is not open the message is logged and dropped; nothing
    /// is queued. Only serialization failures are returned as errors.
    pub fn send<S: Into<String>, D: Serialize + ?Sized>(&self, msg_type: S, data: &D) -> Result<()> {
        let envelope = Envelope::new(msg_type, serde_json::to_value(data)?);

        let session = self.inner.lock();
        if !self.is_connected() {
            let error = WsError::NotConnected;
            #[cfg(feature = "tracing")]
            tracing::warn!(msg_type = %envelope.msg_type, %error, "Dropping outbound message");
            #[cfg(not(feature = "tracing"))]
            let _ = &error;
            return Ok(());
        }

        self.inner.write(&session, &envelope)
    }

    /// Register `callback` for `msg_type`, or for every event with [`WILDCARD`](super::WILDCARD).
    ///
    /// Callbacks of one manager run one at a time on a single delivery task, in
    /// the order the events happened.
    pub fn on<S: Into<String>>(&self, msg_type: S, callback: Callback) -> Subscription {
        self.inner.dispatcher.on(msg_type, callback)
    }

    /// Remove the `(msg_type, callback)` pair. Returns whether it was registered.
    pub fn off(&self, msg_type: &str, callback: &Callback) -> bool {
        self.inner.dispatcher.off(msg_type, callback)
    }

    /// Stream of events of `msg_type`. The subscription is removed when the
    /// stream is dropped.
    pub fn stream(&self, msg_type: &str) -> impl Stream<Item = Event> + Send + use<> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let guard = self
            .on(
                msg_type,
                Arc::new(move |event: &Event| {
                    _ = tx.send(event.clone());
                }),
            )
            .into_guard();

        stream! {
            let _guard = guard;
            while let Some(event) = rx.recv().await {
                yield event;
            }
        }
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// When the last `pong` arrived on any connection of this manager.
    ///
    /// Advisory only: a missing `pong` never triggers a reconnect.
    #[must_use]
    pub fn last_pong(&self) -> Option<Instant> {
        self.inner.lock().last_pong
    }

    /// Reconnect attempts made since the last successful open or explicit connect.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock().scheduler.attempt()
    }

    #[must_use]
    pub fn subscriber_count(&self, msg_type: &str) -> usize {
        self.inner.dispatcher.subscriber_count(msg_type)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Session> {
        // Session is only mutated in short non-panicking sections, so a poisoned
        // lock still holds consistent data.
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the previous state.
    fn set_state(&self, state: ConnectionState) -> ConnectionState {
        self.state_tx.send_replace(state)
    }

    /// Open a fresh transport. Callers hold the session lock.
    fn open(self: &Arc<Self>, session: &mut Session) {
        session.epoch += 1;
        session.heartbeat = None;
        let epoch = session.epoch;

        debug_log!(self.config, endpoint = %self.config.endpoint, epoch, "Opening transport");

        let TransportHandle { outgoing, events } = self.transport.open(&self.config.endpoint);
        session.outgoing = Some(outgoing);
        self.set_state(ConnectionState::Connecting);

        tokio::spawn(pump(Arc::downgrade(self), epoch, events));
    }

    /// Apply one transport event. Returns `false` once `epoch` is stale.
    fn handle_event(self: &Arc<Self>, epoch: u64, event: TransportEvent) -> bool {
        let mut session = self.lock();
        if session.epoch != epoch {
            return false;
        }

        match event {
            TransportEvent::Open => {
                self.set_state(ConnectionState::Open);
                session.scheduler.reset();
                let this = Arc::downgrade(self);
                session.heartbeat = heartbeat::start(self.config.heartbeat_interval, move || {
                    this.upgrade().is_some_and(|inner| inner.ping(epoch))
                });
                debug_log!(self.config, epoch, "Connected");
                self.emit(&session, Event::status(ConnectionStatus::CONNECTED));
            }
            TransportEvent::Message(text) => match Envelope::parse(&text) {
                Ok(envelope) if envelope.is_pong() => {
                    session.last_pong = Some(Instant::now());
                }
                Ok(envelope) => {
                    debug_log!(self.config, msg_type = %envelope.msg_type, "Received envelope");
                    self.emit(&session, Event::from(envelope));
                }
                Err(e) => {
                    let error = WsError::MessageParse(e);
                    #[cfg(feature = "tracing")]
                    tracing::warn!(%text, %error, "Dropping malformed message");
                    #[cfg(not(feature = "tracing"))]
                    let _ = (&text, &error);
                }
            },
            TransportEvent::Error(error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%error, "Transport error");
                self.emit(&session, Event::error(error));
            }
            TransportEvent::Closing => {
                self.set_state(ConnectionState::Closing);
            }
            TransportEvent::Close { code } => {
                session.heartbeat = None;
                session.outgoing = None;
                self.set_state(ConnectionState::Closed);
                debug_log!(self.config, ?code, "Transport closed");
                self.emit(&session, Event::status(ConnectionStatus::disconnected(code)));

                if !session.intentionally_closed {
                    match session.scheduler.next_backoff() {
                        Some(delay) => self.schedule_reconnect(&mut session, epoch, delay),
                        None => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(
                                attempts = session.scheduler.attempt(),
                                "Reconnect attempts exhausted"
                            );
                            self.emit(&session, Event::status(ConnectionStatus::FAILED));
                        }
                    }
                }
            }
        }

        true
    }

    fn schedule_reconnect(self: &Arc<Self>, session: &mut Session, epoch: u64, delay: Duration) {
        debug_log!(
            self.config,
            attempt = session.scheduler.attempt(),
            ?delay,
            "Scheduling reconnect"
        );

        let this = Arc::downgrade(self);
        session.reconnect = Some(TaskHandle::spawn(async move {
            sleep(delay).await;
            if let Some(inner) = this.upgrade() {
                inner.reconnect(epoch);
            }
        }));
    }

    /// Reopen after a scheduled delay, unless the session moved on meanwhile.
    fn reconnect(self: &Arc<Self>, epoch: u64) {
        let mut session = self.lock();
        if session.epoch != epoch || session.intentionally_closed {
            return;
        }
        session.reconnect = None;
        self.open(&mut session);
    }

    /// Heartbeat tick. Returns `false` once the connection it belongs to is gone.
    fn ping(&self, epoch: u64) -> bool {
        let session = self.lock();
        if session.epoch != epoch || !self.state_tx.borrow().is_connected() {
            return false;
        }
        _ = self.write(&session, &Envelope::new(PING, Value::Null));
        true
    }

    /// Queue `event` for delivery. Taking `session` keeps the queue in the same
    /// order as the state changes.
    fn emit(&self, _session: &Session, event: Event) {
        _ = self.deliveries.send(event);
    }

    fn write(&self, session: &Session, envelope: &Envelope) -> Result<()> {
        let text = serde_json::to_string(envelope)?;
        debug_log!(self.config, msg_type = %envelope.msg_type, "Sending envelope");

        let sent = session
            .outgoing
            .as_ref()
            .is_some_and(|outgoing| outgoing.send(Frame::Text(text)).is_ok());
        if !sent {
            let error = WsError::ConnectionClosed;
            #[cfg(feature = "tracing")]
            tracing::warn!(msg_type = %envelope.msg_type, %error, "Dropping outbound message");
            #[cfg(not(feature = "tracing"))]
            let _ = &error;
        }
        Ok(())
    }
}

/// Hand queued events to subscribers, one at a time. Ends once the manager is dropped.
async fn deliver(dispatcher: Dispatcher, mut events: mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = events.recv().await {
        dispatcher.dispatch(&event);
    }
}

/// Feed one transport's events into the manager, in arrival order.
async fn pump(
    manager: Weak<Inner>,
    epoch: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    loop {
        // A transport that vanishes without reporting a close is treated as an abnormal close.
        let event = events.recv().await.unwrap_or(TransportEvent::Close {
            code: Some(ABNORMAL_CLOSURE),
        });
        let closed = matches!(event, TransportEvent::Close { .. });

        let Some(inner) = manager.upgrade() else {
            break;
        };
        if !inner.handle_event(epoch, event) || closed {
            break;
        }
    }
}
