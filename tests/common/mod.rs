#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use preipo_client_sdk::ws::config::{Config, ReconnectConfig};
use preipo_client_sdk::ws::{
    ConnectionManager, Event, Frame, Transport, TransportEvent, TransportHandle, TransportPeer,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};

pub const ENDPOINT: &str = "ws://mock.invalid/ws";

/// What a [`MockTransport`] does as soon as it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Report `Open` immediately
    Accept,
    /// Report an error followed by an abnormal close
    Refuse,
    /// Report nothing; the test drives events by hand
    Hold,
}

/// In-memory [`Transport`] recording every open.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockState>>,
}

struct MockState {
    behavior: Behavior,
    opens: Vec<Instant>,
    peers: Vec<TransportPeer>,
}

impl MockTransport {
    #[must_use]
    pub fn new(behavior: Behavior) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                behavior,
                opens: Vec::new(),
                peers: Vec::new(),
            })),
        }
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        self.inner.lock().unwrap().behavior = behavior;
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.inner.lock().unwrap().opens.len()
    }

    /// Gaps between consecutive opens.
    #[must_use]
    pub fn open_gaps(&self) -> Vec<Duration> {
        let state = self.inner.lock().unwrap();
        state
            .opens
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]))
            .collect()
    }

    /// Push an event on the `index`-th opened connection.
    pub fn emit(&self, index: usize, event: TransportEvent) {
        let state = self.inner.lock().unwrap();
        _ = state.peers[index].events.send(event);
    }

    /// Drop the transport side of the `index`-th connection without reporting a close.
    pub fn vanish(&self, index: usize) {
        let (_, detached) = TransportHandle::pair();
        self.inner.lock().unwrap().peers[index] = detached;
    }

    /// Push an inbound text frame on the most recent connection.
    pub fn receive(&self, text: &str) {
        let last = self.open_count() - 1;
        self.emit(last, TransportEvent::Message(text.to_owned()));
    }

    /// Drain frames written to the `index`-th connection so far.
    #[must_use]
    pub fn written(&self, index: usize) -> Vec<Frame> {
        let mut state = self.inner.lock().unwrap();
        let mut frames = Vec::new();
        while let Ok(frame) = state.peers[index].outgoing.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Text frames written to the `index`-th connection, parsed as JSON.
    #[must_use]
    pub fn written_json(&self, index: usize) -> Vec<serde_json::Value> {
        self.written(index)
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Text(text) => Some(serde_json::from_str(&text).unwrap()),
                _ => None,
            })
            .collect()
    }
}

impl Transport for MockTransport {
    fn open(&self, _endpoint: &str) -> TransportHandle {
        let (handle, peer) = TransportHandle::pair();
        let mut state = self.inner.lock().unwrap();
        state.opens.push(Instant::now());

        match state.behavior {
            Behavior::Accept => {
                _ = peer.events.send(TransportEvent::Open);
            }
            Behavior::Refuse => {
                _ = peer
                    .events
                    .send(TransportEvent::Error("connection refused".to_owned()));
                _ = peer.events.send(TransportEvent::Close { code: Some(1006) });
            }
            Behavior::Hold => {}
        }

        state.peers.push(peer);
        handle
    }
}

#[must_use]
pub fn config(max_attempts: u32, initial_backoff: Duration) -> Config {
    Config::builder()
        .endpoint(ENDPOINT)
        .heartbeat_interval(Duration::from_secs(30))
        .reconnect(
            ReconnectConfig::builder()
                .initial_backoff(initial_backoff)
                .max_backoff(Duration::from_secs(30))
                .max_attempts(max_attempts)
                .build(),
        )
        .debug(true)
        .build()
}

#[must_use]
pub fn manager(behavior: Behavior, config: Config) -> (ConnectionManager, MockTransport) {
    let transport = MockTransport::new(behavior);
    let manager = ConnectionManager::with_transport(config, transport.clone()).unwrap();
    (manager, transport)
}

/// Record every event of `msg_type` into a channel.
#[must_use]
pub fn record(manager: &ConnectionManager, msg_type: &str) -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    let _subscription = manager.on(
        msg_type,
        Arc::new(move |event: &Event| {
            _ = tx.send(event.clone());
        }),
    );
    rx
}

/// Next recorded event, failing the test if none arrives in time.
pub async fn next(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Route library logs to the test harness. `RUST_LOG` selects what is shown.
pub fn init_tracing() {
    _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Let spawned tasks run without advancing the paused clock meaningfully.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
