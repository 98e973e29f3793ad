//! Core traits for the transport seam.

use tokio::sync::mpsc;

/// Discrete progress reported by a transport for one connection.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established and can carry frames
    Open,
    /// A text frame arrived
    Message(String),
    /// The transport failed; a [`TransportEvent::Close`] follows
    Error(String),
    /// The peer started the closing handshake
    Closing,
    /// The connection is gone. No further events are delivered.
    Close {
        /// Close code, when the transport knows one
        code: Option<u16>,
    },
}

/// Frames written to a transport.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Close the connection normally
    Close,
}

/// Full-duplex text transport.
///
/// Opening never blocks: implementations report progress as [`TransportEvent`]s
/// through the [`TransportPeer`] half of [`TransportHandle::pair`]. Every call to
/// [`Transport::open`] yields a fresh connection; handles are never reused.
///
/// # Example
///
/// ```ignore
/// struct Loopback;
///
/// impl Transport for Loopback {
///     fn open(&self, _endpoint: &str) -> TransportHandle {
///         let (handle, peer) = TransportHandle::pair();
///         _ = peer.events.send(TransportEvent::Open);
///         tokio::spawn(echo(peer));
///         handle
///     }
/// }
/// ```
pub trait Transport: Send + Sync + 'static {
    fn open(&self, endpoint: &str) -> TransportHandle;
}

/// Connection manager side of an opened transport.
///
/// Dropping the handle closes the underlying connection.
#[derive(Debug)]
pub struct TransportHandle {
    pub(crate) outgoing: mpsc::UnboundedSender<Frame>,
    pub(crate) events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Transport implementation side of an opened transport.
#[non_exhaustive]
#[derive(Debug)]
pub struct TransportPeer {
    /// Report progress to the connection manager
    pub events: mpsc::UnboundedSender<TransportEvent>,
    /// Frames the connection manager wants written. Yields `None` once the
    /// manager has discarded the connection.
    pub outgoing: mpsc::UnboundedReceiver<Frame>,
}

impl TransportHandle {
    /// Create both halves of a transport connection.
    #[must_use]
    pub fn pair() -> (Self, TransportPeer) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        (
            Self {
                outgoing: outgoing_tx,
                events: events_rx,
            },
            TransportPeer {
                events: events_tx,
                outgoing: outgoing_rx,
            },
        )
    }
}
