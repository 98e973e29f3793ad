//! WebSocket binding of the [`Transport`] seam.

#![expect(
    clippy::module_name_repetitions,
    reason = "Transport implementations are named after the seam they implement"
)]

use futures::{SinkExt as _, StreamExt as _};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::envelope::{ABNORMAL_CLOSURE, NORMAL_CLOSURE};
use super::error::WsError;
use super::traits::{Frame, Transport, TransportEvent, TransportHandle, TransportPeer};

/// Reported when the peer closes without a status code.
const NO_STATUS_RECEIVED: u16 = 1005;

/// [`Transport`] over `ws://` and `wss://` using `tokio-tungstenite`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl Transport for WsTransport {
    fn open(&self, endpoint: &str) -> TransportHandle {
        let (handle, peer) = TransportHandle::pair();
        tokio::spawn(run(endpoint.to_owned(), peer));
        handle
    }
}

async fn run(endpoint: String, peer: TransportPeer) {
    let TransportPeer {
        events,
        mut outgoing,
    } = peer;

    let ws_stream = match connect_async(&endpoint).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            let error = WsError::Connection(e);
            #[cfg(feature = "tracing")]
            tracing::warn!(%endpoint, %error, "Unable to connect");
            _ = events.send(TransportEvent::Error(error.to_string()));
            _ = events.send(TransportEvent::Close {
                code: Some(ABNORMAL_CLOSURE),
            });
            return;
        }
    };

    if events.send(TransportEvent::Open).is_err() {
        // Abandoned while the handshake was in flight
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    let code = loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(TransportEvent::Message(text.as_str().to_owned())).is_err() {
                            break NORMAL_CLOSURE;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        _ = events.send(TransportEvent::Closing);
                        break frame.map_or(NO_STATUS_RECEIVED, |f| u16::from(f.code));
                    }
                    Some(Ok(_)) => {
                        // Binary and control frames are not part of the envelope protocol.
                    }
                    Some(Err(e)) => {
                        _ = events.send(TransportEvent::Error(WsError::Connection(e).to_string()));
                        break ABNORMAL_CLOSURE;
                    }
                    None => break ABNORMAL_CLOSURE,
                }
            }

            frame = outgoing.recv() => {
                match frame {
                    Some(Frame::Text(text)) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            _ = events.send(TransportEvent::Error(WsError::Connection(e).to_string()));
                            break ABNORMAL_CLOSURE;
                        }
                    }
                    Some(Frame::Close) | None => break NORMAL_CLOSURE,
                }
            }
        }
    };

    // Completes the closing handshake, or answers the peer's close frame.
    _ = write.close().await;
    _ = events.send(TransportEvent::Close { code: Some(code) });
}
