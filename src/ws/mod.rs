//! Resilient realtime channel.
//!
//! A long-lived, bidirectional connection that reconnects with bounded exponential
//! backoff, keeps itself alive with periodic `ping` envelopes and routes typed
//! inbound envelopes to subscribers.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: facade owning one transport at a time, the heartbeat and the reconnect schedule
//! - [`Dispatcher`]: typed publish/subscribe registry with a `*` wildcard
//! - [`ReconnectScheduler`]: `min(base * 2^(k-1), cap)` backoff, bounded by a maximum attempt count
//! - [`Transport`]: seam for the underlying duplex text transport; [`WsTransport`] binds it to WebSocket
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt as _;
//! use preipo_client_sdk::ws::config::Config;
//! use preipo_client_sdk::ws::{CONNECTION, ConnectionManager};
//!
//! # async fn example() -> preipo_client_sdk::Result<()> {
//! let connection = ConnectionManager::new(
//!     Config::builder().endpoint("wss://realtime.example.com/ws").build(),
//! )?;
//!
//! let mut status = Box::pin(connection.stream(CONNECTION));
//! connection.connect();
//!
//! while let Some(event) = status.next().await {
//!     println!("{:?}", event.as_connection_status());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod envelope;
pub mod error;
mod heartbeat;
pub mod reconnect;
mod task;
pub mod traits;
#[cfg(feature = "ws")]
pub mod transport;

pub use connection::{ConnectionManager, ConnectionState};
pub use dispatcher::{Callback, Dispatcher, Subscription};
pub use envelope::{
    CONNECTION, ConnectionStatus, ERROR, Envelope, ErrorPayload, Event, PING, PONG, Status,
    WILDCARD,
};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use reconnect::ReconnectScheduler;
pub use traits::*;
#[cfg(feature = "ws")]
#[expect(
    clippy::module_name_repetitions,
    reason = "WsTransport names the protocol it binds the transport seam to"
)]
pub use transport::WsTransport;
