//! Wire envelope and the locally synthesized status events.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound heartbeat type.
pub const PING: &str = "ping";
/// Inbound heartbeat reply, consumed by the connection manager.
pub const PONG: &str = "pong";
/// Local lifecycle notifications, never transmitted.
pub const CONNECTION: &str = "connection";
/// Local transport error notifications, never transmitted.
pub const ERROR: &str = "error";
/// Subscribers registered under this type receive every dispatched event.
pub const WILDCARD: &str = "*";

/// Close code reported when the caller closes the connection.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// The unit exchanged over the transport.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub data: Value,
    /// Milliseconds since the Unix epoch, set by the sender
    #[serde(default)]
    pub timestamp: i64,
}

impl Envelope {
    /// Stamp a new envelope with the current time.
    #[must_use]
    pub fn new<S: Into<String>>(msg_type: S, data: Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            data,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    #[must_use]
    pub fn is_pong(&self) -> bool {
        self.msg_type == PONG
    }
}

/// What subscribers receive for every dispatched message, local or remote.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub msg_type: String,
    pub data: Value,
}

impl Event {
    #[must_use]
    pub fn new<S: Into<String>>(msg_type: S, data: Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            data,
        }
    }

    pub(crate) fn status(status: ConnectionStatus) -> Self {
        Self::new(
            CONNECTION,
            serde_json::to_value(status).unwrap_or(Value::Null),
        )
    }

    pub(crate) fn error<S: Into<String>>(error: S) -> Self {
        Self::new(
            ERROR,
            serde_json::to_value(ErrorPayload {
                error: error.into(),
            })
            .unwrap_or(Value::Null),
        )
    }

    /// Returns the lifecycle status if this is a `connection` event.
    #[must_use]
    pub fn as_connection_status(&self) -> Option<ConnectionStatus> {
        if self.msg_type != CONNECTION {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }

    /// Returns the transport error if this is an `error` event.
    #[must_use]
    pub fn as_error(&self) -> Option<ErrorPayload> {
        if self.msg_type != ERROR {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }
}

impl From<Envelope> for Event {
    fn from(envelope: Envelope) -> Self {
        Self {
            msg_type: envelope.msg_type,
            data: envelope.data,
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    Connected,
    Disconnected,
    Failed,
}

/// Payload of a `connection` event.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl ConnectionStatus {
    pub(crate) const CONNECTED: Self = Self {
        status: Status::Connected,
        code: None,
    };

    pub(crate) const FAILED: Self = Self {
        status: Status::Failed,
        code: None,
    };

    pub(crate) const fn disconnected(code: Option<u16>) -> Self {
        Self {
            status: Status::Disconnected,
            code,
        }
    }
}

/// Payload of an `error` event.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}
