//! The `error` module defines the error types used within `minibroker`.
//!
//! `BrokerError` is what the broker core reports to callers. `ErrorKind` is its
//! wire form inside an error reply. `ServerError` and `ClientError` cover the
//! network edges.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Failures reported by the broker core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// The queue already holds `capacity` messages. Remote callers see this as
    /// `is_buffer_overflow`, never as an error reply.
    #[error("buffer is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("topic '{0}' already exists")]
    TopicAlreadyExists(String),

    #[error("topic '{0}' doesn't exist")]
    TopicNotFound(String),

    #[error("message was not consumed within {0:?}")]
    DeliveryTimeout(Duration),

    #[error("message was cleared from the queue before it was consumed")]
    MessageDiscarded,

    #[error("connection closed")]
    ConnectionClosed,

    /// The subscriber's outbound buffer is full; it is not reading its socket.
    #[error("subscriber is not keeping up ({pending} messages pending)")]
    SubscriberBacklogged { pending: usize },
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::QueueFull { .. } => ErrorKind::QueueFull,
            BrokerError::TopicAlreadyExists(_) => ErrorKind::TopicAlreadyExists,
            BrokerError::TopicNotFound(_) => ErrorKind::TopicNotFound,
            BrokerError::DeliveryTimeout(_) => ErrorKind::DeliveryTimeout,
            BrokerError::MessageDiscarded => ErrorKind::MessageDiscarded,
            BrokerError::ConnectionClosed => ErrorKind::ConnectionClosed,
            BrokerError::SubscriberBacklogged { .. } => ErrorKind::SubscriberBacklogged,
        }
    }
}

/// Discriminant carried by `error` replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    QueueFull,
    TopicAlreadyExists,
    TopicNotFound,
    DeliveryTimeout,
    MessageDiscarded,
    ConnectionClosed,
    SubscriberBacklogged,
    BadRequest,
}

/// Failures that stop a listener from starting or running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures seen by `BrokerClient` and the subscriber CLI.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("malformed reply: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection closed by broker")]
    ConnectionClosed,

    #[error("unexpected reply for {method}")]
    UnexpectedReply { method: &'static str },

    #[error("{message}")]
    Remote { kind: ErrorKind, message: String },
}
