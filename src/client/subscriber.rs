use std::fmt;

use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::broker::message::Message;
use crate::utils::BrokerError;

/// Identity of one pub/sub connection. Two handles are the same subscriber
/// exactly when their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Messages a connection may have waiting for its socket before further
/// publishes to it are dropped.
pub const OUTBOUND_BUFFER: usize = 64;

/// Handle to a live subscriber connection.
///
/// Holds the sending side of the connection's bounded outbound queue; the
/// transport owns the receiving side and writes each message to the socket as
/// one line. The broker never closes the connection itself, it only forgets
/// the handle.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: ConnectionId,
    sender: Sender<Message>,
}

impl Subscriber {
    /// Create a handle with a fresh id.
    pub fn new(sender: Sender<Message>) -> Self {
        Self {
            id: ConnectionId::new(),
            sender,
        }
    }

    /// Queue `message` for this connection without waiting on the socket.
    ///
    /// A full buffer drops the message for this connection only.
    pub fn deliver(&self, message: &Message) -> Result<(), BrokerError> {
        self.sender
            .try_send(message.clone())
            .map_err(|e| match e {
                TrySendError::Full(_) => BrokerError::SubscriberBacklogged {
                    pending: self.sender.max_capacity(),
                },
                TrySendError::Closed(_) => BrokerError::ConnectionClosed,
            })
    }
}
