//! Wire formats
//!
//! Remote calls travel as JSON text frames. A request names its method in the
//! `method` field next to its parameters; the reply echoes the request `id`
//! and names its shape in `type`:
//!
//! ```text
//! → {"id":7,"method":"put_message","message":"job-1","is_async":false}
//! ← {"id":7,"type":"put_message","is_buffer_overflow":false}
//! ```
//!
//! Pub/sub connections speak plain lines instead: `subscribe <topic>` and
//! `unsubscribe <topic>` in, one published message per line out.

use serde::{Deserialize, Serialize};

use crate::broker::Message;
use crate::utils::{BrokerError, ErrorKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    #[serde(flatten)]
    pub call: BrokerCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BrokerCall {
    PutMessage { message: Message, is_async: bool },
    PutBackMessage { message: Message },
    GetMessage,
    GetBackMessage,
    CreateTopic { topic_name: String },
    Publish { topic_name: String, message: Message },
}

impl BrokerCall {
    pub fn method(&self) -> &'static str {
        match self {
            BrokerCall::PutMessage { .. } => "put_message",
            BrokerCall::PutBackMessage { .. } => "put_back_message",
            BrokerCall::GetMessage => "get_message",
            BrokerCall::GetBackMessage => "get_back_message",
            BrokerCall::CreateTopic { .. } => "create_topic",
            BrokerCall::Publish { .. } => "publish",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(flatten)]
    pub reply: BrokerReply,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrokerReply {
    PutMessage { is_buffer_overflow: bool },
    PutBackMessage { is_buffer_overflow: bool },
    GetMessage { message: Option<Message> },
    GetBackMessage { message: Option<Message> },
    CreateTopic,
    Publish { delivered: usize },
    Error { kind: ErrorKind, message: String },
}

impl From<BrokerError> for BrokerReply {
    fn from(err: BrokerError) -> Self {
        BrokerReply::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// A decoded line from a pub/sub connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubSubCommand {
    Subscribe(String),
    Unsubscribe(String),
}

impl PubSubCommand {
    /// Decode one line. Unknown verbs and lines without a topic give `None`;
    /// tokens after the topic are ignored.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts.next()?;
        let topic = parts.next()?.to_string();
        match verb {
            "subscribe" => Some(PubSubCommand::Subscribe(topic)),
            "unsubscribe" => Some(PubSubCommand::Unsubscribe(topic)),
            _ => None,
        }
    }

    pub fn to_line(&self) -> String {
        match self {
            PubSubCommand::Subscribe(topic) => format!("subscribe {topic}\n"),
            PubSubCommand::Unsubscribe(topic) => format!("unsubscribe {topic}\n"),
        }
    }
}
