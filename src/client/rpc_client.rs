//! Remote-call client
//!
//! `BrokerClient` holds one WebSocket connection to the RPC listener and
//! issues calls one at a time, matching each reply by request id.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Message;
use crate::transport::message::{BrokerCall, BrokerReply, RpcRequest, RpcResponse};
use crate::utils::ClientError;

pub struct BrokerClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
}

impl BrokerClient {
    /// Connect to the RPC listener at `addr` (`host:port`).
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let (ws, _response) = connect_async(format!("ws://{addr}")).await?;
        Ok(Self { ws, next_id: 1 })
    }

    /// Send `call` and wait for its reply. `error` replies become
    /// `ClientError::Remote`.
    pub async fn call(&mut self, call: BrokerCall) -> Result<BrokerReply, ClientError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = serde_json::to_string(&RpcRequest { id, call })?;
        self.ws.send(WsMessage::text(request)).await?;

        while let Some(frame) = self.ws.next().await {
            let text = match frame? {
                WsMessage::Text(text) => text,
                WsMessage::Close(_) => break,
                _ => continue,
            };
            let response: RpcResponse = serde_json::from_str(text.as_str())?;
            if response.id != id {
                debug!("Skipping reply {} while waiting for {id}", response.id);
                continue;
            }
            return match response.reply {
                BrokerReply::Error { kind, message } => Err(ClientError::Remote { kind, message }),
                reply => Ok(reply),
            };
        }
        Err(ClientError::ConnectionClosed)
    }

    /// Returns `true` when the send queue was full.
    pub async fn put_message(
        &mut self,
        message: impl Into<Message>,
        is_async: bool,
    ) -> Result<bool, ClientError> {
        let call = BrokerCall::PutMessage {
            message: message.into(),
            is_async,
        };
        match self.call(call).await? {
            BrokerReply::PutMessage { is_buffer_overflow } => Ok(is_buffer_overflow),
            _ => Err(ClientError::UnexpectedReply {
                method: "put_message",
            }),
        }
    }

    /// Returns `true` when the recv queue was full.
    pub async fn put_back_message(
        &mut self,
        message: impl Into<Message>,
    ) -> Result<bool, ClientError> {
        let call = BrokerCall::PutBackMessage {
            message: message.into(),
        };
        match self.call(call).await? {
            BrokerReply::PutBackMessage { is_buffer_overflow } => Ok(is_buffer_overflow),
            _ => Err(ClientError::UnexpectedReply {
                method: "put_back_message",
            }),
        }
    }

    pub async fn get_message(&mut self) -> Result<Option<Message>, ClientError> {
        match self.call(BrokerCall::GetMessage).await? {
            BrokerReply::GetMessage { message } => Ok(message),
            _ => Err(ClientError::UnexpectedReply {
                method: "get_message",
            }),
        }
    }

    pub async fn get_back_message(&mut self) -> Result<Option<Message>, ClientError> {
        match self.call(BrokerCall::GetBackMessage).await? {
            BrokerReply::GetBackMessage { message } => Ok(message),
            _ => Err(ClientError::UnexpectedReply {
                method: "get_back_message",
            }),
        }
    }

    pub async fn create_topic(&mut self, topic_name: &str) -> Result<(), ClientError> {
        let call = BrokerCall::CreateTopic {
            topic_name: topic_name.to_string(),
        };
        match self.call(call).await? {
            BrokerReply::CreateTopic => Ok(()),
            _ => Err(ClientError::UnexpectedReply {
                method: "create_topic",
            }),
        }
    }

    /// Returns how many subscribers the message was queued for.
    pub async fn publish(
        &mut self,
        topic_name: &str,
        message: impl Into<Message>,
    ) -> Result<usize, ClientError> {
        let call = BrokerCall::Publish {
            topic_name: topic_name.to_string(),
            message: message.into(),
        };
        match self.call(call).await? {
            BrokerReply::Publish { delivered } => Ok(delivered),
            _ => Err(ClientError::UnexpectedReply { method: "publish" }),
        }
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.ws.close(None).await?;
        Ok(())
    }
}
