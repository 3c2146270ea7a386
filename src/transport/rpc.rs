//! Remote-call transport
//!
//! A WebSocket server that turns JSON request frames into broker operations.
//! Responsibilities:
//! - Accept TCP/WebSocket connections
//! - Run every request as its own task, so a synchronous put waiting for a
//!   consumer never holds up other calls on the same connection
//! - Map broker outcomes onto replies (`QueueFull` becomes
//!   `is_buffer_overflow`, other failures become `error` replies)
//! - Abort a connection's outstanding calls when it closes

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Broker;
use crate::transport::message::{BrokerCall, BrokerReply, RpcRequest, RpcResponse};
use crate::utils::{BrokerError, ErrorKind, ServerError};

/// Run one call against the broker and shape its reply.
pub async fn dispatch(broker: &Broker, call: BrokerCall) -> BrokerReply {
    match call {
        BrokerCall::PutMessage { message, is_async } => {
            match broker.put_message(message, is_async).await {
                Ok(()) => BrokerReply::PutMessage {
                    is_buffer_overflow: false,
                },
                Err(BrokerError::QueueFull { .. }) => BrokerReply::PutMessage {
                    is_buffer_overflow: true,
                },
                Err(e) => e.into(),
            }
        }
        BrokerCall::PutBackMessage { message } => match broker.put_back_message(message) {
            Ok(()) => BrokerReply::PutBackMessage {
                is_buffer_overflow: false,
            },
            Err(BrokerError::QueueFull { .. }) => BrokerReply::PutBackMessage {
                is_buffer_overflow: true,
            },
            Err(e) => e.into(),
        },
        BrokerCall::GetMessage => BrokerReply::GetMessage {
            message: broker.get_message(),
        },
        BrokerCall::GetBackMessage => BrokerReply::GetBackMessage {
            message: broker.get_back_message(),
        },
        BrokerCall::CreateTopic { topic_name } => match broker.create_topic(&topic_name) {
            Ok(()) => BrokerReply::CreateTopic,
            Err(e) => e.into(),
        },
        BrokerCall::Publish {
            topic_name,
            message,
        } => match broker.publish(&topic_name, &message) {
            Ok(delivery) => BrokerReply::Publish {
                delivered: delivery.delivered,
            },
            Err(e) => e.into(),
        },
    }
}

/// Bind `addr` and serve remote calls until the task is dropped.
pub async fn start_rpc_server(addr: &str, broker: Arc<Broker>) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr).await?;
    info!("RPC server listening on ws://{}", listener.local_addr()?);
    serve_rpc(listener, broker).await;
    Ok(())
}

/// Accept loop over an already bound listener. Accept errors only affect the
/// connection that failed.
pub async fn serve_rpc(listener: TcpListener, broker: Arc<Broker>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(handle_rpc_connection(stream, peer.to_string(), broker.clone()));
            }
            Err(e) => warn!("RPC accept error: {e}"),
        }
    }
}

/// Serve one WebSocket connection until it closes.
pub async fn handle_rpc_connection<S>(stream: S, peer: String, broker: Arc<Broker>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error from {peer}: {e}");
            return;
        }
    };
    info!("RPC client {peer} connected");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<RpcResponse>();

    // replies may finish out of order; this task owns the sink
    let send_loop = {
        let peer = peer.clone();
        tokio::spawn(async move {
            while let Some(response) = rx.recv().await {
                let text = match serde_json::to_string(&response) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize reply {}: {e}", response.id);
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(WsMessage::text(text)).await {
                    debug!("Failed to send reply to {peer}: {e}");
                    break;
                }
            }
        })
    };

    let mut calls = JoinSet::new();
    loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<RpcRequest>(text.as_str()) {
                        Ok(RpcRequest { id, call }) => {
                            debug!("{peer} called {} (id {id})", call.method());
                            let broker = broker.clone();
                            let tx = tx.clone();
                            calls.spawn(async move {
                                let reply = dispatch(&broker, call).await;
                                let _ = tx.send(RpcResponse { id, reply });
                            });
                        }
                        Err(e) => {
                            warn!(
                                "Invalid request from {peer}: {e} | {}",
                                text.as_str().chars().take(100).collect::<String>()
                            );
                            let _ = tx.send(RpcResponse {
                                id: 0,
                                reply: BrokerReply::Error {
                                    kind: ErrorKind::BadRequest,
                                    message: e.to_string(),
                                },
                            });
                        }
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Read error from {peer}: {e}");
                    break;
                }
            },
            Some(_) = calls.join_next(), if !calls.is_empty() => {}
        }
    }

    // outstanding calls die with the connection; their queued messages stay
    calls.shutdown().await;
    drop(tx);
    let _ = send_loop.await;
    info!("RPC client {peer} disconnected");
}
