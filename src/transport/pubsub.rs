//! Pub/sub connection handling
//!
//! Every accepted connection gets one task that reads `subscribe <topic>` /
//! `unsubscribe <topic>` lines and a send loop that writes published
//! messages back, one per line. Lines that are not valid UTF-8 or not a known
//! command are skipped. When the read side ends (EOF or an I/O error) the
//! connection is removed from every topic before the task exits.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::broker::{Broker, Message};
use crate::client::{ConnectionId, OUTBOUND_BUFFER, Subscriber};
use crate::transport::message::PubSubCommand;
use crate::utils::ServerError;

/// Bind `addr` and accept subscriber connections until the task is dropped.
pub async fn start_pubsub_server(addr: &str, broker: Arc<Broker>) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Pub/sub server listening on {}", listener.local_addr()?);
    serve_pubsub(listener, broker).await;
    Ok(())
}

pub async fn serve_pubsub(listener: TcpListener, broker: Arc<Broker>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("Pub/sub connection from {peer}");
                tokio::spawn(handle_subscriber_connection(stream, broker.clone()));
            }
            Err(e) => warn!("Pub/sub accept error: {e}"),
        }
    }
}

/// Drive one subscriber connection to completion and return its id.
pub async fn handle_subscriber_connection<S>(stream: S, broker: Arc<Broker>) -> ConnectionId
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);
    let subscriber = Subscriber::new(tx);
    let id = subscriber.id;
    info!("{id} connected");

    let send_loop = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let mut line = message.into_inner();
            line.push('\n');
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                debug!("Failed to send message to {id}: {e}");
                break;
            }
        }
    });

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => handle_command(&broker, &subscriber, &String::from_utf8_lossy(&buf)),
            Err(e) => {
                debug!("Read error on {id}: {e}");
                break;
            }
        }
    }

    let removed = broker.remove_connection_everywhere(&id);
    drop(subscriber);
    send_loop.abort();
    info!("{id} disconnected, left {removed} topics");
    id
}

fn handle_command(broker: &Broker, subscriber: &Subscriber, line: &str) {
    let id = subscriber.id;
    match PubSubCommand::parse(line) {
        Some(PubSubCommand::Subscribe(topic)) => {
            match broker.subscribe(&topic, subscriber.clone()) {
                Ok(()) => info!("{id} subscribed to {topic}"),
                Err(e) => warn!("{id} cannot subscribe: {e}"),
            }
        }
        Some(PubSubCommand::Unsubscribe(topic)) => {
            if broker.unsubscribe(&topic, &id) {
                info!("{id} unsubscribed from {topic}");
            }
        }
        None => debug!(
            "Ignoring line from {id}: {}",
            line.chars().take(100).collect::<String>()
        ),
    }
}
