use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::broker::{Broker, Message};
use crate::client::OUTBOUND_BUFFER;
use crate::transport::message::{BrokerReply, RpcResponse};
use crate::transport::pubsub::handle_subscriber_connection;
use crate::transport::rpc::serve_rpc;
use crate::utils::ErrorKind;

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn subscriber_count(broker: &Broker, topic: &str) -> usize {
    broker
        .topic_summaries()
        .into_iter()
        .find(|t| t.name == topic)
        .map(|t| t.subscribers)
        .unwrap_or(0)
}

async fn start_rpc(broker: Arc<Broker>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(serve_rpc(listener, broker));
    addr
}

async fn read_response<S>(ws: &mut S) -> RpcResponse
where
    S: Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for reply")
            .expect("stream ended")
            .expect("read error");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_subscriber_lines_register_and_unregister() {
    let broker = Arc::new(Broker::new());
    broker.create_topic("news").unwrap();
    let (client, server) = tokio::io::duplex(1024);
    let handler = tokio::spawn(handle_subscriber_connection(server, broker.clone()));
    let (read_half, mut write_half) = tokio::io::split(client);

    write_half.write_all(b"subscribe news\n").await.unwrap();
    wait_for(|| subscriber_count(&broker, "news") == 1).await;

    broker.publish("news", &Message::from("hello")).unwrap();
    let mut lines = BufReader::new(read_half).lines();
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("hello"));

    write_half.write_all(b"unsubscribe news\r\n").await.unwrap();
    wait_for(|| subscriber_count(&broker, "news") == 0).await;

    drop(write_half);
    drop(lines);
    handler.await.unwrap();
}

#[tokio::test]
async fn test_subscriber_disconnect_cleans_up_every_topic() {
    let broker = Arc::new(Broker::new());
    broker.create_topic("a").unwrap();
    broker.create_topic("b").unwrap();
    let (client, server) = tokio::io::duplex(1024);
    let handler = tokio::spawn(handle_subscriber_connection(server, broker.clone()));
    let (read_half, mut write_half) = tokio::io::split(client);

    write_half
        .write_all(b"subscribe a\nsubscribe b\nsubscribe missing\nbogus line\n")
        .await
        .unwrap();
    wait_for(|| subscriber_count(&broker, "a") == 1 && subscriber_count(&broker, "b") == 1)
        .await;
    assert!(
        !broker
            .topic_summaries()
            .iter()
            .any(|t| t.name == "missing")
    );

    drop(write_half);
    drop(read_half);
    handler.await.unwrap();

    assert_eq!(subscriber_count(&broker, "a"), 0);
    assert_eq!(subscriber_count(&broker, "b"), 0);
    let delivery = broker.publish("a", &Message::from("after")).unwrap();
    assert_eq!(delivery.delivered, 0);
}

#[tokio::test]
async fn test_invalid_utf8_line_keeps_connection_subscribed() {
    let broker = Arc::new(Broker::new());
    broker.create_topic("news").unwrap();
    broker.create_topic("sports").unwrap();
    let (client, server) = tokio::io::duplex(1024);
    let handler = tokio::spawn(handle_subscriber_connection(server, broker.clone()));
    let (read_half, mut write_half) = tokio::io::split(client);

    write_half.write_all(b"subscribe news\n").await.unwrap();
    wait_for(|| subscriber_count(&broker, "news") == 1).await;

    write_half.write_all(b"bogus \xff\xfe\n").await.unwrap();
    write_half.write_all(b"subscribe \xff\n").await.unwrap();
    write_half.write_all(b"subscribe sports\n").await.unwrap();
    wait_for(|| subscriber_count(&broker, "sports") == 1).await;
    assert_eq!(subscriber_count(&broker, "news"), 1);

    broker.publish("news", &Message::from("still here")).unwrap();
    let mut lines = BufReader::new(read_half).lines();
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("still here"));

    drop(write_half);
    drop(lines);
    handler.await.unwrap();
    assert_eq!(subscriber_count(&broker, "news"), 0);
}

#[tokio::test]
async fn test_stalled_subscriber_does_not_buffer_without_limit() {
    let broker = Arc::new(Broker::new());
    broker.create_topic("news").unwrap();
    let (client, server) = tokio::io::duplex(64);
    let handler = tokio::spawn(handle_subscriber_connection(server, broker.clone()));
    let (read_half, mut write_half) = tokio::io::split(client);

    write_half.write_all(b"subscribe news\n").await.unwrap();
    wait_for(|| subscriber_count(&broker, "news") == 1).await;

    // the client never reads, so the socket and then the buffer fill up
    let payload = Message::new("x".repeat(1024));
    let (mut delivered, mut failed) = (0, 0);
    for _ in 0..1000 {
        let delivery = broker.publish("news", &payload).unwrap();
        delivered += delivery.delivered;
        failed += delivery.failed;
        tokio::task::yield_now().await;
    }
    assert!(delivered <= OUTBOUND_BUFFER + 1, "delivered {delivered}");
    assert_eq!(delivered + failed, 1000);
    assert_eq!(subscriber_count(&broker, "news"), 1);

    drop(write_half);
    drop(read_half);
    handler.await.unwrap();
}

#[tokio::test]
async fn test_multiline_payload_arrives_as_separate_lines() {
    let broker = Arc::new(Broker::new());
    broker.create_topic("news").unwrap();
    let (client, server) = tokio::io::duplex(1024);
    let handler = tokio::spawn(handle_subscriber_connection(server, broker.clone()));
    let (read_half, mut write_half) = tokio::io::split(client);

    write_half.write_all(b"subscribe news\n").await.unwrap();
    wait_for(|| subscriber_count(&broker, "news") == 1).await;

    let delivery = broker
        .publish("news", &Message::from("first\nsecond"))
        .unwrap();
    assert_eq!(delivery.delivered, 1);
    let mut lines = BufReader::new(read_half).lines();
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("first"));
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("second"));

    drop(write_half);
    drop(lines);
    handler.await.unwrap();
}

#[tokio::test]
async fn test_rpc_round_trip_over_websocket() {
    let broker = Arc::new(Broker::new());
    let addr = start_rpc(broker.clone()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("WebSocket handshake failed");

    let put = json!({ "id": 1, "method": "put_message", "message": "x", "is_async": true });
    ws.send(WsMessage::text(put.to_string())).await.unwrap();
    let response = read_response(&mut ws).await;
    assert_eq!(response.id, 1);
    assert_eq!(
        response.reply,
        BrokerReply::PutMessage {
            is_buffer_overflow: false
        }
    );
    assert_eq!(broker.send_queue_snapshot(), vec![Message::from("x")]);

    let get = json!({ "id": 2, "method": "get_message" });
    ws.send(WsMessage::text(get.to_string())).await.unwrap();
    let response = read_response(&mut ws).await;
    assert_eq!(response.id, 2);
    assert_eq!(
        response.reply,
        BrokerReply::GetMessage {
            message: Some(Message::from("x"))
        }
    );
}

#[tokio::test]
async fn test_rpc_bad_request_keeps_connection_open() {
    let broker = Arc::new(Broker::new());
    let addr = start_rpc(broker).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();

    ws.send(WsMessage::text("not json".to_string())).await.unwrap();
    let response = read_response(&mut ws).await;
    assert_eq!(response.id, 0);
    match response.reply {
        BrokerReply::Error { kind, .. } => assert_eq!(kind, ErrorKind::BadRequest),
        other => panic!("Expected bad request, got {other:?}"),
    }

    let create = json!({ "id": 5, "method": "create_topic", "topic_name": "t" });
    ws.send(WsMessage::text(create.to_string())).await.unwrap();
    let response = read_response(&mut ws).await;
    assert_eq!(response.id, 5);
    assert_eq!(response.reply, BrokerReply::CreateTopic);
}

#[tokio::test]
async fn test_sync_put_does_not_block_other_calls_on_connection() {
    let broker = Arc::new(Broker::new());
    let addr = start_rpc(broker.clone()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();

    let put = json!({ "id": 1, "method": "put_message", "message": "y", "is_async": false });
    ws.send(WsMessage::text(put.to_string())).await.unwrap();
    wait_for(|| broker.send_queue_snapshot().len() == 1).await;

    // the consumer shares the connection; its reply arrives first
    let get = json!({ "id": 2, "method": "get_message" });
    ws.send(WsMessage::text(get.to_string())).await.unwrap();

    let mut replies = vec![read_response(&mut ws).await, read_response(&mut ws).await];
    replies.sort_by_key(|r| r.id);
    assert_eq!(
        replies[0].reply,
        BrokerReply::PutMessage {
            is_buffer_overflow: false
        }
    );
    assert_eq!(
        replies[1].reply,
        BrokerReply::GetMessage {
            message: Some(Message::from("y"))
        }
    );
}

#[tokio::test]
async fn test_closing_connection_abandons_sync_put() {
    let broker = Arc::new(Broker::new());
    let addr = start_rpc(broker.clone()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();

    let put = json!({ "id": 1, "method": "put_message", "message": "left", "is_async": false });
    ws.send(WsMessage::text(put.to_string())).await.unwrap();
    wait_for(|| broker.send_queue_snapshot().len() == 1).await;
    ws.close(None).await.unwrap();
    drop(ws);

    // the message stays queued and can still be consumed
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(broker.get_message(), Some(Message::from("left")));
}
