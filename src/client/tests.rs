use super::subscriber::{ConnectionId, Subscriber};
use crate::broker::Message;
use crate::utils::BrokerError;
use tokio::sync::mpsc;

#[test]
fn test_subscriber_new() {
    let (tx, _rx) = mpsc::channel::<Message>(4);
    let a = Subscriber::new(tx.clone());
    let b = Subscriber::new(tx);
    assert_ne!(a.id, b.id);
    assert!(a.id.to_string().starts_with("conn-"));
}

#[test]
fn test_subscriber_clone_keeps_identity() {
    let (tx, _rx) = mpsc::channel::<Message>(4);
    let a = Subscriber::new(tx);
    let copy = a.clone();
    assert_eq!(a.id, copy.id);
    assert_ne!(a.id, ConnectionId::new());
}

#[test]
fn test_subscriber_deliver() {
    let (tx, mut rx) = mpsc::channel::<Message>(4);
    let sub = Subscriber::new(tx);
    sub.deliver(&Message::from("ping")).unwrap();
    assert_eq!(rx.try_recv().unwrap().as_str(), "ping");
}

#[test]
fn test_subscriber_deliver_after_close() {
    let (tx, rx) = mpsc::channel::<Message>(4);
    let sub = Subscriber::new(tx);
    drop(rx);
    assert_eq!(
        sub.deliver(&Message::from("lost")),
        Err(BrokerError::ConnectionClosed)
    );
}

#[test]
fn test_subscriber_deliver_when_buffer_full() {
    let (tx, mut rx) = mpsc::channel::<Message>(2);
    let sub = Subscriber::new(tx);
    sub.deliver(&Message::from("a")).unwrap();
    sub.deliver(&Message::from("b")).unwrap();
    assert_eq!(
        sub.deliver(&Message::from("c")),
        Err(BrokerError::SubscriberBacklogged { pending: 2 })
    );

    assert_eq!(rx.try_recv().unwrap().as_str(), "a");
    sub.deliver(&Message::from("d")).unwrap();
}
