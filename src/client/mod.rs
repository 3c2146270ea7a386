//! The `client` module holds both sides of a broker connection: the
//! `Subscriber` handle the broker keeps for every pub/sub connection, and
//! `BrokerClient`, the remote-call client producers and consumers use, plus
//! `TopicListener` for the subscriber side.

pub mod listener;
pub mod rpc_client;
pub mod subscriber;

pub use listener::TopicListener;
pub use rpc_client::BrokerClient;
pub use subscriber::{ConnectionId, OUTBOUND_BUFFER, Subscriber};

#[cfg(test)]
mod tests;
