//! The `transport` module is responsible for network communication with
//! clients.
//!
//! It defines the wire formats, the WebSocket remote-call server that
//! dispatches requests to the broker, and the line-oriented pub/sub server
//! that registers subscriber connections.

pub mod message;
pub mod pubsub;
pub mod rpc;

#[cfg(test)]
mod rpc_tests;

pub use message::{BrokerCall, BrokerReply, PubSubCommand, RpcRequest, RpcResponse};
pub use pubsub::{handle_subscriber_connection, serve_pubsub, start_pubsub_server};
pub use rpc::{dispatch, serve_rpc, start_rpc_server};
