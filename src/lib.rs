//! # minibroker
//!
//! `minibroker` is a small in-memory message broker built on tokio. It keeps
//! two bounded FIFO queues for point-to-point work hand-off and a set of named
//! topics for fan-out to live subscriber connections.
//!
//! ## Core Modules
//!
//! - `broker`: the queues, the topic registry and the operations on them.
//! - `client`: subscriber handles plus the remote-call and pub/sub clients.
//! - `config`: server configuration loading.
//! - `transport`: the WebSocket remote-call server and the line-oriented
//!   pub/sub server.
//! - `admin`: operator commands for inspecting and resetting broker state.
//! - `utils`: error types and logging setup.

pub mod admin;
pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
