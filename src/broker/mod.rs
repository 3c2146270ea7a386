//! The broker core: two bounded queues, the topic registry and the
//! operations remote callers and pub/sub connections drive.

pub mod engine;
pub mod message;
pub mod queue;
pub mod topic;

pub use engine::{Broker, TopicSummary};
pub use message::Message;
pub use queue::{BoundedQueue, QueueFull};
pub use topic::{Delivery, Topic, TopicRegistry};
