//! Broker engine
//!
//! The `Broker` owns the send queue, the recv (return) queue and the topic
//! registry, and implements the remote operations on top of them.
//!
//! Concurrency and usage notes:
//! - The broker is shared as `Arc<Broker>`; every structure sits behind its
//!   own `std::sync::Mutex` and each operation takes exactly one lock for one
//!   short critical section. No lock is ever held across an `.await`.
//! - A synchronous put parks on a oneshot channel stored next to its message
//!   in the send queue. `get_message` fires the channel of the entry it pops,
//!   so each producer wakes for its own message and nobody else's.
//! - Dropping a pending `put_message` future (the caller disconnected) leaves
//!   the message queued; the consumer's later signal goes nowhere.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::broker::message::Message;
use crate::broker::queue::{BoundedQueue, DEFAULT_CAPACITY};
use crate::broker::topic::{Delivery, TopicRegistry};
use crate::client::{ConnectionId, Subscriber};
use crate::config::BrokerSettings;
use crate::utils::BrokerError;

/// A send-queue entry: the message plus the waiting producer, if synchronous.
#[derive(Debug)]
struct Pending {
    message: Message,
    on_consumed: Option<oneshot::Sender<()>>,
}

/// Name and subscriber count of one topic, for the operator console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub name: String,
    pub subscribers: usize,
}

#[derive(Debug)]
pub struct Broker {
    send_queue: Mutex<BoundedQueue<Pending>>,
    recv_queue: Mutex<BoundedQueue<Message>>,
    topics: Mutex<TopicRegistry>,
    delivery_timeout: Option<Duration>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // every critical section leaves its structure consistent, so a panic
    // elsewhere does not invalidate the data
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Broker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, None)
    }

    pub fn from_settings(settings: &BrokerSettings) -> Self {
        Self::with_capacity(settings.queue_capacity, settings.delivery_timeout())
    }

    /// Both queues get `capacity`; `delivery_timeout` bounds synchronous
    /// puts (`None` waits indefinitely).
    pub fn with_capacity(capacity: usize, delivery_timeout: Option<Duration>) -> Self {
        Self {
            send_queue: Mutex::new(BoundedQueue::new(capacity)),
            recv_queue: Mutex::new(BoundedQueue::new(capacity)),
            topics: Mutex::new(TopicRegistry::new()),
            delivery_timeout,
        }
    }

    pub fn delivery_timeout(&self) -> Option<Duration> {
        self.delivery_timeout
    }

    /// Enqueue `message` on the send queue.
    ///
    /// With `is_async` the call returns as soon as the message is queued.
    /// Otherwise it waits until a consumer takes this very message with
    /// [`Broker::get_message`], failing with `DeliveryTimeout` if the
    /// configured timeout runs out first (the message stays queued) or
    /// `MessageDiscarded` if the queue is cleared under it.
    pub async fn put_message(&self, message: Message, is_async: bool) -> Result<(), BrokerError> {
        if is_async {
            return self.enqueue(message, None);
        }

        let (tx, rx) = oneshot::channel();
        self.enqueue(message, Some(tx))?;

        let consumed = match self.delivery_timeout {
            Some(limit) => tokio::time::timeout(limit, rx).await.map_err(|_| {
                warn!("Synchronous put not consumed within {limit:?}");
                BrokerError::DeliveryTimeout(limit)
            })?,
            None => rx.await,
        };
        consumed.map_err(|_| BrokerError::MessageDiscarded)
    }

    fn enqueue(
        &self,
        message: Message,
        on_consumed: Option<oneshot::Sender<()>>,
    ) -> Result<(), BrokerError> {
        let mut queue = lock(&self.send_queue);
        let capacity = queue.capacity();
        queue
            .put(Pending {
                message,
                on_consumed,
            })
            .map_err(|_| BrokerError::QueueFull { capacity })?;
        debug!("Send queue length {}", queue.len());
        Ok(())
    }

    /// Pop the oldest message from the send queue and release its producer
    /// if it is waiting.
    pub fn get_message(&self) -> Option<Message> {
        let pending = lock(&self.send_queue).pop()?;
        if let Some(tx) = pending.on_consumed {
            // Err means the producer already gave up
            let _ = tx.send(());
        }
        Some(pending.message)
    }

    /// Enqueue a result on the recv queue. Never waits.
    pub fn put_back_message(&self, message: Message) -> Result<(), BrokerError> {
        let mut queue = lock(&self.recv_queue);
        let capacity = queue.capacity();
        queue
            .put(message)
            .map_err(|_| BrokerError::QueueFull { capacity })
    }

    pub fn get_back_message(&self) -> Option<Message> {
        lock(&self.recv_queue).pop()
    }

    pub fn create_topic(&self, name: &str) -> Result<(), BrokerError> {
        lock(&self.topics).create_topic(name)?;
        info!("Created topic {name}");
        Ok(())
    }

    pub fn subscribe(&self, name: &str, subscriber: Subscriber) -> Result<(), BrokerError> {
        lock(&self.topics).subscribe(name, subscriber)
    }

    pub fn unsubscribe(&self, name: &str, id: &ConnectionId) -> bool {
        lock(&self.topics).unsubscribe(name, id)
    }

    /// Forget `id` in every topic; safe for connections that never subscribed.
    pub fn remove_connection_everywhere(&self, id: &ConnectionId) -> usize {
        lock(&self.topics).remove_connection_everywhere(id)
    }

    pub fn publish(&self, name: &str, message: &Message) -> Result<Delivery, BrokerError> {
        let delivery = lock(&self.topics).publish(name, message)?;
        debug!(
            "Published to {name}: {} delivered, {} failed",
            delivery.delivered, delivery.failed
        );
        Ok(delivery)
    }

    /// Send-queue contents, oldest first.
    pub fn send_queue_snapshot(&self) -> Vec<Message> {
        lock(&self.send_queue)
            .iter()
            .map(|p| p.message.clone())
            .collect()
    }

    /// Recv-queue contents, oldest first.
    pub fn recv_queue_snapshot(&self) -> Vec<Message> {
        lock(&self.recv_queue).iter().cloned().collect()
    }

    /// Empty the send queue. Producers still waiting on a cleared message
    /// get `MessageDiscarded`.
    pub fn clear_send_queue(&self) -> usize {
        lock(&self.send_queue).clear()
    }

    pub fn clear_recv_queue(&self) -> usize {
        lock(&self.recv_queue).clear()
    }

    /// Every topic with its subscriber count, sorted by name.
    pub fn topic_summaries(&self) -> Vec<TopicSummary> {
        let mut summaries: Vec<TopicSummary> = lock(&self.topics)
            .topics()
            .map(|t| TopicSummary {
                name: t.name.clone(),
                subscribers: t.subscriber_count(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }
}
