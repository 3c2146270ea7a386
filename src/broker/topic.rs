//! Topic management
//!
//! A `Topic` holds the subscriber handles for one topic name, and the
//! `TopicRegistry` maps names to topics. Topics are created explicitly and
//! live as long as the registry; subscribing to a missing topic is an error,
//! not an implicit create.
//!
//! Callers must synchronize access to the registry (the broker keeps it
//! behind a mutex). Publishing only queues messages on each subscriber's
//! outbound channel, so it is safe to do under that lock.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::broker::message::Message;
use crate::client::{ConnectionId, Subscriber};
use crate::utils::BrokerError;

#[derive(Debug)]
pub struct Topic {
    pub name: String,
    subscribers: Vec<Subscriber>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: Vec::new(),
        }
    }

    /// Add a subscriber. Subscribing the same connection twice is a no-op.
    pub fn subscribe(&mut self, subscriber: Subscriber) {
        if !self.contains(&subscriber.id) {
            self.subscribers.push(subscriber);
        }
    }

    /// Remove a subscriber, returning whether it was present.
    pub fn unsubscribe(&mut self, id: &ConnectionId) -> bool {
        match self.subscribers.iter().position(|s| &s.id == id) {
            Some(i) => {
                self.subscribers.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.subscribers.iter().any(|s| &s.id == id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &Subscriber> {
        self.subscribers.iter()
    }
}

/// Outcome of a publish that found its topic.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: HashMap<String, Topic>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_topic(&mut self, name: &str) -> Result<(), BrokerError> {
        if self.topics.contains_key(name) {
            return Err(BrokerError::TopicAlreadyExists(name.to_string()));
        }
        self.topics.insert(name.to_string(), Topic::new(name));
        Ok(())
    }

    pub fn subscribe(&mut self, name: &str, subscriber: Subscriber) -> Result<(), BrokerError> {
        let topic = self
            .topics
            .get_mut(name)
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))?;
        topic.subscribe(subscriber);
        Ok(())
    }

    /// Remove `id` from `name`. Unknown topics and non-members are no-ops.
    pub fn unsubscribe(&mut self, name: &str, id: &ConnectionId) -> bool {
        self.topics
            .get_mut(name)
            .is_some_and(|topic| topic.unsubscribe(id))
    }

    /// Drop `id` from every topic, returning how many topics it left.
    pub fn remove_connection_everywhere(&mut self, id: &ConnectionId) -> usize {
        let mut removed = 0;
        for topic in self.topics.values_mut() {
            if topic.unsubscribe(id) {
                debug!("Unsubscribed {id} from topic {}", topic.name);
                removed += 1;
            }
        }
        removed
    }

    /// Queue `message` for every current subscriber of `name`.
    ///
    /// A closed or backlogged subscriber is logged and counted in `failed`; it
    /// never stops delivery to the rest.
    pub fn publish(&self, name: &str, message: &Message) -> Result<Delivery, BrokerError> {
        let topic = self
            .topics
            .get(name)
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))?;

        let mut delivery = Delivery::default();
        for subscriber in topic.subscribers() {
            match subscriber.deliver(message) {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    warn!("Failed to send to {} on topic {name}: {e}", subscriber.id);
                    delivery.failed += 1;
                }
            }
        }
        Ok(delivery)
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.values()
    }
}
