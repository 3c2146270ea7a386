use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque text payload moved through the queues and fanned out to topics.
///
/// Messages carry no id, timestamp or topic; two messages are equal when their
/// contents are equal.
///
/// Subscribers receive each message as one `\n`-terminated line, unescaped,
/// so a payload containing a newline arrives as several lines. Queue
/// operations carry such payloads intact.
///
/// # Example
///
/// ```rust
/// use minibroker::broker::Message;
///
/// let msg = Message::from("job-42");
/// assert_eq!(msg.as_str(), "job-42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(String);

impl Message {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for Message {
    fn from(payload: String) -> Self {
        Self(payload)
    }
}

impl From<&str> for Message {
    fn from(payload: &str) -> Self {
        Self(payload.to_string())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
