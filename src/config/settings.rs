use std::time::Duration;

use serde::Deserialize;

use crate::broker::queue::DEFAULT_CAPACITY;

/// Top-level configuration settings for the application.
///
/// Covers the remote-call listener, the pub/sub listener, the broker queues
/// and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub rpc: ServerSettings,
    pub pubsub: ServerSettings,
    pub broker: BrokerSettings,
    pub log: LogSettings,
}

/// Host and port a listener binds to (and clients dial).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration settings for the broker.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub queue_capacity: usize,
    /// How long a synchronous put waits for a consumer. `0` waits forever.
    pub delivery_timeout_secs: u64,
}

impl BrokerSettings {
    pub fn delivery_timeout(&self) -> Option<Duration> {
        (self.delivery_timeout_secs > 0).then(|| Duration::from_secs(self.delivery_timeout_secs))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub rpc: Option<PartialServerSettings>,
    pub pubsub: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub queue_capacity: Option<usize>,
    pub delivery_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialServerSettings {
    fn merge(partial: Option<Self>, default: ServerSettings) -> ServerSettings {
        let Some(partial) = partial else {
            return default;
        };
        ServerSettings {
            host: partial.host.unwrap_or(default.host),
            port: partial.port.unwrap_or(default.port),
        }
    }
}

impl PartialSettings {
    /// Fill every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        Settings {
            rpc: PartialServerSettings::merge(self.rpc, default.rpc),
            pubsub: PartialServerSettings::merge(self.pubsub, default.pubsub),
            broker: BrokerSettings {
                queue_capacity: self
                    .broker
                    .as_ref()
                    .and_then(|b| b.queue_capacity)
                    .unwrap_or(default.broker.queue_capacity),
                delivery_timeout_secs: self
                    .broker
                    .as_ref()
                    .and_then(|b| b.delivery_timeout_secs)
                    .unwrap_or(default.broker.delivery_timeout_secs),
            },
            log: LogSettings {
                level: self
                    .log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 7070,
            },
            pubsub: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 7071,
            },
            broker: BrokerSettings::default(),
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_CAPACITY,
            delivery_timeout_secs: 30,
        }
    }
}
