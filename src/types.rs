//! Core types for the broker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A published message. Cloning is a reference-count bump, so fan-out never
/// copies the payload.
pub type Message = bytes::Bytes;

/// Unique identifier for a subscriber within one broker.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time snapshot of a broker. Re-query for fresh values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// Number of subscribers currently registered.
    pub subscriber_count: usize,
    /// Whether the broker has terminated.
    pub terminated: bool,
}

/// Broker configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Name used for the loop thread and in log fields.
    /// Default: "broker"
    pub name: String,

    /// Messages each subscriber conduit can hold before further messages
    /// are skipped for it. Zero means a subscriber only gets a message if it
    /// is blocked in a receive at the moment of fan-out.
    /// Default: 0
    pub subscriber_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            name: "broker".to_string(),
            subscriber_buffer: 0,
        }
    }
}

impl BrokerConfig {
    /// Default configuration with the given per-subscriber buffer.
    pub fn buffered(subscriber_buffer: usize) -> Self {
        Self {
            subscriber_buffer,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: BrokerConfig = serde_json::from_str(r#"{"subscriber_buffer": 4}"#).unwrap();
        assert_eq!(config.name, "broker");
        assert_eq!(config.subscriber_buffer, 4);

        let config: BrokerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BrokerConfig::default());
    }

    #[test]
    fn test_info_serializes() {
        let info = Info {
            subscriber_count: 3,
            terminated: false,
        };
        let json = serde_json::to_value(info).unwrap();
        assert_eq!(json["subscriber_count"], 3);
        assert_eq!(json["terminated"], false);
    }

    #[test]
    fn test_subscriber_id_formatting() {
        let id = SubscriberId(7);
        assert_eq!(format!("{}", id), "7");
        assert_eq!(format!("{:?}", id), "SubscriberId(7)");
    }
}
