//! # oneway
//!
//! A single-process, one-directional publish/fan-out broker. One writer
//! publishes byte messages; any number of subscribers, joining and leaving
//! at will, receive them. Subscribers cannot write back.
//!
//! ## Core Concepts
//!
//! - **Broker**: thread-safe facade over a single coordination loop
//! - **Subscriber**: receive-only handle with a detach operation
//! - **CancelToken**: idempotent cancellation shared by a broker and its parent
//! - **Best-effort delivery**: a subscriber that is not ready misses the message;
//!   the publisher never waits on it
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use oneway::{Broker, BrokerConfig, CancelToken};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let shutdown = CancelToken::new();
//! let broker = Arc::new(Broker::with_parent(&shutdown, BrokerConfig::buffered(8)));
//! let driver = broker.spawn()?;
//!
//! let subscriber = broker.subscribe()?;
//! let consumer = thread::spawn(move || {
//!     let mut seen = Vec::new();
//!     for message in subscriber.iter() {
//!         seen.push(String::from_utf8_lossy(&message).into_owned());
//!     }
//!     seen
//! });
//!
//! broker.publish("Hello World!")?;
//! shutdown.cancel();
//!
//! assert_eq!(consumer.join().unwrap(), vec!["Hello World!".to_string()]);
//! assert!(driver.join().unwrap().is_err());
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod cancel;
pub mod error;
pub mod types;

// Re-exports
pub use broker::{Broker, Subscriber};
pub use cancel::CancelToken;
pub use error::{BrokerError, CancelError, Result};
pub use types::{BrokerConfig, Info, Message, SubscriberId};
