//! One-way message broker.
//!
//! A [`Broker`] fans out every published message to its current
//! [`Subscriber`]s. One coordination loop owns the subscriber set and
//! serializes all work:
//! - Publishing (non-blocking, best-effort delivery to each subscriber)
//! - Subscribing and detaching
//! - Subscriber count queries
//! - Termination, which closes every remaining subscriber
//!
//! Callers never share memory with the loop; each facade call is a
//! rendezvous on a zero-capacity channel.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use oneway::{Broker, BrokerConfig, BrokerError};
//!
//! let broker = Arc::new(Broker::with_config(BrokerConfig::buffered(1)));
//! let driver = broker.spawn().unwrap();
//!
//! let subscriber = broker.subscribe().unwrap();
//! broker.publish("Hello World!").unwrap();
//! assert_eq!(&subscriber.recv().unwrap()[..], b"Hello World!");
//!
//! broker.stop();
//! assert_eq!(subscriber.recv(), Err(BrokerError::Terminated));
//! assert!(matches!(driver.join().unwrap(), Err(BrokerError::Terminated)));
//! ```

mod coordinator;
mod facade;
mod membership;
mod subscriber;

pub use facade::Broker;
pub use subscriber::Subscriber;
