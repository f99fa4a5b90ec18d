//! The broker's thread-safe entry points.

use super::coordinator::{handoff, Coordinator, Handoff, Join};
use super::subscriber::Subscriber;
use crate::cancel::CancelToken;
use crate::error::{BrokerError, Result};
use crate::types::{BrokerConfig, Info, Message, SubscriberId};
use crossbeam_channel::{bounded, select};
use std::convert::Infallible;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, debug_span, warn};

/// A single-writer, many-reader message broker.
///
/// Every message handed to [`publish`](Broker::publish) is offered to each
/// registered [`Subscriber`] without blocking. Subscribers that are not ready
/// miss that message. The broker must be driven by exactly one call to
/// [`start`](Broker::start) (or [`spawn`](Broker::spawn)) running alongside
/// the other methods, all of which may be called from any thread.
pub struct Broker {
    config: BrokerConfig,
    token: CancelToken,
    handoff: Handoff,
    coordinator: Coordinator,
    started: AtomicBool,
    next_id: AtomicU64,
}

impl Broker {
    /// Create a broker with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    pub fn with_config(config: BrokerConfig) -> Self {
        Self::build(CancelToken::new(), config)
    }

    /// Create a broker that also terminates when `parent` is cancelled.
    pub fn with_parent(parent: &CancelToken, config: BrokerConfig) -> Self {
        Self::build(parent.child(), config)
    }

    fn build(token: CancelToken, config: BrokerConfig) -> Self {
        let (handoff, coordinator) = handoff();
        Self {
            config,
            token,
            handoff,
            coordinator,
            started: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    /// The configuration this broker was built with.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Run the coordination loop on the calling thread until the broker is
    /// stopped or its parent token is cancelled.
    ///
    /// Returns `Err(BrokerError::Terminated)` on shutdown, or
    /// `Err(BrokerError::AlreadyStarted)` if the loop was started before.
    pub fn start(&self) -> Result<Infallible> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!(broker = %self.config.name, "start called on a broker that was already started");
            return Err(BrokerError::AlreadyStarted);
        }

        let span = debug_span!("broker", name = %self.config.name);
        let _enter = span.enter();
        Err(self.coordinator.run(&self.token))
    }

    /// Run [`start`](Broker::start) on a dedicated thread named after the
    /// broker.
    pub fn spawn(self: &Arc<Self>) -> io::Result<JoinHandle<Result<Infallible>>> {
        let broker = Arc::clone(self);
        thread::Builder::new()
            .name(self.config.name.clone())
            .spawn(move || broker.start())
    }

    /// Trigger termination. Does not wait for the loop to finish.
    ///
    /// Returns true for the call that actually stopped the broker.
    pub fn stop(&self) -> bool {
        let stopped = self.token.cancel();
        if stopped {
            debug!(broker = %self.config.name, "stop requested");
        }
        stopped
    }

    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The broker's own cancellation token. It fires when the broker
    /// terminates, whatever the trigger.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.token
    }

    /// Hand `message` to the loop for fan-out.
    ///
    /// Blocks only until the loop accepts the message, never on subscriber
    /// delivery. Returns the message length.
    pub fn publish(&self, message: impl Into<Message>) -> Result<usize> {
        if self.is_terminated() {
            return Err(BrokerError::Terminated);
        }

        let message = message.into();
        let len = message.len();
        select! {
            send(self.handoff.publish, message) -> res => res.map(|_| len).map_err(|_| BrokerError::Terminated),
            recv(self.token.done()) -> _ => Err(BrokerError::Terminated),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Result<Subscriber> {
        if self.is_terminated() {
            return Err(BrokerError::Terminated);
        }

        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (conduit, messages) = bounded(self.config.subscriber_buffer);
        select! {
            send(self.handoff.join, Join { id, conduit }) -> res => {
                res.map_err(|_| BrokerError::Terminated)?;
                Ok(Subscriber::new(
                    id,
                    messages,
                    self.handoff.leave.clone(),
                    self.token.clone(),
                ))
            }
            recv(self.token.done()) -> _ => Err(BrokerError::Terminated),
        }
    }

    /// Snapshot of the subscriber count and termination state.
    ///
    /// Waits for the loop to report its count; a terminated broker reports
    /// zero subscribers.
    pub fn info(&self) -> Info {
        let subscriber_count = if self.is_terminated() {
            0
        } else {
            select! {
                recv(self.handoff.count) -> count => count.unwrap_or(0),
                recv(self.token.done()) -> _ => 0,
            }
        };

        Info {
            subscriber_count,
            terminated: self.is_terminated(),
        }
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Each `write` publishes the whole buffer as one message.
impl io::Write for &Broker {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.publish(Message::copy_from_slice(buf))?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for Broker {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut this: &Broker = self;
        io::Write::write(&mut this, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn running(config: BrokerConfig) -> (Arc<Broker>, JoinHandle<Result<Infallible>>) {
        let broker = Arc::new(Broker::with_config(config));
        let handle = broker.spawn().unwrap();
        (broker, handle)
    }

    #[test]
    fn test_info_on_fresh_broker() {
        let (broker, handle) = running(BrokerConfig::default());

        let info = broker.info();
        assert_eq!(info.subscriber_count, 0);
        assert!(!info.terminated);

        broker.stop();
        assert!(matches!(
            handle.join().unwrap(),
            Err(BrokerError::Terminated)
        ));
    }

    #[test]
    fn test_publish_returns_length() {
        let (broker, _handle) = running(BrokerConfig::default());
        assert_eq!(broker.publish("Hello World!").unwrap(), 12);
        assert_eq!(broker.publish(Vec::new()).unwrap(), 0);
        broker.stop();
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let (broker, handle) = running(BrokerConfig::default());

        // Wait until the first loop is serving.
        assert_eq!(broker.info().subscriber_count, 0);
        assert!(matches!(broker.start(), Err(BrokerError::AlreadyStarted)));

        broker.stop();
        assert!(matches!(
            handle.join().unwrap(),
            Err(BrokerError::Terminated)
        ));
    }

    #[test]
    fn test_stop_before_start() {
        let broker = Broker::new();
        assert!(broker.stop());
        assert!(!broker.stop());

        assert_eq!(broker.publish("Test"), Err(BrokerError::Terminated));
        assert!(matches!(broker.subscribe(), Err(BrokerError::Terminated)));
        assert!(matches!(broker.start(), Err(BrokerError::Terminated)));
    }

    #[test]
    fn test_unstarted_broker_unblocks_on_stop() {
        let broker = Arc::new(Broker::new());

        let publisher = {
            let broker = Arc::clone(&broker);
            thread::spawn(move || broker.publish("waiting"))
        };

        thread::sleep(Duration::from_millis(20));
        broker.stop();
        assert_eq!(publisher.join().unwrap(), Err(BrokerError::Terminated));
    }

    #[test]
    fn test_io_write_publishes() {
        let (broker, _handle) = running(BrokerConfig::buffered(4));
        let sub = broker.subscribe().unwrap();

        let mut writer: &Broker = &broker;
        writer.write_all(b"Hello World!\n").unwrap();
        assert_eq!(sub.recv().unwrap(), Message::from_static(b"Hello World!\n"));

        broker.stop();
        let err = writer.write_all(b"late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_parent_cancellation_terminates() {
        let parent = CancelToken::new();
        let broker = Arc::new(Broker::with_parent(&parent, BrokerConfig::default()));
        let handle = broker.spawn().unwrap();

        parent.cancel();
        assert!(matches!(
            handle.join().unwrap(),
            Err(BrokerError::Terminated)
        ));
        assert!(broker.info().terminated);
        assert!(!broker.stop());
    }

    #[test]
    fn test_config_is_kept() {
        let config = BrokerConfig {
            name: "events".to_string(),
            subscriber_buffer: 2,
        };
        let broker = Broker::with_config(config.clone());
        assert_eq!(broker.config(), &config);

        let parent = CancelToken::new();
        let child = Broker::with_parent(&parent, BrokerConfig::buffered(8));
        assert_eq!(child.config().subscriber_buffer, 8);
        assert_eq!(child.config().name, "broker");
    }

    #[test]
    fn test_drop_cancels_token() {
        let broker = Broker::new();
        let token = broker.cancel_token().clone();
        drop(broker);
        assert!(token.is_cancelled());
    }
}
