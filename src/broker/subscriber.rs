//! Subscriber handles.

use crate::cancel::CancelToken;
use crate::error::{BrokerError, CancelError, Result};
use crate::types::{Message, SubscriberId};
use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::convert::Infallible;
use std::time::Duration;

/// A receive-only handle to a [`Broker`](crate::Broker).
///
/// The conduit ends (every receive returns [`BrokerError::Terminated`]) once
/// the subscriber detaches or the broker terminates. Messages already
/// buffered in the conduit are still handed out first.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    messages: Receiver<Message>,
    leave: Sender<SubscriberId>,
    broker: CancelToken,
}

impl Subscriber {
    pub(crate) fn new(
        id: SubscriberId,
        messages: Receiver<Message>,
        leave: Sender<SubscriberId>,
        broker: CancelToken,
    ) -> Self {
        Self {
            id,
            messages,
            leave,
            broker,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Receive the next message (blocking).
    pub fn recv(&self) -> Result<Message> {
        self.messages.recv().map_err(|_| BrokerError::Terminated)
    }

    /// Receive the next message, giving up when `cancel` fires.
    ///
    /// Returns `BrokerError::Cancelled` with the token's reason in that case,
    /// which is distinct from the broker terminating.
    pub fn recv_with(&self, cancel: &CancelToken) -> Result<Message> {
        select! {
            recv(self.messages) -> message => message.map_err(|_| BrokerError::Terminated),
            recv(cancel.done()) -> _ => {
                Err(cancel.reason().unwrap_or(CancelError::Cancelled).into())
            }
        }
    }

    /// Receive with timeout. Timing out reports
    /// `BrokerError::Cancelled(CancelError::DeadlineExceeded)`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Message> {
        match self.messages.recv_timeout(timeout) {
            Ok(message) => Ok(message),
            Err(RecvTimeoutError::Timeout) => Err(CancelError::DeadlineExceeded.into()),
            Err(RecvTimeoutError::Disconnected) => Err(BrokerError::Terminated),
        }
    }

    /// Try to receive a message (non-blocking). `Ok(None)` means nothing is
    /// waiting right now.
    pub fn try_recv(&self) -> Result<Option<Message>> {
        match self.messages.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BrokerError::Terminated),
        }
    }

    /// Blocking iterator over messages that ends when the conduit closes.
    pub fn iter(&self) -> impl Iterator<Item = Message> + '_ {
        self.messages.iter()
    }

    /// Ask the broker to remove this subscriber and close its conduit.
    ///
    /// Detaching an already-detached subscriber is a no-op. Fails with
    /// `BrokerError::Terminated` once the broker is gone, in which case the
    /// conduit has already been closed.
    pub fn detach(&self) -> Result<()> {
        if self.broker.is_cancelled() {
            return Err(BrokerError::Terminated);
        }

        select! {
            send(self.leave, self.id) -> res => res.map_err(|_| BrokerError::Terminated),
            recv(self.broker.done()) -> _ => Err(BrokerError::Terminated),
        }
    }

    /// The raw receive side of the conduit, for use in a caller's own
    /// `select!`. It disconnects when the conduit closes.
    pub fn messages(&self) -> &Receiver<Message> {
        &self.messages
    }

    /// The broker's termination signal. Disconnects once the broker
    /// terminates.
    pub fn done(&self) -> &Receiver<Infallible> {
        self.broker.done()
    }

    pub fn is_terminated(&self) -> bool {
        self.broker.is_cancelled()
    }
}
