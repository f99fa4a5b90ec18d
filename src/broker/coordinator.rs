//! The coordination loop.
//!
//! All handoff channels have zero capacity: a facade call completes exactly
//! when the loop takes its request, and the loop handles one request (or the
//! cancellation) per iteration. Membership lives on the loop's stack and is
//! never reachable from anywhere else.

use super::membership::Membership;
use crate::cancel::CancelToken;
use crate::error::BrokerError;
use crate::types::{Message, SubscriberId};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, trace};

/// A subscriber asking to be added to the membership set.
pub(crate) struct Join {
    pub id: SubscriberId,
    pub conduit: Sender<Message>,
}

/// Facade side of the handoff channels.
#[derive(Clone)]
pub(crate) struct Handoff {
    pub publish: Sender<Message>,
    pub join: Sender<Join>,
    pub leave: Sender<SubscriberId>,
    pub count: Receiver<usize>,
}

/// Loop side of the handoff channels.
pub(crate) struct Coordinator {
    publish: Receiver<Message>,
    join: Receiver<Join>,
    leave: Receiver<SubscriberId>,
    count: Sender<usize>,
}

/// Create a connected pair of handoff ends.
pub(crate) fn handoff() -> (Handoff, Coordinator) {
    let (publish_tx, publish_rx) = bounded(0);
    let (join_tx, join_rx) = bounded(0);
    let (leave_tx, leave_rx) = bounded(0);
    let (count_tx, count_rx) = bounded(0);

    (
        Handoff {
            publish: publish_tx,
            join: join_tx,
            leave: leave_tx,
            count: count_rx,
        },
        Coordinator {
            publish: publish_rx,
            join: join_rx,
            leave: leave_rx,
            count: count_tx,
        },
    )
}

impl Coordinator {
    /// Serve requests until `token` is cancelled, then close every remaining
    /// conduit. Always returns [`BrokerError::Terminated`].
    pub fn run(&self, token: &CancelToken) -> BrokerError {
        let mut members = Membership::new();
        debug!("coordination loop started");

        while !token.is_cancelled() {
            select! {
                recv(self.publish) -> message => {
                    if let Ok(message) = message {
                        let report = members.fan_out(&message);
                        trace!(
                            bytes = message.len(),
                            delivered = report.delivered,
                            skipped = report.skipped,
                            "fanned out message"
                        );
                        if report.pruned > 0 {
                            debug!(
                                pruned = report.pruned,
                                count = members.len(),
                                "pruned dropped subscribers"
                            );
                        }
                    }
                }
                recv(self.join) -> join => {
                    if let Ok(Join { id, conduit }) = join {
                        members.join(id, conduit);
                        debug!(subscriber = %id, count = members.len(), "subscriber joined");
                    }
                }
                recv(self.leave) -> id => {
                    if let Ok(id) = id {
                        if members.leave(id) {
                            debug!(subscriber = %id, count = members.len(), "subscriber left");
                        } else {
                            trace!(subscriber = %id, "leave for non-member ignored");
                        }
                    }
                }
                send(self.count, members.len()) -> _ => {}
                recv(token.done()) -> _ => break
            }
        }

        let closed = members.close_all();
        debug!(closed, "coordination loop terminated");
        BrokerError::Terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_run_serves_requests_until_cancelled() {
        let (handoff, coordinator) = handoff();
        let token = CancelToken::new();

        let driver = {
            let token = token.clone();
            thread::spawn(move || coordinator.run(&token))
        };

        let (conduit, messages) = bounded(1);
        handoff
            .join
            .send(Join {
                id: SubscriberId(1),
                conduit,
            })
            .unwrap();
        assert_eq!(handoff.count.recv().unwrap(), 1);

        handoff.publish.send(Message::from_static(b"ping")).unwrap();
        assert_eq!(messages.recv().unwrap(), Message::from_static(b"ping"));

        token.cancel();
        assert_eq!(driver.join().unwrap(), BrokerError::Terminated);
        assert!(messages.recv().is_err());
    }

    #[test]
    fn test_leave_closes_conduit() {
        let (handoff, coordinator) = handoff();
        let token = CancelToken::new();

        let driver = {
            let token = token.clone();
            thread::spawn(move || coordinator.run(&token))
        };

        let (conduit, messages) = bounded(1);
        handoff
            .join
            .send(Join {
                id: SubscriberId(9),
                conduit,
            })
            .unwrap();
        handoff.leave.send(SubscriberId(9)).unwrap();
        handoff.leave.send(SubscriberId(9)).unwrap();

        assert!(messages.recv().is_err());
        assert_eq!(handoff.count.recv().unwrap(), 0);

        token.cancel();
        driver.join().unwrap();
    }

    #[test]
    fn test_pre_cancelled_token_exits_immediately() {
        let (_handoff, coordinator) = handoff();
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(coordinator.run(&token), BrokerError::Terminated);
    }
}
