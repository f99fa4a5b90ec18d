//! Subscriber membership owned by the coordination loop.

use crate::types::{Message, SubscriberId};
use crossbeam_channel::{Sender, TrySendError};
use std::collections::HashMap;

/// Outcome of fanning one message out to every member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct FanOut {
    /// Members whose conduit accepted the message.
    pub delivered: usize,
    /// Members whose conduit was not ready; they miss this message.
    pub skipped: usize,
    /// Members whose receiving side is gone; removed from the set.
    pub pruned: usize,
}

/// The set of registered subscriber conduits.
///
/// Only the coordination loop holds one of these. Dropping a conduit's
/// sender is what closes it, and a sender only ever leaves the map once, so
/// every conduit is closed exactly once.
#[derive(Default)]
pub(crate) struct Membership {
    members: HashMap<SubscriberId, Sender<Message>>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn join(&mut self, id: SubscriberId, conduit: Sender<Message>) {
        self.members.insert(id, conduit);
    }

    /// Remove a member and close its conduit. Removing a non-member is a
    /// no-op and returns false.
    pub fn leave(&mut self, id: SubscriberId) -> bool {
        self.members.remove(&id).is_some()
    }

    /// Offer `message` to every member without blocking.
    pub fn fan_out(&mut self, message: &Message) -> FanOut {
        let mut report = FanOut::default();
        let mut gone = Vec::new();

        for (id, conduit) in self.members.iter() {
            match conduit.try_send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => report.skipped += 1,
                Err(TrySendError::Disconnected(_)) => gone.push(*id),
            }
        }

        for id in gone {
            if self.members.remove(&id).is_some() {
                report.pruned += 1;
            }
        }

        report
    }

    /// Close every conduit and empty the set. Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        let closed = self.members.len();
        self.members.clear();
        closed
    }
}
