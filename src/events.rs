//! Subscriber-handle event fan-out used for notifications and voice status.

use std::sync::mpsc::{Receiver, Sender, channel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Publisher holding a set of subscriber handles. Publishing clones the event
/// to every live subscriber; receivers whose end was dropped are pruned.
#[derive(Debug)]
pub struct EventBus<T> {
    next_id: u64,
    subscribers: Vec<(SubscriberId, Sender<T>)>,
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> (SubscriberId, Receiver<T>) {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        let (tx, rx) = channel();
        self.subscribers.push((id, tx));
        (id, rx)
    }

    /// Remove a subscription by handle. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn publish(&mut self, event: T) {
        self.subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
