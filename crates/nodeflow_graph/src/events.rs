// SPDX-License-Identifier: MIT OR Apache-2.0
//! Notifications emitted by the graph after each committed change.

use crate::connection::ConnectionId;
use crate::model::NodeValidation;
use crate::node::NodeId;
use std::sync::mpsc::Sender;

/// A committed structural change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// A node was added
    NodeCreated(NodeId),
    /// A node was removed, after all of its connections
    NodeDeleted(NodeId),
    /// A connection was committed
    ConnectionCreated(ConnectionId),
    /// A connection was removed
    ConnectionRemoved(ConnectionId),
    /// A model's validation state changed
    NodeValidationChanged(NodeId, NodeValidation),
}

/// Receives graph notifications.
///
/// Observers run synchronously, in subscription order, once the graph state
/// is final; they cannot veto a change.
pub trait GraphObserver: Send + Sync {
    /// Called once per event
    fn on_event(&mut self, event: &GraphEvent);
}

impl<F> GraphObserver for F
where
    F: FnMut(&GraphEvent) + Send + Sync,
{
    fn on_event(&mut self, event: &GraphEvent) {
        self(event);
    }
}

/// Forwards events into a channel; a closed channel is ignored
impl GraphObserver for Sender<GraphEvent> {
    fn on_event(&mut self, event: &GraphEvent) {
        if self.send(event.clone()).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}

/// Handle returned by [`Graph::subscribe`](crate::Graph::subscribe)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
pub(crate) struct Observers {
    next_id: u64,
    entries: Vec<(ObserverId, Box<dyn GraphObserver>)>,
}

impl Observers {
    pub(crate) fn subscribe(&mut self, observer: Box<dyn GraphObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn emit(&mut self, event: &GraphEvent) {
        for (_, observer) in &mut self.entries {
            observer.on_event(event);
        }
    }

    pub(crate) fn emit_all(&mut self, events: &[GraphEvent]) {
        for event in events {
            self.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::{mpsc, Arc};

    #[test]
    fn test_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut observers = Observers::default();

        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            observers.subscribe(Box::new(move |_: &GraphEvent| log.lock().push(tag)));
        }

        observers.emit(&GraphEvent::NodeCreated(NodeId::new()));
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let mut observers = Observers::default();
        let counter = Arc::clone(&count);
        let id = observers.subscribe(Box::new(move |_: &GraphEvent| *counter.lock() += 1));

        observers.emit(&GraphEvent::NodeCreated(NodeId::new()));
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.emit(&GraphEvent::NodeCreated(NodeId::new()));

        assert_eq!(*count.lock(), 1);
        assert!(observers.entries.is_empty());
    }

    #[test]
    fn test_channel_observer() {
        let (tx, rx) = mpsc::channel();
        let mut observers = Observers::default();
        observers.subscribe(Box::new(tx));

        let id = ConnectionId::new();
        observers.emit(&GraphEvent::ConnectionRemoved(id));
        assert_eq!(rx.try_recv().unwrap(), GraphEvent::ConnectionRemoved(id));

        drop(rx);
        observers.emit(&GraphEvent::ConnectionRemoved(id));
    }
}
