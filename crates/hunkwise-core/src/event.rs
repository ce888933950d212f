//! Update notifications emitted by the diff engine.
//!
//! The engine only knows a list of senders; whoever wants updates (the zone
//! synchronizer, a test) subscribes and drains its own receiver.

use crate::types::{DiffAreaId, Uri};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Why an area changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateReason {
    /// Generated content was appended to the area
    Streaming,
    /// The area's diffs were (re)built
    Recompute,
    /// A hunk or the whole area was removed
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffAreaEvent {
    pub uri: Uri,
    pub diff_area_id: DiffAreaId,
    pub reason: UpdateReason,
}

#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Vec<Sender<DiffAreaEvent>>,
}

impl EventBus {
    pub(crate) fn subscribe(&mut self) -> Receiver<DiffAreaEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver to every live subscriber, forgetting the ones that hung up
    pub(crate) fn emit(&mut self, event: DiffAreaEvent) {
        log::debug!(
            "{} {} updated: {:?}",
            event.uri,
            event.diff_area_id,
            event.reason
        );
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_gets_every_event() {
        let mut bus = EventBus::default();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.emit(DiffAreaEvent {
            uri: Uri::from("file:///a"),
            diff_area_id: DiffAreaId(1),
            reason: UpdateReason::Recompute,
        });

        assert_eq!(first.try_iter().count(), 1);
        assert_eq!(second.try_iter().count(), 1);
    }

    #[test]
    fn test_dropped_subscriber_is_forgotten() {
        let mut bus = EventBus::default();
        drop(bus.subscribe());
        bus.emit(DiffAreaEvent {
            uri: Uri::from("file:///a"),
            diff_area_id: DiffAreaId(1),
            reason: UpdateReason::Deleted,
        });
        assert!(bus.subscribers.is_empty());
    }
}
