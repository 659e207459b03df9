//! Pod change bus.
//!
//! Subscribers register a predicate and receive every matching pod change
//! on their own unbounded channel. Publishing only enqueues; it never waits
//! for a subscriber to run, so store writers are never blocked by consumer
//! work. Subscribers whose receiver has been dropped are pruned on the next
//! publish.

use std::sync::Mutex;

use simon_core::Pod;
use tokio::sync::mpsc;
use tracing::trace;

/// What happened to the pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodEventType {
    Added,
    Modified,
}

/// A pod change, carrying a copy of the pod as written.
#[derive(Debug, Clone, PartialEq)]
pub struct PodEvent {
    pub event_type: PodEventType,
    pub pod: Pod,
}

type PodFilter = Box<dyn Fn(&PodEvent) -> bool + Send + Sync>;

struct Subscriber {
    filter: PodFilter,
    tx: mpsc::UnboundedSender<PodEvent>,
}

/// Fan-out of pod changes to subscribers.
#[derive(Default)]
pub(crate) struct PodEventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl PodEventBus {
    pub(crate) fn subscribe(&self, filter: PodFilter) -> PodWatch {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Subscriber { filter, tx });
        PodWatch { rx }
    }

    pub(crate) fn publish(&self, event_type: PodEventType, pod: &Pod) {
        let event = PodEvent {
            event_type,
            pod: pod.clone(),
        };
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|sub| {
            if !(sub.filter)(&event) {
                return !sub.tx.is_closed();
            }
            sub.tx.send(event.clone()).is_ok()
        });
        trace!(pod = %pod.key(), ?event_type, subscribers = subscribers.len(), "pod event published");
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// A stream of pod changes matching a subscription predicate.
pub struct PodWatch {
    rx: mpsc::UnboundedReceiver<PodEvent>,
}

impl PodWatch {
    /// Wait for the next event. `None` once the store has been dropped.
    pub async fn recv(&mut self) -> Option<PodEvent> {
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<PodEvent> {
        self.rx.try_recv().ok()
    }
}
