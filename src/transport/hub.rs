// Event hub: multicast of canonical events
// Every subscriber owns a bounded queue and receives every published event in
// publish order. Publishing never blocks the pump.

use crate::events::CanonicalEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default per-subscriber queue bound. Human input rates never come close.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 4096;

struct HubInner {
    subscribers: Mutex<Vec<mpsc::Sender<CanonicalEvent>>>,
    capacity: usize,
}

/// Cloneable handle to the event stream
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

/// Receiving end of one subscription
pub struct EventSubscription {
    receiver: mpsc::Receiver<CanonicalEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: Mutex::new(Vec::new()),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Register a subscriber. It sees every event published from now on.
    pub fn subscribe(&self) -> EventSubscription {
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        self.inner.subscribers.lock().push(sender);
        EventSubscription { receiver }
    }

    /// Deliver to every live subscriber. Returns how many received it.
    ///
    /// Closed subscriptions are pruned. A subscriber whose queue is full loses
    /// this event only; the others are unaffected.
    pub fn publish(&self, event: &CanonicalEvent) -> usize {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|s| !s.is_closed());

        let mut delivered = 0;
        for subscriber in subscribers.iter() {
            match subscriber.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    crate::warn!(
                        "Subscriber queue full ({} events), dropping {:?} for that subscriber",
                        self.inner.capacity,
                        event.kind()
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|s| !s.is_closed());
        subscribers.len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl EventSubscription {
    /// Next event, or None once the hub is gone
    pub async fn recv(&mut self) -> Option<CanonicalEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<CanonicalEvent> {
        self.receiver.try_recv().ok()
    }

    /// Blocking receive for non-async consumers. Must not be called from a runtime thread.
    pub fn blocking_recv(&mut self) -> Option<CanonicalEvent> {
        self.receiver.blocking_recv()
    }
}
