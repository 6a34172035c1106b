use dots_screentime_proto::DomainEvent;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_BUFFER: usize = 256;

/// Fan-out channel for engine events.
///
/// Publishing never blocks and never fails: with no subscribers the event
/// is dropped, and a subscriber that falls behind loses the oldest events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        if self.sender.send(event).is_err() {
            debug!("No event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
