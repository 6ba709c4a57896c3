// src/events.rs
// Notification channel between the streaming core and the presentation
// layer. Publishing is synchronous fan-out to the channel's observers;
// observers are expected to queue and return quickly.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::mesh::MeshHandle;
use crate::streaming::types::Adjustment;

/// The channels observers can subscribe to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Channel {
    /// Chunk visibility and mesh-lifecycle traffic for the presentation layer.
    ChunkActivationUpdates,
    /// Everything, for loggers and debug tooling.
    Broadcast,
}

/// Events the streaming core publishes.
#[derive(Clone, Debug)]
pub enum ChunkEvent {
    /// A mesh finished building; the presentation layer owns the handle now.
    MeshReady {
        adjustment: Adjustment,
        mesh: MeshHandle,
    },
    /// The chunk left meshed resolution; drop its geometry.
    MeshRemoved { adjustment: Adjustment },
    /// Show the chunk. The consumer must complete the transition through
    /// `Level::complete_visibility_change`.
    ShowChunk { adjustment: Adjustment },
    /// Hide the chunk. Same completion contract as `ShowChunk`.
    HideChunk { adjustment: Adjustment },
}

pub trait Observer: Send + Sync {
    fn notify(&self, event: &ChunkEvent);
}

/// Channel-keyed observer registry. Every publish also reaches the
/// Broadcast channel's observers.
#[derive(Default)]
pub struct EventBus {
    observers: RwLock<FxHashMap<Channel, Vec<Arc<dyn Observer>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>, channel: Channel) {
        self.observers.write().entry(channel).or_default().push(observer);
    }

    pub fn publish(&self, event: ChunkEvent, channel: Channel) {
        let observers = self.observers.read();
        if let Some(subs) = observers.get(&channel) {
            for sub in subs {
                sub.notify(&event);
            }
        }
        if channel != Channel::Broadcast {
            if let Some(subs) = observers.get(&Channel::Broadcast) {
                for sub in subs {
                    sub.notify(&event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Resolution;
    use crate::coords::Coordinate;
    use crate::level::FocusId;
    use crate::streaming::types::AdjustmentDirection;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<ChunkEvent>>,
    }

    impl Observer for Recorder {
        fn notify(&self, event: &ChunkEvent) {
            self.seen.lock().push(event.clone());
        }
    }

    fn show_event() -> ChunkEvent {
        ChunkEvent::ShowChunk {
            adjustment: Adjustment::new(
                Coordinate::new(1, 2, 3),
                AdjustmentDirection::EnteringFocus,
                Resolution::Visible,
                FocusId(1),
            ),
        }
    }

    #[test]
    fn publish_reaches_channel_and_broadcast() {
        let bus = EventBus::new();
        let on_channel = Arc::new(Recorder::default());
        let on_broadcast = Arc::new(Recorder::default());
        bus.subscribe(on_channel.clone(), Channel::ChunkActivationUpdates);
        bus.subscribe(on_broadcast.clone(), Channel::Broadcast);

        bus.publish(show_event(), Channel::ChunkActivationUpdates);

        assert_eq!(on_channel.seen.lock().len(), 1);
        assert_eq!(on_broadcast.seen.lock().len(), 1);
    }

    #[test]
    fn other_channels_stay_quiet() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(recorder.clone(), Channel::ChunkActivationUpdates);

        bus.publish(show_event(), Channel::Broadcast);
        assert!(recorder.seen.lock().is_empty());
    }
}
