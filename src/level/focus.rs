// src/level/focus.rs
// A mobile point of interest streaming centers on. Positions arrive in
// continuous world space from whatever moves the focus; the streaming
// side only ever reads the containing chunk id.

use std::sync::atomic::{AtomicBool, Ordering};

use glam::Vec3;
use parking_lot::Mutex;

use crate::coords::Coordinate;

/// Level-assigned focus identity, carried by every adjustment.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FocusId(pub u32);

struct FocusState {
    position: Vec3,
    current_chunk: Coordinate,
    previous_chunk: Coordinate,
}

/// A focus is inactive until the presentation layer has spawned whatever
/// it represents; the streaming loop skips inactive foci.
pub struct Focus {
    id: FocusId,
    active: AtomicBool,
    state: Mutex<FocusState>,
}

impl Focus {
    pub fn new(id: FocusId, position: Vec3) -> Self {
        let chunk = world_position_to_chunk(position);
        Self {
            id,
            active: AtomicBool::new(false),
            state: Mutex::new(FocusState {
                position,
                current_chunk: chunk,
                previous_chunk: chunk,
            }),
        }
    }

    pub fn id(&self) -> FocusId {
        self.id
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn position(&self) -> Vec3 {
        self.state.lock().position
    }

    /// The chunk currently containing the focus.
    pub fn chunk_id(&self) -> Coordinate {
        self.state.lock().current_chunk
    }

    pub fn move_to(&self, position: Vec3) {
        let mut state = self.state.lock();
        state.position = position;
        state.current_chunk = world_position_to_chunk(position);
    }

    /// If the focus crossed into a new chunk since the last call, consume
    /// the crossing and return the new chunk id. The streaming loop uses
    /// this to decide when region diffs are due.
    pub fn take_chunk_move(&self) -> Option<Coordinate> {
        let mut state = self.state.lock();
        if state.current_chunk != state.previous_chunk {
            state.previous_chunk = state.current_chunk;
            Some(state.current_chunk)
        } else {
            None
        }
    }
}

fn world_position_to_chunk(position: Vec3) -> Coordinate {
    Coordinate::new(
        position.x.floor() as i32,
        position.y.floor() as i32,
        position.z.floor() as i32,
    )
    .world_to_chunk()
}
