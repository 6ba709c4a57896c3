// src/level/mod.rs
// The shared chunk map and focus registry. One Level is the unit a
// streaming loop runs over; every aperture of every focus reads and
// writes chunks through it.

use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::chunk::{Chunk, Resolution};
use crate::coords::Coordinate;
use crate::streaming::aperture;
use crate::streaming::lens::LensOptions;
use crate::streaming::types::{Adjustment, AdjustmentDirection};

mod focus;

pub use focus::{Focus, FocusId};

/// Per-resolution population counts, for progress logging.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct ResolutionCensus {
    pub unloaded: usize,
    pub loaded: usize,
    pub meshed: usize,
    pub visible: usize,
}

impl std::fmt::Display for ResolutionCensus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unloaded: {}, loaded: {}, meshed: {}, visible: {}",
            self.unloaded, self.loaded, self.meshed, self.visible
        )
    }
}

/// Chunks are created lazily on first lookup and never removed; a chunk
/// that streamed out simply sits at UnLoaded with no payload.
pub struct Level {
    name: String,
    seed: u32,
    /// Exclusive upper chunk-id bound per axis; the lower bound is 0.
    chunk_bounds: Coordinate,
    chunks: RwLock<FxHashMap<Coordinate, Arc<Chunk>>>,
    foci: RwLock<FxHashMap<FocusId, Arc<Focus>>>,
    lens_options: RwLock<FxHashMap<FocusId, LensOptions>>,
    next_focus_id: parking_lot::Mutex<u32>,
}

impl Level {
    pub fn new(name: impl Into<String>, seed: u32, chunk_bounds: Coordinate) -> Self {
        Self {
            name: name.into(),
            seed,
            chunk_bounds,
            chunks: RwLock::default(),
            foci: RwLock::default(),
            lens_options: RwLock::default(),
            next_focus_id: parking_lot::Mutex::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn chunk_bounds(&self) -> Coordinate {
        self.chunk_bounds
    }

    pub fn contains_chunk(&self, chunk_id: Coordinate) -> bool {
        chunk_id.x >= 0
            && chunk_id.y >= 0
            && chunk_id.z >= 0
            && chunk_id.x < self.chunk_bounds.x
            && chunk_id.y < self.chunk_bounds.y
            && chunk_id.z < self.chunk_bounds.z
    }

    // ---- chunk access ----------------------------------------------------

    /// Get the chunk with the given id, creating it UnLoaded if this is
    /// the first time anyone asked for it.
    pub fn chunk(&self, chunk_id: Coordinate) -> Arc<Chunk> {
        if let Some(chunk) = self.chunks.read().get(&chunk_id) {
            return chunk.clone();
        }
        self.chunks
            .write()
            .entry(chunk_id)
            .or_insert_with(|| Arc::new(Chunk::new()))
            .clone()
    }

    /// Get the chunk only if it already exists.
    pub fn existing_chunk(&self, chunk_id: Coordinate) -> Option<Arc<Chunk>> {
        self.chunks.read().get(&chunk_id).cloned()
    }

    /// Read a terrain voxel by world location. Unloaded space reads empty.
    pub fn voxel(&self, world: Coordinate) -> u8 {
        match self.existing_chunk(world.world_to_chunk()) {
            Some(chunk) => {
                let (x, y, z) = world.local_in_chunk();
                chunk.voxel(x, y, z)
            }
            None => 0,
        }
    }

    /// Write a terrain voxel by world location. Writes into space no
    /// chunk exists for yet are dropped with a log line; terrain edits
    /// only make sense inside the streamed-in region.
    pub fn set_voxel(&self, world: Coordinate, value: u8) {
        match self.existing_chunk(world.world_to_chunk()) {
            Some(chunk) => {
                let (x, y, z) = world.local_in_chunk();
                chunk.set_voxel(x, y, z, value);
            }
            None => log::error!("tried to set a voxel in nonexistent chunk at {world}"),
        }
    }

    pub fn resolution_census(&self) -> ResolutionCensus {
        let mut census = ResolutionCensus::default();
        for chunk in self.chunks.read().values() {
            match chunk.resolution() {
                Resolution::UnLoaded => census.unloaded += 1,
                Resolution::Loaded => census.loaded += 1,
                Resolution::Meshed => census.meshed += 1,
                Resolution::Visible => census.visible += 1,
            }
        }
        census
    }

    // ---- foci ------------------------------------------------------------

    /// Register a new focus at a world position. The caller builds a lens
    /// for it and records the lens shape with `set_lens_options` so
    /// priority queries work for this focus.
    pub fn register_focus(&self, position: Vec3) -> Arc<Focus> {
        let mut next = self.next_focus_id.lock();
        *next += 1;
        let focus = Arc::new(Focus::new(FocusId(*next), position));
        self.foci.write().insert(focus.id(), focus.clone());
        focus
    }

    pub fn focus(&self, id: FocusId) -> Option<Arc<Focus>> {
        self.foci.read().get(&id).cloned()
    }

    pub fn set_lens_options(&self, focus_id: FocusId, options: LensOptions) {
        self.lens_options.write().insert(focus_id, options);
    }

    /// Priority of an adjustment as its owning aperture would compute it.
    /// Presentation-side queues use this to drain in the same order the
    /// streaming side works in.
    pub fn priority_for_adjustment(&self, adjustment: Adjustment) -> Option<f32> {
        let focus = self.focus(adjustment.focus_id)?;
        let options = *self.lens_options.read().get(&adjustment.focus_id)?;
        let shape = options.shape_for(adjustment.resolution)?;
        Some(aperture::priority_for(
            adjustment,
            focus.chunk_id(),
            shape,
            options.leaving_order,
        ))
    }

    // ---- presentation callbacks ------------------------------------------

    /// Complete a visibility transition on behalf of the presentation
    /// layer. Show/hide events leave the chunk locked with the Visible
    /// tag; once the consumer has toggled its scene objects it finishes
    /// the state change and releases the chunk here.
    pub fn complete_visibility_change(&self, adjustment: Adjustment) {
        let chunk = self.chunk(adjustment.chunk_id);
        chunk.set_visible(adjustment.direction == AdjustmentDirection::EnteringFocus);
        chunk.unlock(Resolution::Visible);
    }
}
