// src/chunk.rs
// A single spatial cell: voxel payload, resolution state machine and the
// whole-chunk work lock that serializes resolution transitions.

use parking_lot::Mutex;

use crate::config;
use crate::coords::Coordinate;
use crate::mesh::MeshHandle;
use crate::persist::ChunkSaveData;

/// How fully loaded a chunk's data is and how it is displayed.
/// Strictly ordered; transitions move one step at a time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Resolution {
    UnLoaded,
    Loaded,
    Meshed,
    Visible,
}

/// Payload behind the data mutex. The voxel buffer stays `None` for a
/// fully empty chunk even at Loaded resolution.
struct ChunkData {
    resolution: Resolution,
    voxels: Option<Box<[u8]>>,
    solid_count: u32,
    mesh: Option<MeshHandle>,
}

impl Default for ChunkData {
    fn default() -> Self {
        Self {
            resolution: Resolution::UnLoaded,
            voxels: None,
            solid_count: 0,
            mesh: None,
        }
    }
}

/// One chunk of the level, addressed by the chunk id of its 0,0,0 voxel.
///
/// The work lock is a single exclusive flag tagged with the resolution of
/// the transition that acquired it. Only one resolution transition may be
/// in flight per chunk at any time, across all apertures and foci. Every
/// resolution-changing method asserts the tag and the current resolution;
/// a violation is a scheduling bug and panics.
pub struct Chunk {
    data: Mutex<ChunkData>,
    work_lock: Mutex<Option<Resolution>>,
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(ChunkData::default()),
            work_lock: Mutex::new(None),
        }
    }

    // ---- work lock -------------------------------------------------------

    /// Acquire the work lock for a transition at `resolution`.
    /// Fails if any transition already holds the lock.
    pub fn try_lock(&self, resolution: Resolution) -> bool {
        let mut lock = self.work_lock.lock();
        if lock.is_some() {
            return false;
        }
        *lock = Some(resolution);
        true
    }

    pub fn is_locked(&self) -> bool {
        self.work_lock.lock().is_some()
    }

    /// Release the work lock. The tag must match the one that acquired it.
    pub fn unlock(&self, resolution: Resolution) {
        let mut lock = self.work_lock.lock();
        match *lock {
            Some(held) if held == resolution => *lock = None,
            held => panic!(
                "wrong resolution tag {:?} tried to unlock chunk held by {:?}",
                resolution, held
            ),
        }
    }

    /// Release the work lock after a failed job, whatever state it is in.
    /// Returns false if the tag did not match (the lock is left alone).
    pub fn release_after_failure(&self, resolution: Resolution) -> bool {
        let mut lock = self.work_lock.lock();
        if *lock == Some(resolution) {
            *lock = None;
            true
        } else {
            false
        }
    }

    fn assert_held(&self, tag: Resolution, op: &str) {
        let lock = self.work_lock.lock();
        if *lock != Some(tag) {
            panic!("{op} requires the work lock held with tag {tag:?}, found {:?}", *lock);
        }
    }

    // ---- queries ---------------------------------------------------------

    pub fn resolution(&self) -> Resolution {
        self.data.lock().resolution
    }

    /// A chunk with no voxel buffer is fully empty.
    pub fn is_empty(&self) -> bool {
        self.data.lock().voxels.is_none()
    }

    /// A chunk is solid when every cell is non-empty.
    pub fn is_solid(&self) -> bool {
        self.data.lock().solid_count == config::CHUNK_VOXEL_COUNT as u32
    }

    pub fn solid_voxel_count(&self) -> u32 {
        self.data.lock().solid_count
    }

    pub fn mesh_is_empty(&self) -> bool {
        self.data.lock().mesh.is_none()
    }

    pub fn mesh(&self) -> Option<MeshHandle> {
        self.data.lock().mesh.clone()
    }

    // ---- voxel access ----------------------------------------------------

    /// Read one voxel by local offset. 0 = empty.
    pub fn voxel(&self, x: usize, y: usize, z: usize) -> u8 {
        let data = self.data.lock();
        match &data.voxels {
            Some(v) => v[Coordinate::flatten(x, y, z, config::CHUNK_DIAMETER)],
            None => 0,
        }
    }

    /// Write one voxel by local offset. Allocates the buffer lazily on the
    /// first non-empty write and keeps the solid count in step: it moves by
    /// exactly one per empty<->non-empty flip and not at all when one
    /// non-empty value overwrites another.
    pub fn set_voxel(&self, x: usize, y: usize, z: usize, value: u8) {
        let mut data = self.data.lock();
        let idx = Coordinate::flatten(x, y, z, config::CHUNK_DIAMETER);
        if value != 0 {
            let voxels = data
                .voxels
                .get_or_insert_with(|| vec![0u8; config::CHUNK_VOXEL_COUNT].into_boxed_slice());
            if voxels[idx] == 0 {
                data.solid_count += 1;
            }
            data.voxels.as_mut().unwrap()[idx] = value;
        } else if let Some(voxels) = data.voxels.as_mut() {
            if voxels[idx] != 0 {
                voxels[idx] = 0;
                data.solid_count -= 1;
            }
        }
    }

    // ---- resolution transitions -----------------------------------------

    /// Install the voxel payload and move UnLoaded -> Loaded.
    /// Requires the work lock held with the Loaded tag.
    pub fn set_voxel_data(&self, voxels: Option<Box<[u8]>>, solid_count: u32) {
        self.assert_held(Resolution::Loaded, "set_voxel_data");
        let mut data = self.data.lock();
        if data.resolution != Resolution::UnLoaded {
            panic!(
                "set_voxel_data requires an UnLoaded chunk, found {:?}",
                data.resolution
            );
        }
        data.voxels = if solid_count > 0 { voxels } else { None };
        data.solid_count = solid_count;
        data.resolution = Resolution::Loaded;
    }

    /// Take the voxel payload out for persisting and reset the chunk to
    /// UnLoaded. This is the only path data leaves the engine through.
    /// Requires the work lock held with the Loaded tag and an adjustment
    /// targeting UnLoaded.
    pub fn extract_voxel_data(&self, target: Resolution) -> ChunkSaveData {
        self.assert_held(Resolution::Loaded, "extract_voxel_data");
        if target != Resolution::UnLoaded {
            panic!("extract_voxel_data only serves adjustments targeting UnLoaded, got {target:?}");
        }
        let mut data = self.data.lock();
        if data.resolution < Resolution::Loaded {
            panic!(
                "extract_voxel_data requires a chunk at least Loaded, found {:?}",
                data.resolution
            );
        }
        let save = ChunkSaveData {
            voxels: data.voxels.take().map(|b| b.into_vec()),
            solid_count: data.solid_count,
        };
        data.solid_count = 0;
        data.mesh = None;
        data.resolution = Resolution::UnLoaded;
        save
    }

    /// Toggle Loaded <-> Meshed, attaching or dropping the mesh handle.
    /// Requires the work lock held with the Meshed tag. A `None` handle on
    /// activation records a meshed-but-empty chunk.
    pub fn set_meshed(&self, active: bool, mesh: Option<MeshHandle>) {
        self.assert_held(Resolution::Meshed, "set_meshed");
        let mut data = self.data.lock();
        if active {
            if data.resolution != Resolution::Loaded {
                panic!("set_meshed(true) requires a Loaded chunk, found {:?}", data.resolution);
            }
            data.mesh = mesh;
            data.resolution = Resolution::Meshed;
        } else {
            if data.resolution != Resolution::Meshed {
                panic!("set_meshed(false) requires a Meshed chunk, found {:?}", data.resolution);
            }
            data.mesh = None;
            data.resolution = Resolution::Loaded;
        }
    }

    /// Toggle Meshed <-> Visible. Requires the work lock held with the
    /// Visible tag.
    pub fn set_visible(&self, active: bool) {
        self.assert_held(Resolution::Visible, "set_visible");
        let mut data = self.data.lock();
        if active {
            if data.resolution != Resolution::Meshed {
                panic!("set_visible(true) requires a Meshed chunk, found {:?}", data.resolution);
            }
            data.resolution = Resolution::Visible;
        } else {
            if data.resolution != Resolution::Visible {
                panic!("set_visible(false) requires a Visible chunk, found {:?}", data.resolution);
            }
            data.resolution = Resolution::Meshed;
        }
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.lock();
        write!(f, "[#{}::%{:?}]", data.solid_count, data.resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_chunk(solid: u32) -> Chunk {
        let chunk = Chunk::new();
        assert!(chunk.try_lock(Resolution::Loaded));
        let voxels = if solid > 0 {
            let mut v = vec![0u8; config::CHUNK_VOXEL_COUNT];
            for cell in v.iter_mut().take(solid as usize) {
                *cell = 1;
            }
            Some(v.into_boxed_slice())
        } else {
            None
        };
        chunk.set_voxel_data(voxels, solid);
        chunk.unlock(Resolution::Loaded);
        chunk
    }

    #[test]
    fn lock_is_exclusive_until_unlocked() {
        let chunk = Chunk::new();
        assert!(chunk.try_lock(Resolution::Loaded));
        assert!(!chunk.try_lock(Resolution::Loaded));
        assert!(!chunk.try_lock(Resolution::Meshed));
        chunk.unlock(Resolution::Loaded);
        assert!(chunk.try_lock(Resolution::Meshed));
    }

    #[test]
    #[should_panic(expected = "wrong resolution tag")]
    fn unlock_with_wrong_tag_panics() {
        let chunk = Chunk::new();
        assert!(chunk.try_lock(Resolution::Loaded));
        chunk.unlock(Resolution::Meshed);
    }

    #[test]
    fn release_after_failure_only_matches_tag() {
        let chunk = Chunk::new();
        assert!(chunk.try_lock(Resolution::Meshed));
        assert!(!chunk.release_after_failure(Resolution::Loaded));
        assert!(chunk.is_locked());
        assert!(chunk.release_after_failure(Resolution::Meshed));
        assert!(!chunk.is_locked());
    }

    #[test]
    fn full_resolution_ladder_up_and_down() {
        let chunk = loaded_chunk(8);
        assert_eq!(chunk.resolution(), Resolution::Loaded);

        assert!(chunk.try_lock(Resolution::Meshed));
        chunk.set_meshed(true, Some(MeshHandle::new(1)));
        chunk.unlock(Resolution::Meshed);
        assert_eq!(chunk.resolution(), Resolution::Meshed);

        assert!(chunk.try_lock(Resolution::Visible));
        chunk.set_visible(true);
        chunk.unlock(Resolution::Visible);
        assert_eq!(chunk.resolution(), Resolution::Visible);

        assert!(chunk.try_lock(Resolution::Visible));
        chunk.set_visible(false);
        chunk.unlock(Resolution::Visible);
        assert!(chunk.try_lock(Resolution::Meshed));
        chunk.set_meshed(false, None);
        chunk.unlock(Resolution::Meshed);
        assert_eq!(chunk.resolution(), Resolution::Loaded);
        assert!(chunk.mesh_is_empty());
    }

    #[test]
    #[should_panic(expected = "requires an UnLoaded chunk")]
    fn set_voxel_data_twice_panics() {
        let chunk = Chunk::new();
        assert!(chunk.try_lock(Resolution::Loaded));
        chunk.set_voxel_data(None, 0);
        chunk.set_voxel_data(None, 0);
    }

    #[test]
    #[should_panic(expected = "requires the work lock")]
    fn set_meshed_without_lock_panics() {
        let chunk = loaded_chunk(1);
        chunk.set_meshed(true, None);
    }

    #[test]
    #[should_panic(expected = "requires a Meshed chunk")]
    fn skipping_a_resolution_step_panics() {
        let chunk = loaded_chunk(1);
        assert!(chunk.try_lock(Resolution::Visible));
        // Loaded -> Visible is not a single step.
        chunk.set_visible(true);
    }

    #[test]
    fn voxel_writes_track_solid_count_exactly() {
        let chunk = Chunk::new();
        assert!(chunk.is_empty());

        chunk.set_voxel(1, 2, 3, 7);
        assert!(!chunk.is_empty());
        assert_eq!(chunk.solid_voxel_count(), 1);

        // Overwriting non-empty with non-empty does not change the count.
        chunk.set_voxel(1, 2, 3, 9);
        assert_eq!(chunk.solid_voxel_count(), 1);
        assert_eq!(chunk.voxel(1, 2, 3), 9);

        // Clearing an already empty cell does not change the count.
        chunk.set_voxel(0, 0, 0, 0);
        assert_eq!(chunk.solid_voxel_count(), 1);

        chunk.set_voxel(1, 2, 3, 0);
        assert_eq!(chunk.solid_voxel_count(), 0);
        assert_eq!(chunk.voxel(1, 2, 3), 0);
    }

    #[test]
    fn is_solid_when_every_cell_is_set() {
        let chunk = loaded_chunk(config::CHUNK_VOXEL_COUNT as u32);
        assert!(chunk.is_solid());
        assert!(!chunk.is_empty());
    }

    #[test]
    fn extract_then_set_round_trips() {
        let chunk = Chunk::new();
        assert!(chunk.try_lock(Resolution::Loaded));
        chunk.set_voxel_data(
            {
                let mut v = vec![0u8; config::CHUNK_VOXEL_COUNT];
                v[Coordinate::flatten(3, 4, 5, config::CHUNK_DIAMETER)] = 2;
                v[Coordinate::flatten(0, 1, 0, config::CHUNK_DIAMETER)] = 6;
                Some(v.into_boxed_slice())
            },
            2,
        );

        let save = chunk.extract_voxel_data(Resolution::UnLoaded);
        assert_eq!(chunk.resolution(), Resolution::UnLoaded);
        assert!(chunk.is_empty());

        chunk.set_voxel_data(save.voxels.map(Vec::into_boxed_slice), save.solid_count);
        chunk.unlock(Resolution::Loaded);

        assert_eq!(chunk.resolution(), Resolution::Loaded);
        assert_eq!(chunk.solid_voxel_count(), 2);
        assert_eq!(chunk.voxel(3, 4, 5), 2);
        assert_eq!(chunk.voxel(0, 1, 0), 6);
        assert!(!chunk.is_solid() && !chunk.is_empty());
    }
}
