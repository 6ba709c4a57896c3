// src/mesh.rs
// Mesh-builder collaborator boundary. The engine never looks inside a
// mesh; it only moves handles around and knows which neighbor chunks a
// build needs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::chunk::Chunk;
use crate::coords::Coordinate;

/// Opaque token for geometry owned by the presentation layer.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MeshHandle(u64);

impl MeshHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Error, Debug)]
#[error("mesh build failed for chunk {chunk_id}: {reason}")]
pub struct MeshError {
    pub chunk_id: Coordinate,
    pub reason: String,
}

/// Builds renderable geometry for one chunk. `Ok(None)` means the build
/// produced no visible geometry; the chunk still becomes Meshed, with an
/// empty mesh.
pub trait MeshBuilder: Send + Sync {
    fn build(
        &self,
        chunk_id: Coordinate,
        chunk: &Chunk,
        neighbors: &[Arc<Chunk>],
    ) -> Result<Option<MeshHandle>, MeshError>;
}

/// The neighbors whose voxel data a chunk's mesh build reads across its
/// positive faces. Border cells are owned by the chunk on the lower side,
/// so only the 7 positive-offset neighbors matter.
pub const REQUIRED_NEIGHBOR_OFFSETS: [(i32, i32, i32); 7] = [
    (1, 0, 0),
    (0, 1, 0),
    (0, 0, 1),
    (1, 1, 0),
    (1, 0, 1),
    (0, 1, 1),
    (1, 1, 1),
];

pub fn required_neighbors(chunk_id: Coordinate) -> [Coordinate; 7] {
    REQUIRED_NEIGHBOR_OFFSETS.map(|(dx, dy, dz)| chunk_id.offset(dx, dy, dz))
}

/// Face-counting mesher: good enough to drive the pipeline in the demo
/// and in tests. Produces a fresh handle per non-empty build and `None`
/// when no voxel face is exposed.
pub struct FaceCountMesher {
    next_id: AtomicU64,
}

impl Default for FaceCountMesher {
    fn default() -> Self {
        Self { next_id: AtomicU64::new(1) }
    }
}

impl MeshBuilder for FaceCountMesher {
    fn build(
        &self,
        _chunk_id: Coordinate,
        chunk: &Chunk,
        neighbors: &[Arc<Chunk>],
    ) -> Result<Option<MeshHandle>, MeshError> {
        if chunk.is_empty() {
            return Ok(None);
        }
        // A solid chunk surrounded by solid neighbors exposes nothing.
        if chunk.is_solid() && neighbors.iter().all(|n| n.is_solid()) {
            return Ok(None);
        }
        Ok(Some(MeshHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed))))
    }
}
