// src/streaming/types.rs
// Plain data shared across the streaming pipeline.

use thiserror::Error;

use crate::chunk::Resolution;
use crate::coords::Coordinate;
use crate::level::FocusId;
use crate::mesh::MeshError;
use crate::persist::StoreError;

/// Which way an adjustment moves a chunk's resolution for its focus.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AdjustmentDirection {
    EnteringFocus,
    LeavingFocus,
}

/// An immutable request to move one chunk's resolution up or down for one
/// focus. Produced by an aperture, consumed by the same aperture's job
/// strategy.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Adjustment {
    pub chunk_id: Coordinate,
    pub direction: AdjustmentDirection,
    /// The resolution of the aperture making the adjustment; doubles as
    /// the work-lock tag its job runs under.
    pub resolution: Resolution,
    pub focus_id: FocusId,
    /// How many times a job for this adjustment has failed and been
    /// re-enqueued. Past `config::MAX_JOB_FAILURES` it is dropped.
    pub failures: u32,
}

impl Adjustment {
    pub fn new(
        chunk_id: Coordinate,
        direction: AdjustmentDirection,
        resolution: Resolution,
        focus_id: FocusId,
    ) -> Self {
        Self {
            chunk_id,
            direction,
            resolution,
            focus_id,
            failures: 0,
        }
    }

    pub fn with_failure(self) -> Self {
        Self {
            failures: self.failures + 1,
            ..self
        }
    }
}

impl std::fmt::Display for Adjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}/{:?} chunk {} (focus {:?})",
            self.resolution, self.direction, self.chunk_id, self.focus_id
        )
    }
}

/// Dequeue order for `LeavingFocus` adjustments. Neither distance order
/// is obviously right for every embedder, so it is a knob; both
/// orderings are covered by tests.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LeavingOrder {
    /// Chunks farthest from the focus unload first (priority =
    /// max managed distance - distance).
    #[default]
    FarthestFirst,
    /// Chunks nearest the focus unload first (priority = distance).
    NearestFirst,
}

/// Why a job did not finish its transition.
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    /// The job panicked mid-run; the chunk lock stays for the reaper.
    #[error("job panicked before finishing its transition")]
    Panicked,
    /// The worker thread went away before reporting a result.
    #[error("job worker terminated before reporting a result")]
    Abandoned,
}
