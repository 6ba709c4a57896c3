// src/streaming/strategy.rs
// Per-resolution aperture behavior as a record of functions, selected at
// aperture construction. Resolutions form a dependency chain: the
// visible rules lean on the meshed rules, the meshed rules lean on the
// loaded state of neighbors.

use crate::chunk::{Chunk, Resolution};
use crate::coords::Coordinate;
use crate::mesh::required_neighbors;
use crate::streaming::context::StreamContext;
use crate::streaming::jobs::{
    AdjustmentJob, BuildMeshJob, GenerateChunkJob, HideChunkJob, LoadChunkJob, RemoveMeshJob,
    SaveChunkJob, ShowChunkJob,
};
use crate::streaming::types::{Adjustment, AdjustmentDirection};

/// What one aperture resolution does: decide an adjustment is still
/// worth doing, decide it can run right now, and build its job. The
/// completion hook fires when the reaper collects a successful job.
#[derive(Clone, Copy)]
pub struct Strategy {
    pub is_valid: fn(&StreamContext, Adjustment, &Chunk) -> bool,
    pub is_ready: fn(&StreamContext, Adjustment, &Chunk) -> bool,
    pub build_job: fn(Adjustment, &StreamContext) -> Box<dyn AdjustmentJob>,
    pub on_complete: fn(&StreamContext, Adjustment),
}

pub fn strategy_for(resolution: Resolution) -> Strategy {
    match resolution {
        Resolution::Loaded => Strategy {
            is_valid: loaded::is_valid,
            is_ready: always_ready,
            build_job: loaded::build_job,
            on_complete: no_completion_work,
        },
        Resolution::Meshed => Strategy {
            is_valid: meshed::is_valid,
            is_ready: meshed::is_ready,
            build_job: meshed::build_job,
            on_complete: no_completion_work,
        },
        Resolution::Visible => Strategy {
            is_valid: visible::is_valid,
            is_ready: visible::is_ready,
            build_job: visible::build_job,
            on_complete: no_completion_work,
        },
        Resolution::UnLoaded => panic!("no aperture manages the UnLoaded resolution"),
    }
}

fn always_ready(_: &StreamContext, _: Adjustment, _: &Chunk) -> bool {
    true
}

fn no_completion_work(_: &StreamContext, _: Adjustment) {}

/// How one geometry-relevant neighbor looks to the meshing rules.
/// Space beyond the level edge counts as loaded and fully empty, so
/// chunks on the outer shell still mesh and never wait on neighbors
/// that can never load.
#[derive(Clone, Copy)]
struct NeighborView {
    loaded: bool,
    solid: bool,
    empty: bool,
}

fn neighbor_views(ctx: &StreamContext, chunk_id: Coordinate) -> [NeighborView; 7] {
    required_neighbors(chunk_id).map(|n| {
        if !ctx.level.contains_chunk(n) {
            return NeighborView {
                loaded: true,
                solid: false,
                empty: true,
            };
        }
        let chunk = ctx.level.chunk(n);
        NeighborView {
            loaded: chunk.resolution() >= Resolution::Loaded,
            solid: chunk.is_solid(),
            empty: chunk.is_empty(),
        }
    })
}

mod loaded {
    use super::*;

    /// Entering wants an UnLoaded chunk, leaving wants anything but.
    pub(super) fn is_valid(_ctx: &StreamContext, adjustment: Adjustment, chunk: &Chunk) -> bool {
        match adjustment.direction {
            AdjustmentDirection::EnteringFocus => chunk.resolution() == Resolution::UnLoaded,
            AdjustmentDirection::LeavingFocus => chunk.resolution() != Resolution::UnLoaded,
        }
    }

    pub(super) fn build_job(
        adjustment: Adjustment,
        ctx: &StreamContext,
    ) -> Box<dyn AdjustmentJob> {
        match adjustment.direction {
            AdjustmentDirection::EnteringFocus => {
                if ctx.store.exists(adjustment.chunk_id, ctx.level.name()) {
                    Box::new(LoadChunkJob { adjustment })
                } else {
                    Box::new(GenerateChunkJob { adjustment })
                }
            }
            AdjustmentDirection::LeavingFocus => Box::new(SaveChunkJob { adjustment }),
        }
    }
}

mod meshed {
    use super::*;

    pub(super) fn is_valid(ctx: &StreamContext, adjustment: Adjustment, chunk: &Chunk) -> bool {
        match adjustment.direction {
            AdjustmentDirection::EnteringFocus => {
                let resolution = chunk.resolution();
                // Already at or past what the adjustment wanted; another
                // focus may have taken the chunk further up the ladder.
                if resolution >= adjustment.resolution {
                    return false;
                }

                if resolution == Resolution::Loaded {
                    let views = neighbor_views(ctx, adjustment.chunk_id);
                    // A solid chunk walled in by solid loaded neighbors can
                    // never expose a face; same for an empty chunk whose
                    // loaded neighbors are all empty.
                    if chunk.is_solid() && views.iter().all(|v| !v.loaded || v.solid) {
                        return false;
                    }
                    if chunk.is_empty() && views.iter().all(|v| !v.loaded || v.empty) {
                        return false;
                    }
                }
                true
            }
            // A chunk that never reached Meshed has nothing to demesh.
            AdjustmentDirection::LeavingFocus => chunk.resolution() >= Resolution::Meshed,
        }
    }

    /// Meshing reads neighbor voxel data across the chunk's positive
    /// faces, so every geometry-relevant neighbor must be loaded first.
    pub(super) fn is_ready(ctx: &StreamContext, adjustment: Adjustment, chunk: &Chunk) -> bool {
        if adjustment.direction == AdjustmentDirection::LeavingFocus {
            // A still-visible chunk cycles until its hide has run.
            return chunk.resolution() == Resolution::Meshed;
        }
        if chunk.resolution() < Resolution::Loaded {
            return false;
        }
        let views = neighbor_views(ctx, adjustment.chunk_id);
        let neighbors_loaded = views.iter().all(|v| v.loaded);
        let walled_in_solid = chunk.is_solid() && views.iter().all(|v| !v.loaded || v.solid);
        neighbors_loaded && !walled_in_solid
    }

    pub(super) fn build_job(
        adjustment: Adjustment,
        _ctx: &StreamContext,
    ) -> Box<dyn AdjustmentJob> {
        match adjustment.direction {
            AdjustmentDirection::EnteringFocus => Box::new(BuildMeshJob { adjustment }),
            AdjustmentDirection::LeavingFocus => Box::new(RemoveMeshJob { adjustment }),
        }
    }
}

mod visible {
    use super::*;

    /// Valid iff the meshed rules still hold, plus visibility's own
    /// checks: a meshed-but-empty chunk has nothing to show, and only a
    /// currently visible chunk can be hidden.
    pub(super) fn is_valid(ctx: &StreamContext, adjustment: Adjustment, chunk: &Chunk) -> bool {
        if !meshed::is_valid(ctx, adjustment, chunk) {
            return false;
        }
        match adjustment.direction {
            AdjustmentDirection::EnteringFocus => {
                !(chunk.resolution() == Resolution::Meshed && chunk.mesh_is_empty())
            }
            AdjustmentDirection::LeavingFocus => chunk.resolution() == Resolution::Visible,
        }
    }

    pub(super) fn is_ready(_ctx: &StreamContext, adjustment: Adjustment, chunk: &Chunk) -> bool {
        match adjustment.direction {
            AdjustmentDirection::EnteringFocus => chunk.resolution() == Resolution::Meshed,
            AdjustmentDirection::LeavingFocus => chunk.resolution() == Resolution::Visible,
        }
    }

    pub(super) fn build_job(
        adjustment: Adjustment,
        _ctx: &StreamContext,
    ) -> Box<dyn AdjustmentJob> {
        match adjustment.direction {
            AdjustmentDirection::EnteringFocus => Box::new(ShowChunkJob { adjustment }),
            AdjustmentDirection::LeavingFocus => Box::new(HideChunkJob { adjustment }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::level::FocusId;
    use crate::mesh::MeshHandle;
    use crate::streaming::testing;

    fn adj(chunk_id: Coordinate, direction: AdjustmentDirection, res: Resolution) -> Adjustment {
        Adjustment::new(chunk_id, direction, res, FocusId(1))
    }

    fn load_chunk(ctx: &StreamContext, chunk_id: Coordinate, fill: Option<u8>) {
        let chunk = ctx.level.chunk(chunk_id);
        assert!(chunk.try_lock(Resolution::Loaded));
        match fill {
            Some(value) => chunk.set_voxel_data(
                Some(vec![value; config::CHUNK_VOXEL_COUNT].into_boxed_slice()),
                config::CHUNK_VOXEL_COUNT as u32,
            ),
            None => chunk.set_voxel_data(None, 0),
        }
        chunk.unlock(Resolution::Loaded);
    }

    #[test]
    fn loaded_validity_tracks_direction() {
        let ctx = testing::context(Coordinate::new(8, 8, 8), 0);
        let strategy = strategy_for(Resolution::Loaded);
        let id = Coordinate::new(1, 1, 1);
        let chunk = ctx.level.chunk(id);

        let entering = adj(id, AdjustmentDirection::EnteringFocus, Resolution::Loaded);
        let leaving = adj(id, AdjustmentDirection::LeavingFocus, Resolution::Loaded);
        assert!((strategy.is_valid)(&ctx, entering, &chunk));
        assert!(!(strategy.is_valid)(&ctx, leaving, &chunk));

        load_chunk(&ctx, id, Some(1));
        assert!(!(strategy.is_valid)(&ctx, entering, &chunk));
        assert!((strategy.is_valid)(&ctx, leaving, &chunk));
    }

    #[test]
    fn solid_chunk_walled_in_by_solid_neighbors_skips_meshing() {
        let ctx = testing::context(Coordinate::new(8, 8, 8), 0);
        let strategy = strategy_for(Resolution::Meshed);
        let id = Coordinate::new(1, 1, 1);

        load_chunk(&ctx, id, Some(1));
        for neighbor in required_neighbors(id) {
            load_chunk(&ctx, neighbor, Some(1));
        }

        let chunk = ctx.level.chunk(id);
        let entering = adj(id, AdjustmentDirection::EnteringFocus, Resolution::Meshed);
        assert!(!(strategy.is_valid)(&ctx, entering, &chunk));
    }

    #[test]
    fn empty_chunk_with_empty_neighbors_skips_meshing() {
        let ctx = testing::context(Coordinate::new(8, 8, 8), 0);
        let strategy = strategy_for(Resolution::Meshed);
        let id = Coordinate::new(2, 2, 2);

        load_chunk(&ctx, id, None);
        for neighbor in required_neighbors(id) {
            load_chunk(&ctx, neighbor, None);
        }

        let chunk = ctx.level.chunk(id);
        let entering = adj(id, AdjustmentDirection::EnteringFocus, Resolution::Meshed);
        assert!(!(strategy.is_valid)(&ctx, entering, &chunk));
    }

    #[test]
    fn mixed_neighbors_keep_meshing_valid_and_gate_readiness() {
        let ctx = testing::context(Coordinate::new(8, 8, 8), 0);
        let strategy = strategy_for(Resolution::Meshed);
        let id = Coordinate::new(1, 1, 1);

        load_chunk(&ctx, id, Some(1));
        let neighbors = required_neighbors(id);
        // One empty neighbor breaks the solid wall.
        load_chunk(&ctx, neighbors[0], None);

        let chunk = ctx.level.chunk(id);
        let entering = adj(id, AdjustmentDirection::EnteringFocus, Resolution::Meshed);
        assert!((strategy.is_valid)(&ctx, entering, &chunk));
        // The remaining neighbors are still UnLoaded.
        assert!(!(strategy.is_ready)(&ctx, entering, &chunk));

        for neighbor in &neighbors[1..] {
            load_chunk(&ctx, *neighbor, None);
        }
        assert!((strategy.is_ready)(&ctx, entering, &chunk));
    }

    #[test]
    fn level_edge_counts_as_loaded_empty_space() {
        let ctx = testing::context(Coordinate::new(2, 2, 2), 0);
        let strategy = strategy_for(Resolution::Meshed);
        // Every positive neighbor of the far corner lies outside the level.
        let id = Coordinate::new(1, 1, 1);
        load_chunk(&ctx, id, Some(1));

        let chunk = ctx.level.chunk(id);
        let entering = adj(id, AdjustmentDirection::EnteringFocus, Resolution::Meshed);
        assert!((strategy.is_valid)(&ctx, entering, &chunk));
        assert!((strategy.is_ready)(&ctx, entering, &chunk));
    }

    #[test]
    fn demesh_is_dropped_for_chunks_that_never_meshed() {
        let ctx = testing::context(Coordinate::new(8, 8, 8), 0);
        let strategy = strategy_for(Resolution::Meshed);
        let id = Coordinate::new(1, 1, 1);
        load_chunk(&ctx, id, Some(1));

        let chunk = ctx.level.chunk(id);
        let leaving = adj(id, AdjustmentDirection::LeavingFocus, Resolution::Meshed);
        assert!(!(strategy.is_valid)(&ctx, leaving, &chunk));
    }

    fn walk_to_visible(ctx: &StreamContext, id: Coordinate) {
        load_chunk(ctx, id, Some(1));
        let chunk = ctx.level.chunk(id);
        assert!(chunk.try_lock(Resolution::Meshed));
        chunk.set_meshed(true, Some(MeshHandle::new(1)));
        chunk.unlock(Resolution::Meshed);
        assert!(chunk.try_lock(Resolution::Visible));
        chunk.set_visible(true);
        chunk.unlock(Resolution::Visible);
    }

    #[test]
    fn visible_chunks_drop_duplicate_mesh_requests() {
        let ctx = testing::context(Coordinate::new(8, 8, 8), 0);
        let strategy = strategy_for(Resolution::Meshed);
        let id = Coordinate::new(1, 1, 1);
        walk_to_visible(&ctx, id);

        // A second focus whose meshed region reaches the chunk must not
        // try to mesh it again.
        let chunk = ctx.level.chunk(id);
        let entering = Adjustment::new(
            id,
            AdjustmentDirection::EnteringFocus,
            Resolution::Meshed,
            FocusId(2),
        );
        assert!(!(strategy.is_valid)(&ctx, entering, &chunk));
    }

    #[test]
    fn demesh_of_a_visible_chunk_waits_for_the_hide() {
        let ctx = testing::context(Coordinate::new(8, 8, 8), 0);
        let strategy = strategy_for(Resolution::Meshed);
        let id = Coordinate::new(1, 1, 1);
        walk_to_visible(&ctx, id);

        let chunk = ctx.level.chunk(id);
        let leaving = adj(id, AdjustmentDirection::LeavingFocus, Resolution::Meshed);
        // Still worth doing, but not until the chunk is hidden.
        assert!((strategy.is_valid)(&ctx, leaving, &chunk));
        assert!(!(strategy.is_ready)(&ctx, leaving, &chunk));

        assert!(chunk.try_lock(Resolution::Visible));
        chunk.set_visible(false);
        chunk.unlock(Resolution::Visible);
        assert!((strategy.is_ready)(&ctx, leaving, &chunk));
    }

    #[test]
    fn empty_mesh_never_becomes_visible() {
        let ctx = testing::context(Coordinate::new(8, 8, 8), 0);
        let strategy = strategy_for(Resolution::Visible);
        let id = Coordinate::new(1, 1, 1);
        load_chunk(&ctx, id, Some(1));

        let chunk = ctx.level.chunk(id);
        assert!(chunk.try_lock(Resolution::Meshed));
        chunk.set_meshed(true, None);
        chunk.unlock(Resolution::Meshed);

        let entering = adj(id, AdjustmentDirection::EnteringFocus, Resolution::Visible);
        assert!(!(strategy.is_valid)(&ctx, entering, &chunk));
    }

    #[test]
    fn visibility_readiness_requires_the_adjacent_state() {
        let ctx = testing::context(Coordinate::new(8, 8, 8), 0);
        let strategy = strategy_for(Resolution::Visible);
        let id = Coordinate::new(1, 1, 1);

        let chunk = ctx.level.chunk(id);
        let entering = adj(id, AdjustmentDirection::EnteringFocus, Resolution::Visible);
        // Still UnLoaded: valid (waiting on the coarser apertures) but
        // not ready.
        assert!((strategy.is_valid)(&ctx, entering, &chunk));
        assert!(!(strategy.is_ready)(&ctx, entering, &chunk));

        load_chunk(&ctx, id, Some(1));
        assert!(!(strategy.is_ready)(&ctx, entering, &chunk));

        assert!(chunk.try_lock(Resolution::Meshed));
        chunk.set_meshed(true, Some(MeshHandle::new(1)));
        chunk.unlock(Resolution::Meshed);
        assert!((strategy.is_ready)(&ctx, entering, &chunk));
    }
}
