// src/streaming/jobs.rs
// The asynchronous side of streaming: one job per adjustment, run on a
// shared worker pool. Every job that mutates chunk state runs under the
// work lock its aperture acquired and releases it on success; a failed
// job leaves the lock held for the reaper to release.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};

use crate::chunk::Resolution;
use crate::events::{Channel, ChunkEvent};
use crate::mesh::required_neighbors;
use crate::streaming::context::StreamContext;
use crate::streaming::types::{Adjustment, JobError};
use crate::terrain;

/// One unit of asynchronous work realizing an adjustment.
pub trait AdjustmentJob: Send {
    fn adjustment(&self) -> Adjustment;
    fn run(&self, ctx: &StreamContext) -> Result<(), JobError>;
}

// ---- loaded-resolution jobs ---------------------------------------------

/// Fill a chunk from the terrain value source. Runs when no saved data
/// exists for the chunk.
pub struct GenerateChunkJob {
    pub adjustment: Adjustment,
}

impl AdjustmentJob for GenerateChunkJob {
    fn adjustment(&self) -> Adjustment {
        self.adjustment
    }

    fn run(&self, ctx: &StreamContext) -> Result<(), JobError> {
        let data = terrain::generate_chunk(&*ctx.source, self.adjustment.chunk_id);
        let chunk = ctx.level.chunk(self.adjustment.chunk_id);
        chunk.set_voxel_data(data.voxels.map(Vec::into_boxed_slice), data.solid_count);
        chunk.unlock(Resolution::Loaded);
        Ok(())
    }
}

/// Restore a chunk's payload from the store.
pub struct LoadChunkJob {
    pub adjustment: Adjustment,
}

impl AdjustmentJob for LoadChunkJob {
    fn adjustment(&self) -> Adjustment {
        self.adjustment
    }

    fn run(&self, ctx: &StreamContext) -> Result<(), JobError> {
        let data = ctx
            .store
            .load(self.adjustment.chunk_id, ctx.level.name())?;
        let chunk = ctx.level.chunk(self.adjustment.chunk_id);
        chunk.set_voxel_data(data.voxels.map(Vec::into_boxed_slice), data.solid_count);
        chunk.unlock(Resolution::Loaded);
        Ok(())
    }
}

/// Extract a chunk's payload, persist it, and leave the chunk UnLoaded.
pub struct SaveChunkJob {
    pub adjustment: Adjustment,
}

impl AdjustmentJob for SaveChunkJob {
    fn adjustment(&self) -> Adjustment {
        self.adjustment
    }

    fn run(&self, ctx: &StreamContext) -> Result<(), JobError> {
        let chunk = ctx.level.chunk(self.adjustment.chunk_id);
        let data = chunk.extract_voxel_data(Resolution::UnLoaded);
        if let Err(err) = ctx.store.save(self.adjustment.chunk_id, ctx.level.name(), &data) {
            // Put the payload back so a retry still has something to save.
            chunk.set_voxel_data(data.voxels.map(Vec::into_boxed_slice), data.solid_count);
            return Err(err.into());
        }
        chunk.unlock(Resolution::Loaded);
        Ok(())
    }
}

// ---- meshed-resolution jobs ---------------------------------------------

/// Run the mesh builder over a chunk and its loaded neighbors.
pub struct BuildMeshJob {
    pub adjustment: Adjustment,
}

impl AdjustmentJob for BuildMeshJob {
    fn adjustment(&self) -> Adjustment {
        self.adjustment
    }

    fn run(&self, ctx: &StreamContext) -> Result<(), JobError> {
        let chunk_id = self.adjustment.chunk_id;
        let chunk = ctx.level.chunk(chunk_id);
        let neighbors: Vec<_> = required_neighbors(chunk_id)
            .into_iter()
            .filter(|n| ctx.level.contains_chunk(*n))
            .map(|n| ctx.level.chunk(n))
            .collect();

        let mesh = ctx.mesher.build(chunk_id, &chunk, &neighbors)?;
        chunk.set_meshed(true, mesh.clone());
        if let Some(mesh) = mesh {
            ctx.events.publish(
                ChunkEvent::MeshReady {
                    adjustment: self.adjustment,
                    mesh,
                },
                Channel::ChunkActivationUpdates,
            );
        }
        chunk.unlock(Resolution::Meshed);
        Ok(())
    }
}

/// Drop a chunk's mesh and tell the presentation layer to do the same.
pub struct RemoveMeshJob {
    pub adjustment: Adjustment,
}

impl AdjustmentJob for RemoveMeshJob {
    fn adjustment(&self) -> Adjustment {
        self.adjustment
    }

    fn run(&self, ctx: &StreamContext) -> Result<(), JobError> {
        ctx.events.publish(
            ChunkEvent::MeshRemoved {
                adjustment: self.adjustment,
            },
            Channel::ChunkActivationUpdates,
        );
        let chunk = ctx.level.chunk(self.adjustment.chunk_id);
        chunk.set_meshed(false, None);
        chunk.unlock(Resolution::Meshed);
        Ok(())
    }
}

// ---- visible-resolution jobs --------------------------------------------

// Visibility jobs are pure notifications. The chunk stays locked with the
// Visible tag until the presentation layer finishes its own work and
// calls `Level::complete_visibility_change`.

pub struct ShowChunkJob {
    pub adjustment: Adjustment,
}

impl AdjustmentJob for ShowChunkJob {
    fn adjustment(&self) -> Adjustment {
        self.adjustment
    }

    fn run(&self, ctx: &StreamContext) -> Result<(), JobError> {
        ctx.events.publish(
            ChunkEvent::ShowChunk {
                adjustment: self.adjustment,
            },
            Channel::ChunkActivationUpdates,
        );
        Ok(())
    }
}

pub struct HideChunkJob {
    pub adjustment: Adjustment,
}

impl AdjustmentJob for HideChunkJob {
    fn adjustment(&self) -> Adjustment {
        self.adjustment
    }

    fn run(&self, ctx: &StreamContext) -> Result<(), JobError> {
        ctx.events.publish(
            ChunkEvent::HideChunk {
                adjustment: self.adjustment,
            },
            Channel::ChunkActivationUpdates,
        );
        Ok(())
    }
}

// ---- executor ------------------------------------------------------------

/// Tracks one submitted job. The lens polls it each reap pass.
pub struct JobHandle {
    adjustment: Adjustment,
    rx: Receiver<Result<(), JobError>>,
}

impl JobHandle {
    pub fn adjustment(&self) -> Adjustment {
        self.adjustment
    }

    /// Non-blocking completion check. `None` while the job is still
    /// running; a disconnected worker reports as a failed job.
    pub fn poll(&self) -> Option<Result<(), JobError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(JobError::Abandoned)),
        }
    }
}

struct QueuedJob {
    job: Box<dyn AdjustmentJob>,
    done: Sender<Result<(), JobError>>,
}

/// Shared worker pool all of a level's jobs run on. Dropping the
/// executor lets in-flight and queued jobs finish, then joins the
/// workers.
pub struct JobExecutor {
    tx: Option<Sender<QueuedJob>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl JobExecutor {
    pub fn new(ctx: StreamContext, worker_count: usize) -> Self {
        let (tx, rx) = unbounded::<QueuedJob>();
        let workers = (0..worker_count)
            .map(|_| {
                let rx = rx.clone();
                let ctx = ctx.clone();
                thread::spawn(move || {
                    for queued in rx.iter() {
                        // A panicking job must not take the worker with it;
                        // it surfaces like any other failed job.
                        let result = catch_unwind(AssertUnwindSafe(|| queued.job.run(&ctx)))
                            .unwrap_or(Err(JobError::Panicked));
                        if let Err(err) = &result {
                            log::warn!("job for {} failed: {err}", queued.job.adjustment());
                        }
                        // The handle may already have been dropped.
                        let _ = queued.done.send(result);
                    }
                })
            })
            .collect();
        Self {
            tx: Some(tx),
            workers,
        }
    }

    pub fn submit(&self, job: Box<dyn AdjustmentJob>) -> JobHandle {
        let adjustment = job.adjustment();
        let (done, rx) = bounded(1);
        if let Some(tx) = &self.tx {
            // A send failure means every worker is gone; the handle will
            // report the job as abandoned.
            let _ = tx.send(QueuedJob { job, done });
        }
        JobHandle { adjustment, rx }
    }
}

impl Drop for JobExecutor {
    fn drop(&mut self) {
        self.tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Coordinate;
    use crate::level::FocusId;
    use crate::streaming::testing;
    use crate::streaming::types::AdjustmentDirection;
    use std::time::{Duration, Instant};

    fn wait(handle: &JobHandle) -> Result<(), JobError> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = handle.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "job never completed");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn generate_job_loads_and_unlocks_the_chunk() {
        let ctx = testing::context(Coordinate::new(4, 4, 4), 100);
        let executor = JobExecutor::new(ctx.clone(), 2);
        let id = Coordinate::new(1, 1, 1);
        let adjustment = Adjustment::new(
            id,
            AdjustmentDirection::EnteringFocus,
            Resolution::Loaded,
            FocusId(1),
        );

        let chunk = ctx.level.chunk(id);
        assert!(chunk.try_lock(Resolution::Loaded));
        let handle = executor.submit(Box::new(GenerateChunkJob { adjustment }));
        wait(&handle).unwrap();

        assert_eq!(chunk.resolution(), Resolution::Loaded);
        assert!(chunk.is_solid());
        assert!(!chunk.is_locked());
    }

    #[test]
    fn save_then_load_round_trips_through_the_store() {
        let ctx = testing::context(Coordinate::new(4, 4, 4), 100);
        let executor = JobExecutor::new(ctx.clone(), 2);
        let id = Coordinate::new(0, 2, 0);
        let entering = Adjustment::new(
            id,
            AdjustmentDirection::EnteringFocus,
            Resolution::Loaded,
            FocusId(1),
        );
        let leaving = Adjustment::new(
            id,
            AdjustmentDirection::LeavingFocus,
            Resolution::Loaded,
            FocusId(1),
        );

        let chunk = ctx.level.chunk(id);
        assert!(chunk.try_lock(Resolution::Loaded));
        wait(&executor.submit(Box::new(GenerateChunkJob { adjustment: entering }))).unwrap();
        let solid_before = chunk.solid_voxel_count();

        assert!(chunk.try_lock(Resolution::Loaded));
        wait(&executor.submit(Box::new(SaveChunkJob { adjustment: leaving }))).unwrap();
        assert_eq!(chunk.resolution(), Resolution::UnLoaded);
        assert!(ctx.store.exists(id, ctx.level.name()));

        assert!(chunk.try_lock(Resolution::Loaded));
        wait(&executor.submit(Box::new(LoadChunkJob { adjustment: entering }))).unwrap();
        assert_eq!(chunk.resolution(), Resolution::Loaded);
        assert_eq!(chunk.solid_voxel_count(), solid_before);
    }

    struct ExplodingJob {
        adjustment: Adjustment,
    }

    impl AdjustmentJob for ExplodingJob {
        fn adjustment(&self) -> Adjustment {
            self.adjustment
        }

        fn run(&self, _ctx: &StreamContext) -> Result<(), JobError> {
            panic!("boom");
        }
    }

    #[test]
    fn panicking_job_fails_without_killing_its_worker() {
        let ctx = testing::context(Coordinate::new(4, 4, 4), 100);
        let executor = JobExecutor::new(ctx.clone(), 1);
        let bad = Adjustment::new(
            Coordinate::new(0, 0, 0),
            AdjustmentDirection::EnteringFocus,
            Resolution::Loaded,
            FocusId(1),
        );

        let result = wait(&executor.submit(Box::new(ExplodingJob { adjustment: bad })));
        assert!(matches!(result, Err(JobError::Panicked)));

        // The pool only has one worker; it must still be taking jobs.
        let id = Coordinate::new(1, 1, 1);
        let good = Adjustment::new(
            id,
            AdjustmentDirection::EnteringFocus,
            Resolution::Loaded,
            FocusId(1),
        );
        let chunk = ctx.level.chunk(id);
        assert!(chunk.try_lock(Resolution::Loaded));
        wait(&executor.submit(Box::new(GenerateChunkJob { adjustment: good }))).unwrap();
        assert_eq!(chunk.resolution(), Resolution::Loaded);
        assert!(!chunk.is_locked());
    }

    #[test]
    fn load_failure_reports_and_keeps_the_lock_held() {
        let ctx = testing::context(Coordinate::new(4, 4, 4), 100);
        let executor = JobExecutor::new(ctx.clone(), 1);
        let id = Coordinate::new(3, 3, 3);
        let adjustment = Adjustment::new(
            id,
            AdjustmentDirection::EnteringFocus,
            Resolution::Loaded,
            FocusId(1),
        );

        let chunk = ctx.level.chunk(id);
        assert!(chunk.try_lock(Resolution::Loaded));
        // Nothing was ever saved for this chunk, so the load must fail.
        let result = wait(&executor.submit(Box::new(LoadChunkJob { adjustment })));
        assert!(matches!(result, Err(JobError::Store(_))));
        assert!(chunk.is_locked());
        assert_eq!(chunk.resolution(), Resolution::UnLoaded);
    }
}
