// src/streaming/aperture.rs
// One aperture manages one resolution for one focus: the region of
// chunks that should be at that resolution, and the priority queue of
// adjustments getting them there. Apertures are never shared across
// foci.

use crate::chunk::Resolution;
use crate::config;
use crate::coords::{Bounds, Coordinate};
use crate::streaming::context::StreamContext;
use crate::streaming::jobs::AdjustmentJob;
use crate::streaming::queue::AdjustmentQueue;
use crate::streaming::strategy::{strategy_for, Strategy};
use crate::streaming::types::{Adjustment, AdjustmentDirection, LeavingOrder};
use crate::level::FocusId;

/// The managed radii of one aperture: `radius` on x/z, `height_radius`
/// on y.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ApertureShape {
    pub radius: i32,
    pub height_radius: i32,
}

impl ApertureShape {
    pub fn new(radius: i32, height_radius: i32) -> Self {
        Self {
            radius,
            height_radius,
        }
    }

    /// Upper bound on the distance of any managed chunk from the focus.
    pub fn max_managed_distance(&self) -> f32 {
        let r = (self.radius * self.radius) as f32;
        let h = (self.height_radius * self.height_radius) as f32;
        (r + r + h).sqrt() + 1.0
    }
}

/// Priority of an adjustment relative to a focus. Smaller dequeues
/// first. Entering work is ordered closest-first; leaving work follows
/// the configured ordering.
pub fn priority_for(
    adjustment: Adjustment,
    focus_chunk: Coordinate,
    shape: ApertureShape,
    leaving_order: LeavingOrder,
) -> f32 {
    let distance = adjustment
        .chunk_id
        .distance_y_weighted(focus_chunk, config::Y_DISTANCE_WEIGHT);
    match adjustment.direction {
        AdjustmentDirection::EnteringFocus => distance,
        AdjustmentDirection::LeavingFocus => match leaving_order {
            LeavingOrder::FarthestFirst => shape.max_managed_distance() - distance,
            LeavingOrder::NearestFirst => distance,
        },
    }
}

pub struct Aperture {
    resolution: Resolution,
    focus_id: FocusId,
    shape: ApertureShape,
    leaving_order: LeavingOrder,
    strategy: Strategy,
    bounds: Bounds,
    queue: AdjustmentQueue,
}

impl Aperture {
    pub fn new(
        resolution: Resolution,
        focus_id: FocusId,
        shape: ApertureShape,
        leaving_order: LeavingOrder,
    ) -> Self {
        Self {
            resolution,
            focus_id,
            shape,
            leaving_order,
            strategy: strategy_for(resolution),
            bounds: Bounds::default(),
            queue: AdjustmentQueue::new(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn shape(&self) -> ApertureShape {
        self.shape
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn managed_bounds(&self, focus_chunk: Coordinate, level_bounds: Coordinate) -> Bounds {
        Bounds::around(
            focus_chunk,
            self.shape.radius,
            self.shape.height_radius,
            level_bounds,
        )
    }

    fn enqueue(&mut self, adjustment: Adjustment, focus_chunk: Coordinate) {
        let priority = priority_for(adjustment, focus_chunk, self.shape, self.leaving_order);
        self.queue.enqueue(priority, adjustment);
    }

    /// Set the initial region around a fresh focus and queue every chunk
    /// in it as entering. Returns the adjustment count.
    pub fn initialize(&mut self, focus_chunk: Coordinate, level_bounds: Coordinate) -> usize {
        self.bounds = self.managed_bounds(focus_chunk, level_bounds);
        let mut count = 0;
        for chunk_id in self.bounds.iter().collect::<Vec<_>>() {
            self.enqueue(
                Adjustment::new(
                    chunk_id,
                    AdjustmentDirection::EnteringFocus,
                    self.resolution,
                    self.focus_id,
                ),
                focus_chunk,
            );
            count += 1;
        }
        count
    }

    /// Replace the region after a focus chunk crossing: chunks in the
    /// new region only enter, chunks in the old region only leave.
    pub fn on_focus_moved(&mut self, focus_chunk: Coordinate, level_bounds: Coordinate) {
        let new_bounds = self.managed_bounds(focus_chunk, level_bounds);

        let entering: Vec<_> = new_bounds.iter_not_within(&self.bounds).collect();
        let leaving: Vec<_> = self.bounds.iter_not_within(&new_bounds).collect();
        self.bounds = new_bounds;

        for chunk_id in entering {
            self.enqueue(
                Adjustment::new(
                    chunk_id,
                    AdjustmentDirection::EnteringFocus,
                    self.resolution,
                    self.focus_id,
                ),
                focus_chunk,
            );
        }
        for chunk_id in leaving {
            self.enqueue(
                Adjustment::new(
                    chunk_id,
                    AdjustmentDirection::LeavingFocus,
                    self.resolution,
                    self.focus_id,
                ),
                focus_chunk,
            );
        }
    }

    /// An adjustment overtaken by focus movement: entering work for a
    /// chunk no longer managed, or leaving work for one managed again.
    fn is_stale(&self, adjustment: Adjustment) -> bool {
        let in_bounds = self.bounds.contains(adjustment.chunk_id);
        match adjustment.direction {
            AdjustmentDirection::EnteringFocus => !in_bounds,
            AdjustmentDirection::LeavingFocus => in_bounds,
        }
    }

    /// The scheduling protocol: pop the most urgent adjustment, drop it
    /// if stale or invalid, and otherwise run it only when the chunk is
    /// unlocked and the strategy says it is ready. Anything that cannot
    /// run right now goes back in the queue at a fresh priority; busy
    /// items cycle rather than block the queue. At most one job is
    /// produced per call, already holding the chunk's work lock.
    pub fn try_next_job(
        &mut self,
        ctx: &StreamContext,
        focus_chunk: Coordinate,
    ) -> Option<Box<dyn AdjustmentJob>> {
        let adjustment = self.queue.dequeue()?;

        if self.is_stale(adjustment) {
            log::debug!("{:?} aperture dropped stale {adjustment}", self.resolution);
            return None;
        }

        let chunk = ctx.level.chunk(adjustment.chunk_id);
        if !(self.strategy.is_valid)(ctx, adjustment, &chunk) {
            return None;
        }

        if !chunk.is_locked()
            && (self.strategy.is_ready)(ctx, adjustment, &chunk)
            && chunk.try_lock(adjustment.resolution)
        {
            Some((self.strategy.build_job)(adjustment, ctx))
        } else {
            // Not ready yet, or another aperture's job owns the chunk.
            self.enqueue(adjustment, focus_chunk);
            None
        }
    }

    /// Requeue an adjustment whose job failed, unless it already burned
    /// through its retries.
    pub fn requeue_failed(&mut self, adjustment: Adjustment, focus_chunk: Coordinate) {
        let retry = adjustment.with_failure();
        if retry.failures >= config::MAX_JOB_FAILURES {
            log::error!(
                "dropping {retry} after {} failed attempts",
                retry.failures
            );
            return;
        }
        self.enqueue(retry, focus_chunk);
    }

    pub fn on_job_complete(&self, ctx: &StreamContext, adjustment: Adjustment) {
        (self.strategy.on_complete)(ctx, adjustment);
    }
}
