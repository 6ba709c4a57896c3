// src/streaming/lens.rs
// A lens is the ordered aperture stack serving one focus: a wide Loaded
// aperture, a narrower Meshed one inside it, and the Visible aperture
// innermost, so each stage's prerequisites stream in ahead of it.

use std::sync::Arc;

use crate::chunk::Resolution;
use crate::config;
use crate::level::{Focus, Level};
use crate::streaming::aperture::{Aperture, ApertureShape};
use crate::streaming::context::StreamContext;
use crate::streaming::jobs::{JobExecutor, JobHandle};
use crate::streaming::types::LeavingOrder;

/// Shape of a lens: the visible radius plus the stacked buffers the
/// coarser apertures add around it.
#[derive(Clone, Copy, Debug)]
pub struct LensOptions {
    pub visible_radius: i32,
    /// Flatter worlds want a shorter managed column than the x/z radius.
    pub visible_height_radius: Option<i32>,
    pub leaving_order: LeavingOrder,
}

impl LensOptions {
    pub fn new(visible_radius: i32) -> Self {
        Self {
            visible_radius,
            visible_height_radius: None,
            leaving_order: LeavingOrder::default(),
        }
    }

    pub fn with_height_radius(mut self, height_radius: i32) -> Self {
        self.visible_height_radius = Some(height_radius);
        self
    }

    pub fn shape_for(&self, resolution: Resolution) -> Option<ApertureShape> {
        let r = self.visible_radius;
        let h = self.visible_height_radius;
        match resolution {
            Resolution::UnLoaded => None,
            Resolution::Loaded => Some(ApertureShape::new(
                r + config::MESHED_CHUNK_BUFFER + config::LOADED_CHUNK_BUFFER,
                match h {
                    None => r + config::MESHED_CHUNK_BUFFER + config::LOADED_CHUNK_BUFFER,
                    Some(h) => h + config::HEIGHT_BUFFER_OVERRIDE + config::HEIGHT_BUFFER_OVERRIDE,
                },
            )),
            Resolution::Meshed => Some(ApertureShape::new(
                r + config::MESHED_CHUNK_BUFFER,
                match h {
                    None => r + config::MESHED_CHUNK_BUFFER,
                    Some(h) => h + config::HEIGHT_BUFFER_OVERRIDE,
                },
            )),
            Resolution::Visible => Some(ApertureShape::new(r, h.unwrap_or(r))),
        }
    }
}

pub struct Lens {
    focus: Arc<Focus>,
    /// Ascending resolution order; scheduling walks this backwards so
    /// the finest work wins ties.
    apertures: Vec<Aperture>,
    running: Vec<JobHandle>,
}

impl Lens {
    pub fn new(focus: Arc<Focus>, options: LensOptions) -> Self {
        let apertures = [Resolution::Loaded, Resolution::Meshed, Resolution::Visible]
            .into_iter()
            .filter_map(|resolution| {
                options.shape_for(resolution).map(|shape| {
                    Aperture::new(resolution, focus.id(), shape, options.leaving_order)
                })
            })
            .collect();
        Self {
            focus,
            apertures,
            running: Vec::new(),
        }
    }

    pub fn focus(&self) -> &Arc<Focus> {
        &self.focus
    }

    pub fn running_jobs(&self) -> usize {
        self.running.len()
    }

    pub fn pending_adjustments(&self) -> usize {
        self.apertures.iter().map(Aperture::pending).sum()
    }

    /// Queue the initial regions of every aperture. Returns how many
    /// chunks will want render nodes, which is the meshed region size.
    pub fn initialize(&mut self, level: &Level) -> usize {
        let focus_chunk = self.focus.chunk_id();
        let mut mesh_node_count = 0;
        for aperture in &mut self.apertures {
            let count = aperture.initialize(focus_chunk, level.chunk_bounds());
            log::info!(
                "{:?} aperture initialized with {count} adjustments for focus {:?}",
                aperture.resolution(),
                self.focus.id()
            );
            if aperture.resolution() == Resolution::Meshed {
                mesh_node_count = count;
            }
        }
        mesh_node_count
    }

    /// Recompute every aperture's region diff after a focus chunk
    /// crossing, coarsest first.
    pub fn on_focus_moved(&mut self, level: &Level) {
        let focus_chunk = self.focus.chunk_id();
        for aperture in &mut self.apertures {
            aperture.on_focus_moved(focus_chunk, level.chunk_bounds());
        }
    }

    /// Start at most one job: scan apertures finest to coarsest and take
    /// the first ready adjustment.
    pub fn schedule_one_job(&mut self, ctx: &StreamContext, executor: &JobExecutor) -> bool {
        let focus_chunk = self.focus.chunk_id();
        for aperture in self.apertures.iter_mut().rev() {
            if let Some(job) = aperture.try_next_job(ctx, focus_chunk) {
                self.running.push(executor.submit(job));
                return true;
            }
        }
        false
    }

    /// Collect finished jobs. A success fires the owning aperture's
    /// completion hook; a failure releases the chunk's work lock and
    /// sends the adjustment back through the queue until its retries run
    /// out.
    pub fn reap_finished_jobs(&mut self, ctx: &StreamContext) {
        let mut finished = Vec::new();
        self.running.retain(|handle| match handle.poll() {
            None => true,
            Some(result) => {
                finished.push((handle.adjustment(), result));
                false
            }
        });

        let focus_chunk = self.focus.chunk_id();
        for (adjustment, result) in finished {
            match result {
                Ok(()) => self
                    .aperture_for(adjustment.resolution)
                    .on_job_complete(ctx, adjustment),
                Err(err) => {
                    log::warn!("reaping failed job for {adjustment}: {err}");
                    let chunk = ctx.level.chunk(adjustment.chunk_id);
                    if !chunk.release_after_failure(adjustment.resolution) {
                        // The job released or re-tagged the lock before
                        // dying; nothing to clean up here.
                        log::debug!("no {:?} lock left to release on {}", adjustment.resolution, adjustment.chunk_id);
                    }
                    self.aperture_for_mut(adjustment.resolution)
                        .requeue_failed(adjustment, focus_chunk);
                }
            }
        }
    }

    fn aperture_for(&self, resolution: Resolution) -> &Aperture {
        self.apertures
            .iter()
            .find(|a| a.resolution() == resolution)
            .unwrap_or_else(|| panic!("lens has no {resolution:?} aperture"))
    }

    fn aperture_for_mut(&mut self, resolution: Resolution) -> &mut Aperture {
        self.apertures
            .iter_mut()
            .find(|a| a.resolution() == resolution)
            .unwrap_or_else(|| panic!("lens has no {resolution:?} aperture"))
    }
}
