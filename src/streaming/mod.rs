// src/streaming/mod.rs
// The resolution-streaming core: apertures generate per-chunk
// adjustments around each focus, lenses schedule them as asynchronous
// jobs, and the manager thread paces the whole thing.

pub mod aperture;
pub mod context;
pub mod jobs;
pub mod lens;
pub mod manager;
pub mod queue;
pub mod strategy;
pub mod types;

pub use context::StreamContext;
pub use lens::{Lens, LensOptions};
pub use manager::LevelStreamer;
pub use types::{Adjustment, AdjustmentDirection, LeavingOrder};
