// src/config.rs
// Global tuning knobs for the resolution-streaming engine.

/// Chunk edge length in voxels. Used for x, y and z.
pub const CHUNK_DIAMETER: usize = 16;

/// Total voxel cells in one chunk.
pub const CHUNK_VOXEL_COUNT: usize = CHUNK_DIAMETER * CHUNK_DIAMETER * CHUNK_DIAMETER;

/// Worker threads shared by all jobs of one level.
pub const WORKER_THREADS: usize = 4;

/// How often a failed job's adjustment is re-enqueued before it is dropped.
pub const MAX_JOB_FAILURES: u32 = 3;

/// Extra weight applied to vertical distance in adjustment priorities.
/// Chunks above/below the focus matter less than the ring around it.
pub const Y_DISTANCE_WEIGHT: f32 = 5.0;

/// Streaming manager pass cadence in milliseconds.
/// The loop can also be woken early through `LevelStreamer::wake`.
pub const STREAM_TICK_MS: u64 = 5;

// Default lens shape: each coarser aperture manages a buffer of chunks
// around the finer one, so voxel data exists before meshing wants it and
// meshes exist before visibility wants them.
pub const MESHED_CHUNK_BUFFER: i32 = 5;
pub const LOADED_CHUNK_BUFFER: i32 = 5;
pub const HEIGHT_BUFFER_OVERRIDE: i32 = 3;
