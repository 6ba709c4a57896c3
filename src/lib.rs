// src/lib.rs
// Resolution-streaming engine for large voxel levels: mobile foci pull
// the chunks around them up a resolution ladder (UnLoaded -> Loaded ->
// Meshed -> Visible) and push them back down as they move away. The
// embedder supplies the terrain source, chunk store and mesh builder,
// and consumes chunk events on the other side.

pub mod chunk;
pub mod config;
pub mod coords;
pub mod events;
pub mod level;
pub mod mesh;
pub mod persist;
pub mod streaming;
pub mod terrain;
