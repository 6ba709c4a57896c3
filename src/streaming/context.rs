// src/streaming/context.rs
// Everything a job or strategy needs to touch the world, bundled so it
// can be handed to worker threads by value. Built once at startup.

use std::sync::Arc;

use crate::events::EventBus;
use crate::level::Level;
use crate::mesh::MeshBuilder;
use crate::persist::ChunkStore;
use crate::terrain::VoxelSource;

#[derive(Clone)]
pub struct StreamContext {
    pub level: Arc<Level>,
    pub source: Arc<dyn VoxelSource>,
    pub store: Arc<dyn ChunkStore>,
    pub mesher: Arc<dyn MeshBuilder>,
    pub events: Arc<EventBus>,
}

impl StreamContext {
    pub fn new(
        level: Arc<Level>,
        source: Arc<dyn VoxelSource>,
        store: Arc<dyn ChunkStore>,
        mesher: Arc<dyn MeshBuilder>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            level,
            source,
            store,
            mesher,
            events,
        }
    }
}
