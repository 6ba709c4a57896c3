// src/main.rs
// Headless demo: stream a Perlin level around one focus walking east and
// log census progress.

use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;

use lodstream::config;
use lodstream::coords::Coordinate;
use lodstream::events::{Channel, ChunkEvent, EventBus, Observer};
use lodstream::level::Level;
use lodstream::mesh::FaceCountMesher;
use lodstream::persist::FileStore;
use lodstream::streaming::{Lens, LensOptions, LevelStreamer, StreamContext};
use lodstream::terrain::PerlinSource;

/// Headless stand-in for the presentation layer: logs mesh traffic and
/// completes visibility changes immediately.
struct LoggingPresenter {
    level: Arc<Level>,
}

impl Observer for LoggingPresenter {
    fn notify(&self, event: &ChunkEvent) {
        match event {
            ChunkEvent::MeshReady { adjustment, mesh } => {
                let priority = self
                    .level
                    .priority_for_adjustment(*adjustment)
                    .unwrap_or_default();
                log::debug!(
                    "mesh {} ready for chunk {} (priority {priority:.1})",
                    mesh.id(),
                    adjustment.chunk_id
                );
            }
            ChunkEvent::MeshRemoved { adjustment } => {
                log::debug!("mesh removed for chunk {}", adjustment.chunk_id);
            }
            ChunkEvent::ShowChunk { adjustment } | ChunkEvent::HideChunk { adjustment } => {
                self.level.complete_visibility_change(*adjustment);
            }
        }
    }
}

fn main() {
    env_logger::init();

    let level = Arc::new(Level::new(
        "no-mans-land",
        1234,
        Coordinate::new(64, 16, 64),
    ));
    let events = Arc::new(EventBus::new());
    events.subscribe(
        Arc::new(LoggingPresenter {
            level: level.clone(),
        }),
        Channel::ChunkActivationUpdates,
    );

    let ctx = StreamContext::new(
        level.clone(),
        Arc::new(PerlinSource::new(level.seed())),
        Arc::new(FileStore::new("level-data")),
        Arc::new(FaceCountMesher::default()),
        events,
    );

    let d = config::CHUNK_DIAMETER as f32;
    let focus = level.register_focus(Vec3::new(32.0 * d, 8.5 * d, 32.0 * d));
    let options = LensOptions::new(5).with_height_radius(2);
    level.set_lens_options(focus.id(), options);
    let mut lens = Lens::new(focus.clone(), options);
    let mesh_node_count = lens.initialize(&level);
    log::info!("lens initialized, {mesh_node_count} chunks will want meshes");
    focus.activate();

    let streamer = LevelStreamer::start(ctx, vec![lens]);

    // Walk the focus east across a few chunk borders while streaming
    // keeps up.
    let start = focus.position();
    for step in 0..40 {
        std::thread::sleep(Duration::from_millis(500));
        focus.move_to(start + Vec3::new(step as f32 * 4.0, 0.0, 0.0));
        streamer.wake();
        if step % 10 == 0 {
            log::info!("census: {}", level.resolution_census());
        }
    }

    streamer.stop();
    log::info!("final census: {}", level.resolution_census());
}
