// src/terrain.rs
// Terrain value collaborator: a pluggable per-voxel byte source, seeded by
// the level, plus the helper that fills a whole chunk from it.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::config;
use crate::coords::Coordinate;
use crate::persist::ChunkSaveData;

pub const AIR: u8 = 0;
pub const STONE: u8 = 1;
pub const DIRT: u8 = 2;
pub const GRASS: u8 = 3;

/// Produces the voxel byte at a world coordinate. 0 = empty.
pub trait VoxelSource: Send + Sync {
    fn value_at(&self, world: Coordinate) -> u8;
}

/// Fbm-over-Perlin heightmap source. Ground height comes from two stacked
/// noise fields; voxels at or below ground get a material by depth.
pub struct PerlinSource {
    height: Fbm<Perlin>,
    detail: Fbm<Perlin>,
    base_height: f64,
    amplitude: f64,
}

impl PerlinSource {
    pub fn new(seed: u32) -> Self {
        Self {
            height: Fbm::<Perlin>::new(seed).set_octaves(5).set_frequency(0.008),
            detail: Fbm::<Perlin>::new(seed ^ 0xA5A5_A5A5)
                .set_octaves(3)
                .set_frequency(0.05),
            base_height: (config::CHUNK_DIAMETER * 8) as f64,
            amplitude: (config::CHUNK_DIAMETER * 3) as f64,
        }
    }

    fn ground_height(&self, x: i32, z: i32) -> i32 {
        let h0 = self.height.get([x as f64, z as f64]);
        let h1 = self.detail.get([x as f64, z as f64]);
        (self.base_height + h0 * self.amplitude + h1 * 3.0).round() as i32
    }
}

impl VoxelSource for PerlinSource {
    fn value_at(&self, world: Coordinate) -> u8 {
        let ground = self.ground_height(world.x, world.z);
        if world.y > ground {
            AIR
        } else if world.y == ground {
            GRASS
        } else if world.y > ground - 4 {
            DIRT
        } else {
            STONE
        }
    }
}

/// Generate a full chunk worth of voxels from a source. Returns the buffer
/// (`None` when every cell came back empty) and the solid count, matching
/// what `Chunk::set_voxel_data` expects.
pub fn generate_chunk(source: &dyn VoxelSource, chunk_id: Coordinate) -> ChunkSaveData {
    let d = config::CHUNK_DIAMETER;
    let origin = chunk_id.chunk_to_world();
    let mut voxels = vec![0u8; config::CHUNK_VOXEL_COUNT];
    let mut solid_count = 0u32;

    for x in 0..d {
        for z in 0..d {
            for y in 0..d {
                let value = source.value_at(origin.offset(x as i32, y as i32, z as i32));
                if value != AIR {
                    voxels[Coordinate::flatten(x, y, z, d)] = value;
                    solid_count += 1;
                }
            }
        }
    }

    ChunkSaveData {
        voxels: (solid_count > 0).then_some(voxels),
        solid_count,
    }
}
