// src/coords.rs
// Integer chunk/world coordinates and the axis-aligned bounds math the
// apertures use for region tracking.

use crate::config;

/// An integer 3D coordinate. Doubles as a chunk id (the chunk containing
/// world 0,0,0 has id 0,0,0) and as a world-voxel location.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, Default, PartialOrd, Ord)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coordinate {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Flatten a local offset into an index for a 1D array of the given diameter.
    #[inline(always)]
    pub fn flatten(x: usize, y: usize, z: usize, diameter: usize) -> usize {
        debug_assert!(x < diameter && y < diameter && z < diameter);
        x * diameter * diameter + y * diameter + z
    }

    /// Chunk id for the chunk containing this world-voxel location.
    #[inline]
    pub fn world_to_chunk(self) -> Coordinate {
        let d = config::CHUNK_DIAMETER as i32;
        Coordinate::new(
            self.x.div_euclid(d),
            self.y.div_euclid(d),
            self.z.div_euclid(d),
        )
    }

    /// World location of the 0,0,0 voxel of the chunk with this id.
    #[inline]
    pub fn chunk_to_world(self) -> Coordinate {
        let d = config::CHUNK_DIAMETER as i32;
        Coordinate::new(self.x * d, self.y * d, self.z * d)
    }

    /// Local offset of this world-voxel location inside its chunk.
    #[inline]
    pub fn local_in_chunk(self) -> (usize, usize, usize) {
        let d = config::CHUNK_DIAMETER as i32;
        (
            self.x.rem_euclid(d) as usize,
            self.y.rem_euclid(d) as usize,
            self.z.rem_euclid(d) as usize,
        )
    }

    /// Euclidean distance with extra weight on the vertical axis.
    /// The weight multiplies the squared y delta, like the priority skew
    /// the apertures use.
    pub fn distance_y_weighted(self, other: Coordinate, y_weight: f32) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        let dz = (self.z - other.z) as f32;
        (dx * dx + dy * dy * y_weight + dz * dz).sqrt()
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Coordinate {
        Coordinate::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<(i32, i32, i32)> for Coordinate {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Coordinate::new(x, y, z)
    }
}

/// An axis-aligned box of coordinates: inclusive `min`, exclusive `max`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Bounds {
    pub min: Coordinate,
    pub max: Coordinate,
}

impl Bounds {
    pub fn new(min: Coordinate, max: Coordinate) -> Self {
        Self { min, max }
    }

    /// Bounds of radius `radius` (x/z) and `height_radius` (y) around
    /// `center`, clamped to `[0, limit)` per axis. A radius of r spans
    /// 2r + 1 chunks per axis before clamping.
    pub fn around(center: Coordinate, radius: i32, height_radius: i32, limit: Coordinate) -> Self {
        Self {
            min: Coordinate::new(
                (center.x - radius).max(0),
                (center.y - height_radius).max(0),
                (center.z - radius).max(0),
            ),
            max: Coordinate::new(
                (center.x + radius + 1).min(limit.x),
                (center.y + height_radius + 1).min(limit.y),
                (center.z + radius + 1).min(limit.z),
            ),
        }
    }

    #[inline]
    pub fn contains(&self, c: Coordinate) -> bool {
        c.x >= self.min.x
            && c.y >= self.min.y
            && c.z >= self.min.z
            && c.x < self.max.x
            && c.y < self.max.y
            && c.z < self.max.z
    }

    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y || self.max.z <= self.min.z
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        ((self.max.x - self.min.x) as usize)
            * ((self.max.y - self.min.y) as usize)
            * ((self.max.z - self.min.z) as usize)
    }

    /// Iterate every coordinate in the box.
    pub fn iter(&self) -> impl Iterator<Item = Coordinate> + '_ {
        let b = *self;
        (b.min.x..b.max.x).flat_map(move |x| {
            (b.min.y..b.max.y)
                .flat_map(move |y| (b.min.z..b.max.z).map(move |z| Coordinate::new(x, y, z)))
        })
    }

    /// Iterate every coordinate in `self` that is not in `other`.
    /// This is the region diff a focus move produces.
    pub fn iter_not_within<'a>(&'a self, other: &'a Bounds) -> impl Iterator<Item = Coordinate> + 'a {
        let other = *other;
        self.iter().filter(move |c| !other.contains(*c))
    }
}
