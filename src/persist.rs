// src/persist.rs
// Chunk persistence boundary: extract-and-save on the way out of focus,
// load-if-present on the way back in. The engine only depends on the
// `ChunkStore` trait; the file layout below is one implementation.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coords::Coordinate;

/// Voxel payload as it leaves or re-enters the engine. A `None` buffer is
/// the fully empty chunk.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ChunkSaveData {
    pub voxels: Option<Vec<u8>>,
    pub solid_count: u32,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("chunk store i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("chunk store codec: {0}")]
    Codec(#[from] bincode::Error),
    #[error("no saved data for chunk {0}")]
    Missing(Coordinate),
}

pub trait ChunkStore: Send + Sync {
    fn exists(&self, chunk_id: Coordinate, level_name: &str) -> bool;
    fn load(&self, chunk_id: Coordinate, level_name: &str) -> Result<ChunkSaveData, StoreError>;
    fn save(
        &self,
        chunk_id: Coordinate,
        level_name: &str,
        data: &ChunkSaveData,
    ) -> Result<(), StoreError>;
}

/// One bincode file per chunk under `<root>/<level>/`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, chunk_id: Coordinate, level_name: &str) -> PathBuf {
        let safe: String = level_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        self.root.join(safe).join(format!(
            "{}_{}_{}.chunk",
            chunk_id.x, chunk_id.y, chunk_id.z
        ))
    }
}

impl ChunkStore for FileStore {
    fn exists(&self, chunk_id: Coordinate, level_name: &str) -> bool {
        self.path_for(chunk_id, level_name).is_file()
    }

    fn load(&self, chunk_id: Coordinate, level_name: &str) -> Result<ChunkSaveData, StoreError> {
        let path = self.path_for(chunk_id, level_name);
        if !path.is_file() {
            return Err(StoreError::Missing(chunk_id));
        }
        let mut bytes = Vec::new();
        fs::File::open(path)?.read_to_end(&mut bytes)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    fn save(
        &self,
        chunk_id: Coordinate,
        level_name: &str,
        data: &ChunkSaveData,
    ) -> Result<(), StoreError> {
        let path = self.path_for(chunk_id, level_name);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let bytes = bincode::serialize(data)?;
        fs::File::create(path)?.write_all(&bytes)?;
        Ok(())
    }
}

/// In-memory store for tests and the demo.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<FxHashMap<(String, Coordinate), ChunkSaveData>>,
}

impl ChunkStore for MemoryStore {
    fn exists(&self, chunk_id: Coordinate, level_name: &str) -> bool {
        self.map
            .lock()
            .contains_key(&(level_name.to_owned(), chunk_id))
    }

    fn load(&self, chunk_id: Coordinate, level_name: &str) -> Result<ChunkSaveData, StoreError> {
        self.map
            .lock()
            .get(&(level_name.to_owned(), chunk_id))
            .cloned()
            .ok_or(StoreError::Missing(chunk_id))
    }

    fn save(
        &self,
        chunk_id: Coordinate,
        level_name: &str,
        data: &ChunkSaveData,
    ) -> Result<(), StoreError> {
        self.map
            .lock()
            .insert((level_name.to_owned(), chunk_id), data.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChunkSaveData {
        ChunkSaveData {
            voxels: Some(vec![0, 1, 2, 0, 3]),
            solid_count: 3,
        }
    }

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let id = Coordinate::new(4, -2, 7);

        assert!(!store.exists(id, "testlevel"));
        store.save(id, "testlevel", &sample()).unwrap();
        assert!(store.exists(id, "testlevel"));
        assert_eq!(store.load(id, "testlevel").unwrap(), sample());
    }

    #[test]
    fn file_store_sanitizes_level_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let id = Coordinate::new(0, 0, 0);
        store.save(id, "no man's / land", &sample()).unwrap();
        assert!(store.exists(id, "no man's / land"));
    }

    #[test]
    fn memory_store_misses_cleanly() {
        let store = MemoryStore::default();
        let err = store.load(Coordinate::new(1, 1, 1), "x").unwrap_err();
        assert!(matches!(err, StoreError::Missing(_)));
    }
}
