//! Object resource cache.
//!
//! Maps a host object's stable id to the renderer resources built for it, so
//! an object instanced N times is flattened and uploaded once. The cache
//! lives as long as one resource generation: it is cleared whenever the
//! session resets the scene.

use std::collections::HashMap;

use crate::error::BridgeError;
use crate::renderer::{MaterialHandle, MeshHandle};
use crate::scene::ObjectId;

/// Renderer resources for one source object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub mesh: MeshHandle,
    /// One handle per mesh part material slot, indexed by slot.
    pub materials: Vec<MaterialHandle>,
}

/// Cached outcome for an object id.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Built(ObjectRecord),
    /// Nothing to render (no triangles, no materials, or fully invisible).
    Skipped,
}

#[derive(Debug, Default)]
pub struct ResourceCache {
    entries: HashMap<ObjectId, Entry>,
    builds: usize,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the record for `id`, invoking `build` only on a miss.
    ///
    /// `build` returns `Ok(None)` when the object produces no geometry;
    /// that outcome is cached too, so later instances skip without
    /// rebuilding. Errors are not cached.
    pub fn lookup_or_create<F>(
        &mut self,
        id: ObjectId,
        build: F,
    ) -> Result<Option<&ObjectRecord>, BridgeError>
    where
        F: FnOnce() -> Result<Option<ObjectRecord>, BridgeError>,
    {
        if !self.entries.contains_key(&id) {
            let entry = match build()? {
                Some(record) => Entry::Built(record),
                None => Entry::Skipped,
            };
            self.builds += 1;
            self.entries.insert(id, entry);
        }

        Ok(match self.entries.get(&id) {
            Some(Entry::Built(record)) => Some(record),
            _ => None,
        })
    }

    pub fn get(&self, id: ObjectId) -> Option<&ObjectRecord> {
        match self.entries.get(&id) {
            Some(Entry::Built(record)) => Some(record),
            _ => None,
        }
    }

    /// Number of objects built (including skipped ones).
    pub fn build_count(&self) -> usize {
        self.builds
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.builds = 0;
    }
}
