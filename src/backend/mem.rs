//! In-memory backend over a fixed set of byte buffers.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;

use crate::entry::MemEntry;
use crate::fcache::{FileCache, NodeId};
use crate::path::{FsPath, PathError};

use super::Backend;

/// A backend serving a fixed set of in-memory files.
///
/// Entries are loaded into the cache lazily, on first open.
#[derive(Default)]
pub struct MemBackend {
    files: HashMap<String, Bytes>,
}

impl MemBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file. `path` is normalized with the same rules as every
    /// caller-supplied path, so lookups for any spelling of it will match.
    pub fn add(&mut self, path: &str, data: impl Into<Bytes>) -> Result<(), PathError> {
        let path = FsPath::parse(path)?;
        self.files.insert(path.full().to_owned(), data.into());
        Ok(())
    }
}

impl Backend for MemBackend {
    fn load(&mut self, cache: &mut FileCache, path: &FsPath) -> Option<NodeId> {
        let data = self.files.get(path.full())?.clone();
        match cache.insert_at(Arc::new(MemEntry::new(data)), path.clone()) {
            Ok(id) => Some(id),
            Err(e) => {
                // Load fires only on a confirmed miss, so this is a bug in
                // the caller's find/load sequencing.
                warn!(path = path.full(), error = %e, "mem load could not insert");
                None
            }
        }
    }
}
