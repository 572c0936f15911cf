//! Disk-backed backend: serves files straight off a host directory.

use std::io::{Read as _, Seek as _, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::entry::{Entry, EntryError};
use crate::fcache::{FileCache, NodeId};
use crate::path::FsPath;

use super::Backend;

/// An entry reading a host file at an offset on every call.
///
/// The file is opened per read rather than held open, so the entry carries
/// no cursor and no descriptor lifetime of its own.
pub struct DiskEntry {
    host_path: PathBuf,
}

impl DiskEntry {
    pub fn new(host_path: impl Into<PathBuf>) -> Self {
        Self {
            host_path: host_path.into(),
        }
    }
}

impl Entry for DiskEntry {
    fn read(&self, offset: u64, size: usize) -> Result<Bytes, EntryError> {
        let mut file = std::fs::File::open(&self.host_path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; size];
        let n = file.read(&mut buf)?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }
}

/// The static-files backend: a cache miss is resolved by probing the path
/// under a host root directory.
pub struct DiskBackend {
    root: PathBuf,
}

impl DiskBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Backend for DiskBackend {
    fn load(&mut self, cache: &mut FileCache, path: &FsPath) -> Option<NodeId> {
        // Canonical keys carry no leading slash or dot segments, so joining
        // under the root cannot escape it.
        let host = self.root.join(path.full());
        if !host.is_file() {
            debug!(path = path.full(), "no such file under host root");
            return None;
        }
        match cache.insert_at(Arc::new(DiskEntry::new(host)), path.clone()) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(path = path.full(), error = %e, "disk load could not insert");
                None
            }
        }
    }
}
