//! Dynamic backend regenerating its subtree from a live data source.
//!
//! A [`SnapshotBackend`] never trusts the cache: both hooks rebuild the whole
//! visible subtree from a fresh snapshot before answering, trading caching
//! efficiency for always-current content. This is the pattern for views whose
//! backing data changes out-of-band, such as a process listing.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::entry::MemEntry;
use crate::fcache::{FileCache, NodeId};
use crate::path::FsPath;

use super::Backend;

/// A source of point-in-time records for a dynamic subtree.
pub trait Snapshot {
    /// Enumerate the current records as `(name, content)` pairs. Names are
    /// single path segments relative to the backend's prefix.
    fn snapshot(&mut self) -> Vec<(String, Bytes)>;
}

/// A backend publishing a [`Snapshot`] source under a path prefix.
pub struct SnapshotBackend<S> {
    prefix: FsPath,
    source: S,
}

impl<S: Snapshot> SnapshotBackend<S> {
    /// `prefix` is the directory key the records appear under, e.g. `proc`.
    ///
    /// # Panics
    /// Panics if `prefix` is not a valid path; the prefix is
    /// program-supplied, never caller-supplied.
    #[must_use]
    pub fn new(prefix: &str, source: S) -> Self {
        let prefix = FsPath::parse(prefix)
            .unwrap_or_else(|e| panic!("invalid snapshot prefix {prefix:?}: {e}"));
        Self { prefix, source }
    }

    /// Discard the unreferenced part of the subtree and repopulate it from a
    /// fresh snapshot. Nodes held open by a caller survive the sweep and get
    /// their content replaced in place instead.
    fn rebuild(&mut self, cache: &mut FileCache) {
        if let Some(dir) = cache.lookup(&self.prefix) {
            cache.clear(Some(dir));
        }

        if cache.lookup(&self.prefix).is_none() {
            if let Err(e) = cache.insert_at(Arc::new(MemEntry::empty()), self.prefix.clone()) {
                warn!(prefix = self.prefix.full(), error = %e, "could not anchor snapshot dir");
                return;
            }
        }

        let records = self.source.snapshot();
        debug!(
            prefix = self.prefix.full(),
            records = records.len(),
            "rebuilding snapshot subtree"
        );
        for (name, data) in records {
            let full = format!("{}/{}", self.prefix.full(), name);
            let path = match FsPath::parse(&full) {
                Ok(p) => p,
                Err(e) => {
                    warn!(name, error = %e, "skipping snapshot record with bad name");
                    continue;
                }
            };
            let entry = Arc::new(MemEntry::new(data));
            match cache.lookup(&path) {
                // A surviving open node: refresh its content in place.
                Some(id) => cache.replace_entry(id, entry),
                None => {
                    if let Err(e) = cache.insert_at(entry, path) {
                        warn!(name, error = %e, "could not insert snapshot record");
                    }
                }
            }
        }
    }

    fn covers(&self, key: &str) -> bool {
        key == self.prefix.full()
            || key
                .strip_prefix(self.prefix.full())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl<S: Snapshot> Backend for SnapshotBackend<S> {
    fn cache_hit(&mut self, cache: &mut FileCache, hit: NodeId) -> Option<NodeId> {
        let key = cache.node(hit)?.path()?.full().to_owned();
        if !self.covers(&key) {
            return Some(hit);
        }
        self.rebuild(cache);
        // The hit may have been evicted and recreated, or may be gone from
        // the fresh snapshot entirely; resolve it again by key.
        cache.lookup_key(&key)
    }

    fn load(&mut self, cache: &mut FileCache, path: &FsPath) -> Option<NodeId> {
        if !self.covers(path.full()) {
            return None;
        }
        // A record can exist in the source without ever having been cached.
        self.rebuild(cache);
        cache.lookup(path)
    }
}

/// Snapshot of live process ids, one record per process.
///
/// Each record is named by the pid and contains the command name, newline
/// terminated.
#[cfg(target_os = "linux")]
pub struct ProcSnapshot;

#[cfg(target_os = "linux")]
impl Snapshot for ProcSnapshot {
    fn snapshot(&mut self) -> Vec<(String, Bytes)> {
        let mut records = Vec::new();
        let Ok(dir) = std::fs::read_dir("/proc") else {
            return records;
        };
        for dent in dir.flatten() {
            let name = dent.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let comm = std::fs::read_to_string(format!("/proc/{name}/comm"))
                .unwrap_or_default();
            let mut line = comm.trim_end().to_owned();
            line.push('\n');
            records.push((name.to_owned(), Bytes::from(line)));
        }
        records
    }
}
