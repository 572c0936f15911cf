//! Pluggable storage backends.
//!
//! A backend customizes two points of the caching engine: what happens on a
//! cache hit (the refresh hook) and what happens on a cache miss (the load
//! hook). The server holds a backend by composition; there is no subclassing
//! of the server itself.

mod disk;
mod mem;
mod snapshot;

pub use disk::{DiskBackend, DiskEntry};
pub use mem::MemBackend;
#[cfg(target_os = "linux")]
pub use snapshot::ProcSnapshot;
pub use snapshot::{Snapshot, SnapshotBackend};

use crate::fcache::{FileCache, NodeId};
use crate::path::FsPath;

/// Backend-overridable hooks shared by every storage backend.
pub trait Backend {
    /// Refresh hook, invoked on every successful flat lookup.
    ///
    /// The returned node is what the caller gets: the hit itself, some other
    /// node, or `None` to reject the hit entirely, in which case the caller
    /// proceeds as if nothing were cached and consults [`Backend::load`].
    /// Dynamic backends override this to rebuild their subtree instead of
    /// trusting cached state. Default: identity.
    fn cache_hit(&mut self, _cache: &mut FileCache, hit: NodeId) -> Option<NodeId> {
        Some(hit)
    }

    /// Load hook, invoked on a cache miss.
    ///
    /// Attempts to produce an entry for `path` from the underlying source,
    /// registering it via [`FileCache::insert_at`] and returning the inserted
    /// node. May block on real I/O. Default: `None` (pure-cache filesystem
    /// with no backing store).
    fn load(&mut self, _cache: &mut FileCache, _path: &FsPath) -> Option<NodeId> {
        None
    }
}

/// The pure-cache backend: identity refresh, no backing store.
///
/// Serves only what was inserted into the cache out of band.
pub struct CacheOnly;

impl Backend for CacheOnly {}
