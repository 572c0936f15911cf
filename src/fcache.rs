//! The file cache tree: a hierarchy of cached entries plus a flat path index.
//!
//! Nodes live in an arena keyed by stable [`NodeId`]s. Parents hold their
//! children's ids in creation order; children hold a plain back-reference to
//! their parent, so navigation is O(1) both directions with no ownership
//! cycles. The flat index maps canonical path keys to node ids for O(1)
//! lookup without walking the tree, and is kept mutually consistent with the
//! hierarchy at all times.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{trace, warn};

use crate::entry::Entry;
use crate::path::{FsPath, PathError};

/// Stable identifier of a node in the cache tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

/// Monotonically increasing node id allocator.
struct NodeFactory {
    next: u64,
}

impl NodeFactory {
    fn new(start: u64) -> Self {
        Self { next: start }
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Error)]
pub enum InsertError {
    /// The path is already present in the index. Callers must insert only on
    /// a confirmed miss; silently shadowing the previous mapping would leave
    /// the old node reachable from its parent but unreachable through the
    /// index, where the eviction sweep could never account for it.
    #[error("path already cached: {0}")]
    AlreadyCached(String),

    #[error(transparent)]
    InvalidPath(#[from] PathError),
}

/// One node in the cache tree.
///
/// `entry` and `path` are absent only on the synthetic root.
pub struct FileNode {
    entry: Option<Arc<dyn Entry>>,
    path: Option<FsPath>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    rc: u64,
}

impl FileNode {
    pub fn entry(&self) -> Option<&Arc<dyn Entry>> {
        self.entry.as_ref()
    }

    pub fn path(&self) -> Option<&FsPath> {
        self.path.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child ids in creation order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of outstanding open handles referencing this node.
    pub fn rc(&self) -> u64 {
        self.rc
    }
}

/// The cache tree engine.
///
/// Owns the node arena, the synthetic root, and the flat path index. One
/// instance exists per filesystem server, constructed at startup and mutated
/// only from the single request-processing loop.
pub struct FileCache {
    nodes: HashMap<NodeId, FileNode>,
    index: HashMap<String, NodeId>,
    factory: NodeFactory,
    root: NodeId,
}

impl FileCache {
    /// Create a cache containing only the synthetic root.
    ///
    /// The root has no entry and no path, and its rc starts at 1 so the
    /// normal close/sweep path can never reclaim it.
    #[must_use]
    pub fn new() -> Self {
        let mut factory = NodeFactory::new(1);
        let root = factory.allocate();

        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            FileNode {
                entry: None,
                path: None,
                parent: None,
                children: Vec::new(),
                rc: 1,
            },
        );

        Self {
            nodes,
            index: HashMap::new(),
            factory,
            root,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&FileNode> {
        self.nodes.get(&id)
    }

    /// Number of nodes in the arena, the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate over `(path key, node id)` pairs in the flat index.
    pub fn paths(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.index.iter().map(|(k, id)| (k.as_str(), *id))
    }

    // ── Insertion ───────────────────────────────────────────────────────

    /// Parse `path` and insert `entry` under it. See [`FileCache::insert_at`].
    pub fn insert(&mut self, entry: Arc<dyn Entry>, path: &str) -> Result<NodeId, InsertError> {
        let path = FsPath::parse(path)?;
        self.insert_at(entry, path)
    }

    /// Insert `entry` at an already-parsed `path`.
    ///
    /// The parent node is resolved by looking up `path.parent()` in the
    /// index; if the parent key is absent or not cached, the new node hangs
    /// directly off the root. The child is appended to its parent in
    /// creation order and the index gains the `full() -> node` mapping.
    pub fn insert_at(&mut self, entry: Arc<dyn Entry>, path: FsPath) -> Result<NodeId, InsertError> {
        if self.index.contains_key(path.full()) {
            return Err(InsertError::AlreadyCached(path.full().to_owned()));
        }

        let parent = path
            .parent()
            .and_then(|key| self.index.get(key).copied())
            .unwrap_or(self.root);

        let id = self.factory.allocate();
        self.index.insert(path.full().to_owned(), id);
        self.nodes.insert(
            id,
            FileNode {
                entry: Some(entry),
                path: Some(path),
                parent: Some(parent),
                children: Vec::new(),
                rc: 0,
            },
        );

        let parent_node = self
            .nodes
            .get_mut(&parent)
            .unwrap_or_else(|| unreachable!("parent resolved from index or root must exist"));
        parent_node.children.push(id);

        trace!(node = id.0, parent = parent.0, "inserted cache node");
        Ok(id)
    }

    /// Replace the backing entry of a live node in place.
    ///
    /// Used by dynamic backends to refresh the content of a node that
    /// survived a rebuild because a caller still holds it open.
    pub fn replace_entry(&mut self, id: NodeId, entry: Arc<dyn Entry>) {
        match self.nodes.get_mut(&id) {
            Some(node) if node.path.is_some() => node.entry = Some(entry),
            Some(_) => warn!(node = id.0, "refusing to attach an entry to the root"),
            None => warn!(node = id.0, "replace_entry on unknown node"),
        }
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    /// Raw flat-index lookup. No refresh hook fires here; the hook-aware
    /// find is composed by the server, which consults the backend on a hit.
    pub fn lookup(&self, path: &FsPath) -> Option<NodeId> {
        self.lookup_key(path.full())
    }

    /// Raw flat-index lookup by canonical key.
    pub fn lookup_key(&self, key: &str) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    // ── Reference counting ──────────────────────────────────────────────

    /// Increment rc, refusing ids not in the arena.
    ///
    /// Backend hooks are extension points and may hand back a stale id;
    /// that is logged and ignored rather than allowed to pin nothing.
    pub fn inc_rc(&mut self, id: NodeId) -> u64 {
        let Some(node) = self.nodes.get_mut(&id) else {
            warn!(node = id.0, "inc_rc on unknown node");
            return 0;
        };
        node.rc += 1;
        node.rc
    }

    /// Decrement rc, refusing to go below zero.
    ///
    /// A decrement without a matching increment is an error in the caller;
    /// it is logged and ignored rather than allowed to underflow.
    pub fn dec_rc(&mut self, id: NodeId) -> u64 {
        let Some(node) = self.nodes.get_mut(&id) else {
            warn!(node = id.0, "dec_rc on unknown node");
            return 0;
        };
        if node.rc == 0 {
            warn!(node = id.0, "dec_rc on node with rc already zero");
            return 0;
        }
        node.rc -= 1;
        trace!(node = id.0, new_rc = node.rc, "decremented rc");
        node.rc
    }

    // ── Eviction ────────────────────────────────────────────────────────

    /// Post-order eviction sweep.
    ///
    /// Starting from `from` (the root when `None`), children are swept
    /// before their parents. A node is reclaimed only when its rc is zero
    /// and every child has already been reclaimed; a surviving child
    /// therefore keeps its whole ancestor chain alive. The root is never
    /// reclaimed. Safe to invoke at any idle point, repeatedly.
    pub fn clear(&mut self, from: Option<NodeId>) {
        let start = from.unwrap_or(self.root);
        if !self.nodes.contains_key(&start) {
            warn!(node = start.0, "clear from unknown node");
            return;
        }
        self.sweep(start);
    }

    fn sweep(&mut self, id: NodeId) {
        let children = self
            .nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for child in children {
            self.sweep(child);
        }

        if id == self.root {
            return;
        }
        let removable = self
            .nodes
            .get(&id)
            .is_some_and(|n| n.rc == 0 && n.children.is_empty());
        if !removable {
            return;
        }

        let node = self
            .nodes
            .remove(&id)
            .unwrap_or_else(|| unreachable!("sweep visited a node that exists"));
        if let Some(parent) = node.parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.retain(|c| *c != id);
            }
        }
        if let Some(path) = node.path {
            self.index.remove(path.full());
            trace!(node = id.0, path = path.full(), "evicted cache node");
        }
    }
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new()
    }
}
