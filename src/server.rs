//! The filesystem server: protocol handlers over the cache tree.
//!
//! One request is processed to completion at a time; the cache needs no
//! locking because nothing else ever touches it. The two blocking points are
//! the memory-port copies and the backend load hook, and a blocked load
//! blocks the whole server. That is the single-threaded model's accepted
//! cost, not something handled here.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::backend::Backend;
use crate::fcache::{FileCache, NodeId};
use crate::ipc::{MemAccess, MountError, Transport, TransportError};
use crate::path::{FsPath, MAX_PATH_LEN};
use crate::proto::{Action, Message, Status};

/// Server-side bounce buffer bound: a single Read moves at most this many
/// bytes regardless of the requested size.
pub const READ_CHUNK: usize = 1024;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("mount handshake failed: {0}")]
    Mount(#[from] MountError),
}

/// Monotonically increasing handle allocator.
struct HandleFactory {
    next: u64,
}

impl HandleFactory {
    fn new() -> Self {
        Self { next: 1 }
    }

    fn allocate(&mut self) -> u64 {
        let h = self.next;
        self.next += 1;
        h
    }
}

/// A filesystem server instance.
///
/// Owns the cache tree, a backend supplying the load and refresh hooks, the
/// transport, the memory port, and the live-handle table. Handles given to
/// callers are opaque ids minted here, never node references; Read and Close
/// resolve them through the table and reject anything stale or forged with
/// [`Status::BadHandle`].
pub struct FileServer<B, T, M> {
    cache: FileCache,
    backend: B,
    transport: T,
    mem: M,
    handles: HashMap<u64, NodeId>,
    handle_factory: HandleFactory,
    mount_path: String,
}

impl<B: Backend, T: Transport, M: MemAccess> FileServer<B, T, M> {
    pub fn new(mount_path: impl Into<String>, backend: B, transport: T, mem: M) -> Self {
        Self {
            cache: FileCache::new(),
            backend,
            transport,
            mem,
            handles: HashMap::new(),
            handle_factory: HandleFactory::new(),
            mount_path: mount_path.into(),
        }
    }

    /// The cache tree, e.g. for pre-populating entries before serving.
    pub fn cache_mut(&mut self) -> &mut FileCache {
        &mut self.cache
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run the eviction sweep over the whole tree.
    ///
    /// Closing a handle only makes a node evictable; reclamation happens
    /// here, at whatever idle point the embedder picks.
    pub fn sweep(&mut self) {
        self.cache.clear(None);
    }

    /// Mount, then serve until the transport disconnects.
    ///
    /// Per-request failures become reply statuses and never end the loop;
    /// the failed mount handshake is the only fatal outcome.
    pub fn run(&mut self) -> Result<(), ServeError> {
        self.transport.mount(&self.mount_path)?;
        info!(mount = %self.mount_path, "filesystem mounted, serving");

        loop {
            let msg = match self.transport.receive() {
                Ok(msg) => msg,
                Err(TransportError::Disconnected) => {
                    debug!("transport disconnected, stopping");
                    return Ok(());
                }
            };
            let reply = self.dispatch(&msg);
            if let Err(TransportError::Disconnected) = self.transport.respond(reply) {
                debug!("peer gone before reply, stopping");
                return Ok(());
            }
        }
    }

    /// Handle one request, producing its reply.
    pub fn dispatch(&mut self, msg: &Message) -> Message {
        match msg.action {
            Action::Open => self.open(msg),
            Action::Read => self.read(msg),
            Action::Close => self.close(msg),
            Action::Mount => {
                // Mounts go to the routing service, not to a filesystem.
                warn!(from = msg.from, "mount request sent to a filesystem");
                reply(msg, Status::InvalidPath)
            }
        }
    }

    // ── Handlers ────────────────────────────────────────────────────────

    fn open(&mut self, msg: &Message) -> Message {
        let mut buf = [0u8; MAX_PATH_LEN];
        let copied = match self.mem.copy_from(msg.from, msg.buffer, &mut buf) {
            Ok(n) if n > 0 => n,
            Ok(_) => return reply(msg, Status::AccessDenied),
            Err(e) => {
                debug!(from = msg.from, error = %e, "open: path copy failed");
                return reply(msg, Status::AccessDenied);
            }
        };

        // The caller's path is NUL-terminated inside the copied window. No
        // terminator means the path kept going, past the length limit or
        // past the caller's mapped region; either way, serving the prefix
        // would be a silent truncation, so reject it.
        let raw = &buf[..copied];
        let Some(n) = raw.iter().position(|b| *b == 0) else {
            debug!(from = msg.from, "open: path not terminated inside the copy window");
            return reply(msg, Status::InvalidPath);
        };
        let raw = &raw[..n];
        let Ok(text) = std::str::from_utf8(raw) else {
            debug!(from = msg.from, "open: path is not utf-8");
            return reply(msg, Status::InvalidPath);
        };

        let path = match FsPath::parse(text) {
            Ok(path) => path,
            Err(e) => {
                debug!(from = msg.from, path = text, error = %e, "open: bad path");
                return reply(msg, Status::from(&e));
            }
        };

        // Flat lookup; the refresh hook arbitrates every hit and may demote
        // it to a miss, which then consults the load hook.
        let hit = match self.cache.lookup(&path) {
            Some(id) => self.backend.cache_hit(&mut self.cache, id),
            None => None,
        };
        let node = hit.or_else(|| self.backend.load(&mut self.cache, &path));

        // The hooks are extension points; never mint a handle for an id
        // that is not a readable node in the arena.
        let node = node.filter(|id| {
            let servable = self
                .cache
                .node(*id)
                .is_some_and(|n| n.entry().is_some());
            if !servable {
                warn!(path = path.full(), "backend returned an unservable node");
            }
            servable
        });

        match node {
            Some(id) => {
                let rc = self.cache.inc_rc(id);
                let handle = self.handle_factory.allocate();
                self.handles.insert(handle, id);
                trace!(path = path.full(), handle, rc, "opened");
                let mut rep = reply(msg, Status::Ok);
                rep.ident = handle;
                rep
            }
            None => {
                trace!(path = path.full(), "open: not found");
                reply(msg, Status::NotFound)
            }
        }
    }

    fn read(&mut self, msg: &Message) -> Message {
        let Some(&id) = self.handles.get(&msg.ident) else {
            warn!(ident = msg.ident, from = msg.from, "read on dead handle");
            return reply(msg, Status::BadHandle);
        };

        // Live handles pin their node (rc > 0), so the node and its entry
        // are still in the arena.
        let entry = self
            .cache
            .node(id)
            .and_then(|n| n.entry())
            .unwrap_or_else(|| unreachable!("live handle {} maps to node without entry", msg.ident))
            .clone();

        let want = (msg.size as usize).min(READ_CHUNK);
        let data = match entry.read(msg.offset, want) {
            Ok(data) => data,
            Err(e) => {
                debug!(ident = msg.ident, error = %e, "entry read failed");
                return reply(msg, Status::from(&e));
            }
        };
        if data.is_empty() {
            return reply(msg, Status::EndOfData);
        }

        let n = data.len().min(msg.size as usize);
        match self.mem.copy_to(msg.from, msg.buffer, &data[..n]) {
            Ok(copied) => {
                trace!(ident = msg.ident, offset = msg.offset, copied, "read");
                let mut rep = reply(msg, Status::Ok);
                rep.size = copied as u32;
                rep
            }
            Err(e) => {
                debug!(from = msg.from, error = %e, "read: data copy failed");
                reply(msg, Status::AccessDenied)
            }
        }
    }

    fn close(&mut self, msg: &Message) -> Message {
        match self.handles.remove(&msg.ident) {
            Some(id) => {
                let rc = self.cache.dec_rc(id);
                trace!(ident = msg.ident, rc, "closed");
                reply(msg, Status::Ok)
            }
            None => {
                warn!(ident = msg.ident, from = msg.from, "close on dead handle");
                reply(msg, Status::BadHandle)
            }
        }
    }
}

/// A reply mirroring `msg` with the outcome fields overwritten.
fn reply(msg: &Message, status: Status) -> Message {
    Message {
        status,
        size: 0,
        ..*msg
    }
}
