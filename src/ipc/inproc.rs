//! In-process transport and memory port.
//!
//! A request/reply channel pair plus a shared byte arena standing in for
//! caller address spaces. This is what the integration tests and the demo
//! binary run on; a real deployment substitutes its own [`Transport`] and
//! [`MemAccess`] implementations without touching the core.

use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::proto::{Action, Message, Pid};

use super::{CopyError, MemAccess, MountError, Transport, TransportError};

/// Caller-space address where [`ClientEnd::open`] places the path string.
pub const PATH_ADDR: u64 = 0;

/// Caller-space address where [`ClientEnd::read`] receives data.
pub const DATA_ADDR: u64 = 256;

/// Per-pid byte regions simulating distinct address spaces.
///
/// Cloning shares the underlying regions, so the server's port and every
/// client observe the same memory.
#[derive(Clone, Default)]
pub struct SharedArena {
    regions: Arc<Mutex<HashMap<Pid, Vec<u8>>>>,
}

impl SharedArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `pid` a zero-filled region of `capacity` bytes.
    pub fn register(&self, pid: Pid, capacity: usize) {
        self.regions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(pid, vec![0; capacity]);
    }

    /// Read `len` bytes of `pid`'s region at `addr` (clamped to the region).
    #[must_use]
    pub fn peek(&self, pid: Pid, addr: u64, len: usize) -> Vec<u8> {
        let regions = self
            .regions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(region) = regions.get(&pid) else {
            return Vec::new();
        };
        let Ok(start) = usize::try_from(addr) else {
            return Vec::new();
        };
        if start >= region.len() {
            return Vec::new();
        }
        let end = start.saturating_add(len).min(region.len());
        region[start..end].to_vec()
    }
}

impl MemAccess for SharedArena {
    fn copy_from(&mut self, from: Pid, addr: u64, buf: &mut [u8]) -> Result<usize, CopyError> {
        let regions = self
            .regions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let region = regions
            .get(&from)
            .ok_or(CopyError::BadAddress { pid: from, addr })?;
        let start = usize::try_from(addr)
            .ok()
            .filter(|s| *s < region.len())
            .ok_or(CopyError::BadAddress { pid: from, addr })?;
        let n = buf.len().min(region.len() - start);
        buf[..n].copy_from_slice(&region[start..start + n]);
        Ok(n)
    }

    fn copy_to(&mut self, to: Pid, addr: u64, data: &[u8]) -> Result<usize, CopyError> {
        let mut regions = self
            .regions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let region = regions
            .get_mut(&to)
            .ok_or(CopyError::BadAddress { pid: to, addr })?;
        let start = usize::try_from(addr)
            .ok()
            .filter(|s| *s < region.len())
            .ok_or(CopyError::BadAddress { pid: to, addr })?;
        let n = data.len().min(region.len() - start);
        region[start..start + n].copy_from_slice(&data[..n]);
        Ok(n)
    }
}

/// Server half of an in-process request/reply pair.
pub struct ServerEnd {
    rx: Receiver<Message>,
    tx: Sender<Message>,
}

impl Transport for ServerEnd {
    fn receive(&mut self) -> Result<Message, TransportError> {
        self.rx.recv().map_err(|_| TransportError::Disconnected)
    }

    fn respond(&mut self, reply: Message) -> Result<(), TransportError> {
        self.tx
            .send(reply)
            .map_err(|_| TransportError::Disconnected)
    }

    fn mount(&mut self, mount_path: &str) -> Result<(), MountError> {
        // The in-process router accepts every mount unconditionally.
        debug!(mount_path, "in-process mount accepted");
        Ok(())
    }
}

/// Client half: sends requests, blocks for replies, and stages its buffers
/// in the shared arena the way a real caller would stage its own memory.
pub struct ClientEnd {
    tx: Sender<Message>,
    rx: Receiver<Message>,
    pid: Pid,
    arena: SharedArena,
}

/// Build a connected transport pair for a client known as `pid`, giving it a
/// `region` byte address space in `arena`.
#[must_use]
pub fn pair(pid: Pid, arena: &SharedArena, region: usize) -> (ServerEnd, ClientEnd) {
    arena.register(pid, region);
    let (req_tx, req_rx) = channel();
    let (rep_tx, rep_rx) = channel();
    (
        ServerEnd {
            rx: req_rx,
            tx: rep_tx,
        },
        ClientEnd {
            tx: req_tx,
            rx: rep_rx,
            pid,
            arena: arena.clone(),
        },
    )
}

impl ClientEnd {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Send a raw request and block for the reply.
    pub fn call(&mut self, msg: Message) -> Result<Message, TransportError> {
        self.tx.send(msg).map_err(|_| TransportError::Disconnected)?;
        self.rx.recv().map_err(|_| TransportError::Disconnected)
    }

    /// Stage `path` (NUL-terminated) at [`PATH_ADDR`] and send an Open.
    pub fn open(&mut self, path: &str) -> Result<Message, TransportError> {
        let mut staged = path.as_bytes().to_vec();
        staged.push(0);
        // Staging into our own region cannot fail unless the region is
        // undersized, which open() surfaces as AccessDenied anyway.
        let _ = self.arena.copy_to(self.pid, PATH_ADDR, &staged);
        let mut msg = Message::request(self.pid, Action::Open);
        msg.buffer = PATH_ADDR;
        self.call(msg)
    }

    /// Send a Read for `size` bytes at `offset`, returning the reply and the
    /// bytes that landed in this client's region.
    pub fn read(
        &mut self,
        ident: u64,
        size: u32,
        offset: u64,
    ) -> Result<(Message, Vec<u8>), TransportError> {
        let mut msg = Message::request(self.pid, Action::Read);
        msg.buffer = DATA_ADDR;
        msg.size = size;
        msg.offset = offset;
        msg.ident = ident;
        let reply = self.call(msg)?;
        let data = self.arena.peek(self.pid, DATA_ADDR, reply.size as usize);
        Ok((reply, data))
    }

    /// Send a Close for `ident`.
    pub fn close(&mut self, ident: u64) -> Result<Message, TransportError> {
        let mut msg = Message::request(self.pid, Action::Close);
        msg.ident = ident;
        self.call(msg)
    }
}
