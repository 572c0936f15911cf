#![allow(dead_code, missing_docs, clippy::unwrap_used)]

use srvfs::backend::Backend;
use srvfs::ipc::inproc::{SharedArena, DATA_ADDR, PATH_ADDR};
use srvfs::ipc::{MemAccess as _, MountError, Transport, TransportError};
use srvfs::proto::{Action, Message, Pid};
use srvfs::server::FileServer;

/// Pid the harness client is known as.
pub const PID: Pid = 7;

/// Byte size of the harness client's region.
pub const REGION: usize = 4096;

/// A transport for driving handlers directly through `dispatch`.
pub struct NullTransport;

impl Transport for NullTransport {
    fn receive(&mut self) -> Result<Message, TransportError> {
        Err(TransportError::Disconnected)
    }

    fn respond(&mut self, _reply: Message) -> Result<(), TransportError> {
        Ok(())
    }

    fn mount(&mut self, _mount_path: &str) -> Result<(), MountError> {
        Ok(())
    }
}

/// A server over the given backend plus the arena acting as its memory port.
pub fn harness<B: Backend>(backend: B) -> (FileServer<B, NullTransport, SharedArena>, SharedArena) {
    let arena = SharedArena::new();
    arena.register(PID, REGION);
    let server = FileServer::new("/t", backend, NullTransport, arena.clone());
    (server, arena)
}

/// Stage `path` in the client region and dispatch an Open.
pub fn open<B: Backend>(
    server: &mut FileServer<B, NullTransport, SharedArena>,
    arena: &SharedArena,
    path: &str,
) -> Message {
    let mut staged = path.as_bytes().to_vec();
    staged.push(0);
    arena.clone().copy_to(PID, PATH_ADDR, &staged).unwrap();

    let mut msg = Message::request(PID, Action::Open);
    msg.buffer = PATH_ADDR;
    server.dispatch(&msg)
}

/// Dispatch a Read, returning the reply and the bytes that landed in the
/// client region.
pub fn read<B: Backend>(
    server: &mut FileServer<B, NullTransport, SharedArena>,
    arena: &SharedArena,
    ident: u64,
    size: u32,
    offset: u64,
) -> (Message, Vec<u8>) {
    let mut msg = Message::request(PID, Action::Read);
    msg.buffer = DATA_ADDR;
    msg.size = size;
    msg.offset = offset;
    msg.ident = ident;
    let reply = server.dispatch(&msg);
    let data = arena.peek(PID, DATA_ADDR, reply.size as usize);
    (reply, data)
}

/// Dispatch a Close for `ident`.
pub fn close<B: Backend>(
    server: &mut FileServer<B, NullTransport, SharedArena>,
    ident: u64,
) -> Message {
    let mut msg = Message::request(PID, Action::Close);
    msg.ident = ident;
    server.dispatch(&msg)
}
