//! Wire messages for the request/reply protocol.
//!
//! One message shape services every action; the action tag selects which
//! fields are meaningful. Requests and replies share the shape, so a handler
//! answers by copying the request and overwriting the outcome fields.

use serde::{Deserialize, Serialize};

use crate::entry::EntryError;
use crate::path::PathError;

/// Process identity of a caller, as reported by the transport. The memory
/// port uses it to address the right process's buffers.
pub type Pid = u32;

/// What a message asks for (or, on the server's own startup, announces).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Open a path. `buffer` addresses the path string in the caller.
    Open,
    /// Read from an open handle. `buffer` addresses the destination,
    /// `size` and `offset` select the range, `ident` is the handle.
    Read,
    /// Close an open handle (`ident`).
    Close,
    /// Mount handshake, sent by the server to the routing service.
    Mount,
}

/// Outcome code carried on every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ok,
    /// A cross-address-space copy failed.
    AccessDenied,
    /// Path parsing failed: empty, malformed, or over the length limit.
    InvalidPath,
    /// No cached or loadable entry exists at the path.
    NotFound,
    /// The handle is not in the live-handle table: stale, forged, or
    /// already closed.
    BadHandle,
    /// The backing entry has no more bytes at the offset. Zero bytes were
    /// transferred; not fatal.
    EndOfData,
    /// A backing-entry error, passed through to the caller.
    Io,
}

/// The single request/reply message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender identity, filled in by the transport.
    pub from: Pid,
    pub action: Action,
    /// Outcome; meaningful on replies only.
    pub status: Status,
    /// Caller-space address: path string for Open, data sink for Read.
    pub buffer: u64,
    /// Requested byte count on a Read request; actual bytes transferred on
    /// a reply.
    pub size: u32,
    /// Byte offset into the entry for Read.
    pub offset: u64,
    /// Opaque handle: set by the server on Open's reply, echoed by the
    /// caller on Read/Close.
    pub ident: u64,
}

impl Message {
    /// A request with outcome and payload fields zeroed.
    #[must_use]
    pub fn request(from: Pid, action: Action) -> Self {
        Self {
            from,
            action,
            status: Status::Ok,
            buffer: 0,
            size: 0,
            offset: 0,
            ident: 0,
        }
    }
}

impl From<&PathError> for Status {
    fn from(_: &PathError) -> Self {
        Status::InvalidPath
    }
}

impl From<&EntryError> for Status {
    fn from(_: &EntryError) -> Self {
        Status::Io
    }
}
