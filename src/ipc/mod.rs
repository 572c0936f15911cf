//! Collaborator interfaces: message transport and cross-address-space copy.
//!
//! The core never owns a socket or a page table. It speaks to two traits:
//! a [`Transport`] that delivers requests and carries replies (including the
//! one-shot mount handshake with the routing service), and a [`MemAccess`]
//! port that moves bytes between this process and a caller's address space.
//! Concrete implementations are a deployment concern; the in-process pair in
//! [`inproc`] backs tests and the demo binary.

pub mod inproc;

use thiserror::Error;

use crate::proto::{Message, Pid};

#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer is gone; the serve loop ends cleanly on this.
    #[error("transport disconnected")]
    Disconnected,
}

/// Mount-handshake failure. The only fatal error in the server: a filesystem
/// that cannot announce itself to the routing service must not serve.
/// Retrying is the collaborator's concern, not handled here.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("mount of {0:?} rejected by routing service")]
    Rejected(String),

    #[error("routing service unreachable")]
    Unreachable,
}

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("bad address {addr:#x} in process {pid}")]
    BadAddress { pid: Pid, addr: u64 },
}

/// Request delivery and reply dispatch.
pub trait Transport {
    /// Block until the next request arrives.
    fn receive(&mut self) -> Result<Message, TransportError>;

    /// Deliver a reply to the sender of the last received request.
    fn respond(&mut self, reply: Message) -> Result<(), TransportError>;

    /// Announce `mount_path` to the routing service and block for its
    /// acknowledgement.
    fn mount(&mut self, mount_path: &str) -> Result<(), MountError>;
}

/// The cross-address-space copy primitive.
///
/// Both directions report how many bytes actually moved; partial copies at
/// the end of a mapped region are success, unmapped addresses are failure.
pub trait MemAccess {
    /// Copy bytes out of process `from` at `addr` into `buf`.
    fn copy_from(&mut self, from: Pid, addr: u64, buf: &mut [u8]) -> Result<usize, CopyError>;

    /// Copy `data` into process `to` at `addr`.
    fn copy_to(&mut self, to: Pid, addr: u64, data: &[u8]) -> Result<usize, CopyError>;
}
