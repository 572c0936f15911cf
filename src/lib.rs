//! Core of a userspace filesystem server.
//!
//! Exposes a backing data source to clients through an open/read/close
//! request protocol, while keeping an in-memory cache of path-to-entry
//! mappings shaped as a tree mirroring the hierarchy. Backends plug in
//! through two hooks (load-on-miss and refresh-on-hit), so static files
//! and dynamically generated views share one caching and eviction engine.
//!
//! The transport delivering requests and the cross-address-space copy
//! primitive are collaborators behind the [`ipc`] traits; in-process
//! implementations for testing and demos live in [`ipc::inproc`].

#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod entry;
pub mod fcache;
pub mod ipc;
pub mod path;
pub mod proto;
pub mod server;
pub mod trc;

pub use backend::Backend;
pub use entry::{Entry, EntryError};
pub use fcache::{FileCache, FileNode, InsertError, NodeId};
pub use path::{FsPath, PathError, MAX_PATH_LEN};
pub use proto::{Action, Message, Pid, Status};
pub use server::{FileServer, ServeError, READ_CHUNK};
