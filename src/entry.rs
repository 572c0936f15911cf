//! The readable object behind a cached path.

use bytes::Bytes;
use thiserror::Error;

/// Error produced by a backing entry during a read.
///
/// Entry errors are not interpreted by the server; they are folded into the
/// reply status verbatim and the request completes with zero bytes
/// transferred.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Backend(String),
}

/// A backing entry: the abstract readable object behind a cached path.
///
/// Reads are stateless. The offset is caller-supplied on every call and no
/// cursor is kept, so repeated reads at a fixed `(offset, size)` return
/// identical bytes for an unchanged entry.
pub trait Entry {
    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Returning an empty buffer signals end of data at that offset; it is
    /// not an error.
    fn read(&self, offset: u64, size: usize) -> Result<Bytes, EntryError>;
}

/// An entry backed by an in-memory byte buffer.
///
/// Used by the in-memory backend, by dynamic snapshot backends, and as the
/// placeholder entry for synthetic directory nodes.
pub struct MemEntry {
    data: Bytes,
}

impl MemEntry {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// An empty entry, used for nodes that exist only to anchor children.
    #[must_use]
    pub fn empty() -> Self {
        Self { data: Bytes::new() }
    }
}

impl Entry for MemEntry {
    fn read(&self, offset: u64, size: usize) -> Result<Bytes, EntryError> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(Bytes::new());
        };
        if start >= self.data.len() {
            return Ok(Bytes::new());
        }
        let end = start.saturating_add(size).min(self.data.len());
        Ok(self.data.slice(start..end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_within_bounds() {
        let e = MemEntry::new(&b"hello world"[..]);
        assert_eq!(e.read(0, 5).unwrap().as_ref(), b"hello");
        assert_eq!(e.read(6, 5).unwrap().as_ref(), b"world");
    }

    #[test]
    fn read_past_end_is_clamped() {
        let e = MemEntry::new(&b"abc"[..]);
        assert_eq!(e.read(1, 100).unwrap().as_ref(), b"bc");
    }

    #[test]
    fn read_at_end_returns_empty() {
        let e = MemEntry::new(&b"abc"[..]);
        assert!(e.read(3, 10).unwrap().is_empty());
        assert!(e.read(1000, 10).unwrap().is_empty());
    }

    #[test]
    fn repeated_reads_are_identical() {
        let e = MemEntry::new(&b"deterministic"[..]);
        assert_eq!(e.read(2, 7).unwrap(), e.read(2, 7).unwrap());
    }
}
