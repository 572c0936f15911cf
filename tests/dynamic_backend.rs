#![allow(clippy::unwrap_used, missing_docs)]

mod common;

use std::sync::{Arc, Mutex};

use bytes::Bytes;

use srvfs::backend::{Backend, Snapshot, SnapshotBackend};
use srvfs::fcache::{FileCache, NodeId};
use srvfs::path::FsPath;
use srvfs::proto::Status;

use common::{close, harness, open, read};

/// A snapshot source whose records the test mutates out-of-band.
#[derive(Clone)]
struct FakeSource {
    records: Arc<Mutex<Vec<(String, Bytes)>>>,
    snapshots_taken: Arc<Mutex<usize>>,
}

impl FakeSource {
    fn new(records: &[(&str, &[u8])]) -> Self {
        Self {
            records: Arc::new(Mutex::new(
                records
                    .iter()
                    .map(|(n, d)| ((*n).to_owned(), Bytes::copy_from_slice(d)))
                    .collect(),
            )),
            snapshots_taken: Arc::new(Mutex::new(0)),
        }
    }

    fn set(&self, records: &[(&str, &[u8])]) {
        *self.records.lock().unwrap() = records
            .iter()
            .map(|(n, d)| ((*n).to_owned(), Bytes::copy_from_slice(d)))
            .collect();
    }

    fn taken(&self) -> usize {
        *self.snapshots_taken.lock().unwrap()
    }
}

impl Snapshot for FakeSource {
    fn snapshot(&mut self) -> Vec<(String, Bytes)> {
        *self.snapshots_taken.lock().unwrap() += 1;
        self.records.lock().unwrap().clone()
    }
}

#[test]
fn miss_rebuilds_and_serves_fresh_records() {
    let source = FakeSource::new(&[("1", b"init\n")]);
    let (mut server, arena) = harness(SnapshotBackend::new("jobs", source.clone()));

    let opened = open(&mut server, &arena, "jobs/1");
    assert_eq!(opened.status, Status::Ok);
    let (reply, data) = read(&mut server, &arena, opened.ident, 64, 0);
    assert_eq!(reply.status, Status::Ok);
    assert_eq!(data, b"init\n");
    close(&mut server, opened.ident);

    // A record that appeared after the last rebuild is still found: every
    // lookup re-snapshots instead of trusting the cache.
    source.set(&[("2", b"second\n")]);
    let opened = open(&mut server, &arena, "jobs/2");
    assert_eq!(opened.status, Status::Ok);

    // And the vanished record is gone with it.
    assert_eq!(open(&mut server, &arena, "jobs/1").status, Status::NotFound);
    assert!(source.taken() >= 3, "each lookup must take a snapshot");
}

#[test]
fn hit_refreshes_content_instead_of_trusting_the_cache() {
    let source = FakeSource::new(&[("1", b"old\n")]);
    let (mut server, arena) = harness(SnapshotBackend::new("jobs", source.clone()));

    let first = open(&mut server, &arena, "jobs/1");
    assert_eq!(first.status, Status::Ok);

    source.set(&[("1", b"new\n")]);

    // Second open hits the cached node; the refresh hook rebuilds anyway.
    let second = open(&mut server, &arena, "jobs/1");
    assert_eq!(second.status, Status::Ok);

    let (_, data) = read(&mut server, &arena, second.ident, 64, 0);
    assert_eq!(data, b"new\n");

    // The first handle survived the rebuild (its node was pinned) and now
    // observes the refreshed content too.
    let (_, data) = read(&mut server, &arena, first.ident, 64, 0);
    assert_eq!(data, b"new\n");
}

#[test]
fn open_handle_keeps_node_alive_across_rebuilds() {
    let source = FakeSource::new(&[("1", b"one\n"), ("2", b"two\n")]);
    let (mut server, arena) = harness(SnapshotBackend::new("jobs", source.clone()));

    let held = open(&mut server, &arena, "jobs/1");
    let node = server.cache().lookup_key("jobs/1").unwrap();

    // Trigger rebuilds through other lookups; the held node must not move.
    open(&mut server, &arena, "jobs/2");
    open(&mut server, &arena, "jobs/2");
    assert_eq!(
        server.cache().lookup_key("jobs/1"),
        Some(node),
        "pinned node must keep its identity across rebuilds"
    );
    assert_eq!(server.cache().node(node).unwrap().rc(), 1);

    let (reply, _) = read(&mut server, &arena, held.ident, 8, 0);
    assert_eq!(reply.status, Status::Ok);
}

// ── Refresh hook contract ───────────────────────────────────────────────

/// A backend whose refresh hook rejects every hit, forcing the load hook.
struct RejectingBackend {
    loads: usize,
}

impl Backend for RejectingBackend {
    fn cache_hit(&mut self, _cache: &mut FileCache, _hit: NodeId) -> Option<NodeId> {
        None
    }

    fn load(&mut self, cache: &mut FileCache, path: &FsPath) -> Option<NodeId> {
        self.loads += 1;
        cache.lookup(path)
    }
}

#[test]
fn rejecting_refresh_hook_demotes_hits_to_misses() {
    let (mut server, arena) = harness(RejectingBackend { loads: 0 });
    server
        .cache_mut()
        .insert(Arc::new(srvfs::entry::MemEntry::new(&b"x"[..])), "present")
        .unwrap();

    let reply = open(&mut server, &arena, "present");
    assert_eq!(
        reply.status,
        Status::Ok,
        "load hook resolved what the refresh hook rejected"
    );
    assert_eq!(
        server.backend().loads,
        1,
        "the indexed path could only have resolved through load"
    );

    let opened = open(&mut server, &arena, "present");
    assert_eq!(opened.status, Status::Ok);
    assert_eq!(server.backend().loads, 2);
}

/// A backend that evicts its own freshly loaded node before answering.
struct StaleBackend;

impl Backend for StaleBackend {
    fn load(&mut self, cache: &mut FileCache, path: &FsPath) -> Option<NodeId> {
        let id = cache
            .insert_at(Arc::new(srvfs::entry::MemEntry::new(&b"x"[..])), path.clone())
            .ok()?;
        // rc is still zero, so the sweep takes the node right back out.
        cache.clear(None);
        Some(id)
    }
}

#[test]
fn stale_node_from_a_buggy_backend_is_not_served() {
    let (mut server, arena) = harness(StaleBackend);
    let reply = open(&mut server, &arena, "ghost");
    assert_eq!(
        reply.status,
        Status::NotFound,
        "no handle may be minted for a node missing from the cache"
    );
    assert_eq!(server.cache().node_count(), 1, "nothing may be pinned either");
}
