//! Thread-safe chunk deduplication store.
//!
//! Two maps share one short-held lock: `all` records every unique chunk
//! ever written and is never pruned (the final chunk index is built from
//! it), while a bounded LRU cache tracks the recently seen subset. Evicting
//! from the cache never removes chunk bodies or index entries; a re-seen
//! evicted chunk still deduplicates through `all`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::{ChunkInfo, Error, HashSum};

/// Estimated in-memory bytes per cache entry (LRU links, map entry, chunk
/// record, headroom). Only used to budget `max_chunks` from a byte bound;
/// correctness does not depend on it.
pub const CHUNK_ENTRY_OVERHEAD: u64 = 120;

/// Compute the cache entry bound for a byte budget. Zero means unlimited.
pub fn max_chunks_for_budget(budget_bytes: u64, chunk_size: u64) -> usize {
    (budget_bytes / (chunk_size + CHUNK_ENTRY_OVERHEAD)) as usize
}

/// Monotonic counters describing a compression run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Chunks offered to the store, duplicates included.
    pub total_seen: u64,
    /// Chunks that were new and had their body written.
    pub unique: u64,
    /// Chunks that deduplicated against an existing entry.
    pub deduped: u64,
    /// Compressed bytes not written thanks to deduplication.
    pub bytes_saved: u64,
    /// Cache entries dropped to respect the entry bound.
    pub evictions: u64,
}

const NIL: usize = usize::MAX;

struct LruNode {
    hash: HashSum,
    refcount: u64,
    prev: usize,
    next: usize,
}

/// Doubly linked LRU list threaded through an index arena, head = most
/// recently used.
struct LruList {
    nodes: Vec<LruNode>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl LruList {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    fn push_front(&mut self, hash: HashSum) -> usize {
        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index] = LruNode {
                    hash,
                    refcount: 1,
                    prev: NIL,
                    next: self.head,
                };
                index
            }
            None => {
                self.nodes.push(LruNode {
                    hash,
                    refcount: 1,
                    prev: NIL,
                    next: self.head,
                });
                self.nodes.len() - 1
            }
        };
        if self.head != NIL {
            self.nodes[self.head].prev = index;
        }
        self.head = index;
        if self.tail == NIL {
            self.tail = index;
        }
        index
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = (self.nodes[index].prev, self.nodes[index].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn touch(&mut self, index: usize) {
        if self.head == index {
            self.nodes[index].refcount += 1;
            return;
        }
        self.unlink(index);
        self.nodes[index].prev = NIL;
        self.nodes[index].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = index;
        }
        self.head = index;
        if self.tail == NIL {
            self.tail = index;
        }
        self.nodes[index].refcount += 1;
    }

    fn pop_back(&mut self) -> Option<HashSum> {
        if self.tail == NIL {
            return None;
        }
        let index = self.tail;
        self.unlink(index);
        self.free.push(index);
        Some(self.nodes[index].hash)
    }
}

struct StoreInner {
    all: HashMap<HashSum, ChunkInfo>,
    // First-insertion order; defines the chunk index layout and thereby the
    // offset-as-prefix-sum invariant.
    order: Vec<HashSum>,
    cache: HashMap<HashSum, usize>,
    lru: LruList,
}

/// Deduplication map shared by all compression workers of one run.
pub struct ChunkStore {
    max_chunks: usize,
    inner: Mutex<StoreInner>,
    total_seen: AtomicU64,
    unique: AtomicU64,
    deduped: AtomicU64,
    bytes_saved: AtomicU64,
    evictions: AtomicU64,
}

impl ChunkStore {
    /// Create a store with the given cache entry bound. 0 means unlimited.
    pub fn new(max_chunks: usize) -> Self {
        Self {
            max_chunks,
            inner: Mutex::new(StoreInner {
                all: HashMap::new(),
                order: Vec::new(),
                cache: HashMap::new(),
                lru: LruList::new(),
            }),
            total_seen: AtomicU64::new(0),
            unique: AtomicU64::new(0),
            deduped: AtomicU64::new(0),
            bytes_saved: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up or materialize the chunk for `hash`.
    ///
    /// `write_fn` compresses and appends the chunk body, returning its
    /// `(offset, compressed_size)` within the body region. It runs outside
    /// the store lock so compression and I/O of distinct chunks proceed in
    /// parallel; a second lookup afterwards resolves the race where two
    /// workers materialize the same hash concurrently. The loser's body
    /// bytes stay in the body file unreferenced, which the archive format
    /// tolerates.
    pub fn get_or_add<F>(
        &self,
        hash: HashSum,
        original_size: u64,
        write_fn: F,
    ) -> Result<(ChunkInfo, bool), Error>
    where
        F: FnOnce() -> Result<(u64, u64), Error>,
    {
        self.total_seen.fetch_add(1, Ordering::Relaxed);
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(&node) = inner.cache.get(&hash) {
                inner.lru.touch(node);
                let info = inner.all[&hash].clone();
                drop(inner);
                self.record_dedup(&info);
                return Ok((info, false));
            }
            if let Some(info) = inner.all.get(&hash) {
                // Evicted from cache but still archived. Do not re-insert;
                // the cache bound exists to cap memory.
                let info = info.clone();
                drop(inner);
                self.record_dedup(&info);
                return Ok((info, false));
            }
        }

        let (offset, compressed_size) = write_fn()?;

        let mut inner = self.inner.lock().unwrap();
        if let Some(info) = inner.all.get(&hash) {
            // Lost the race; another worker archived this hash while we
            // were compressing. Abandon our copy of the body bytes.
            let info = info.clone();
            drop(inner);
            self.record_dedup(&info);
            return Ok((info, false));
        }
        let info = ChunkInfo {
            hash,
            offset,
            compressed_size,
            original_size,
        };
        if self.max_chunks > 0 && inner.cache.len() >= self.max_chunks {
            if let Some(evicted) = inner.lru.pop_back() {
                inner.cache.remove(&evicted);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        let node = inner.lru.push_front(hash);
        inner.cache.insert(hash, node);
        inner.all.insert(hash, info.clone());
        inner.order.push(hash);
        drop(inner);
        self.unique.fetch_add(1, Ordering::Relaxed);
        Ok((info, true))
    }

    /// Look up a chunk without any side effects.
    pub fn get(&self, hash: &HashSum) -> Option<ChunkInfo> {
        self.inner.lock().unwrap().all.get(hash).cloned()
    }

    /// Clone the permanent index in first-insertion order.
    pub fn snapshot_all(&self) -> Vec<ChunkInfo> {
        let inner = self.inner.lock().unwrap();
        inner
            .order
            .iter()
            .map(|hash| inner.all[hash].clone())
            .collect()
    }

    /// Atomic snapshot of the run counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_seen: self.total_seen.load(Ordering::Relaxed),
            unique: self.unique.load(Ordering::Relaxed),
            deduped: self.deduped.load(Ordering::Relaxed),
            bytes_saved: self.bytes_saved.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn record_dedup(&self, info: &ChunkInfo) {
        self.deduped.fetch_add(1, Ordering::Relaxed);
        self.bytes_saved
            .fetch_add(info.compressed_size, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    fn hash_of(tag: u8) -> HashSum {
        HashSum::digest(&[tag])
    }

    fn add(store: &ChunkStore, tag: u8, offset: u64) -> (ChunkInfo, bool) {
        store
            .get_or_add(hash_of(tag), 100, || Ok((offset, 50)))
            .unwrap()
    }

    #[test]
    fn dedup_returns_first_entry() {
        let store = ChunkStore::new(0);
        let (info, is_new) = add(&store, 0, 0);
        assert!(is_new);
        let (again, is_new) = add(&store, 0, 999);
        assert!(!is_new);
        assert_eq!(info, again);
        let stats = store.stats();
        assert_eq!(stats.total_seen, 2);
        assert_eq!(stats.unique, 1);
        assert_eq!(stats.deduped, 1);
        assert_eq!(stats.bytes_saved, 50);
    }

    #[test]
    fn eviction_keeps_permanent_index() {
        let store = ChunkStore::new(2);
        add(&store, 0, 0);
        add(&store, 1, 50);
        // Touch H0 so H1 becomes least recently used.
        add(&store, 0, 0);
        // Inserting H2 evicts H1 from the cache only.
        add(&store, 2, 100);
        let stats = store.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.unique, 3);

        let inner = store.inner.lock().unwrap();
        assert!(inner.cache.contains_key(&hash_of(0)));
        assert!(inner.cache.contains_key(&hash_of(2)));
        assert!(!inner.cache.contains_key(&hash_of(1)));
        drop(inner);

        // The written archive stays correct: all three chunks survive.
        let snapshot = store.snapshot_all();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[1].hash, hash_of(1));
    }

    #[test]
    fn evicted_hash_still_deduplicates() {
        let store = ChunkStore::new(1);
        add(&store, 0, 0);
        add(&store, 1, 50);
        let (_, is_new) = add(&store, 0, 12345);
        assert!(!is_new);
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let store = ChunkStore::new(0);
        for tag in 0..20u8 {
            store
                .get_or_add(hash_of(tag), 100, || Ok((u64::from(tag) * 10, 10)))
                .unwrap();
        }
        let snapshot = store.snapshot_all();
        let mut expected_offset = 0;
        for info in snapshot {
            assert_eq!(info.offset, expected_offset);
            expected_offset += info.compressed_size;
        }
    }

    #[test]
    fn write_fn_error_leaves_no_trace() {
        let store = ChunkStore::new(0);
        let result = store.get_or_add(hash_of(0), 100, || {
            Err(Error::Codec("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.stats().unique, 0);
        assert!(store.get(&hash_of(0)).is_none());
    }

    #[test]
    fn concurrent_same_hash_single_winner() {
        let store = Arc::new(ChunkStore::new(0));
        let wins = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::new();
        for worker in 0..8u64 {
            let store = store.clone();
            let wins = wins.clone();
            handles.push(std::thread::spawn(move || {
                let (info, is_new) = store
                    .get_or_add(hash_of(7), 100, || Ok((worker * 100, 50)))
                    .unwrap();
                if is_new {
                    wins.fetch_add(1, Ordering::Relaxed);
                }
                info
            }));
        }
        let infos: Vec<ChunkInfo> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(wins.load(Ordering::Relaxed), 1);
        // Every caller observed the winner's entry.
        for info in &infos {
            assert_eq!(info, &infos[0]);
        }
        assert_eq!(store.snapshot_all().len(), 1);
    }
}
