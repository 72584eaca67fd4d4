//! Memory-mapped backing store for a cache shard.
//!
//! `Store` owns the mmap and all mutable bookkeeping (free lists, the
//! vector-slot allocator, the header). It has no opinion about single-flight
//! or LRU policy — those live in [`crate::cache::Cache`] and
//! [`crate::lru`] respectively. All mutating methods require `&mut self`;
//! the cache wraps a `Store` in a `parking_lot::Mutex` so writers are
//! serialized while readers bypass it entirely via the in-memory index.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use embed_core::constants::{CACHE_SCHEMA_VERSION, FINGERPRINT_LEN};
use embed_core::errors::{EmbedError, EmbedResult};
use embed_core::fingerprint::Fingerprint;
use memmap2::MmapMut;
use tracing::{info, warn};

use crate::layout::{
    clear_key_record, read_key_record, write_key_record, EntryIndex, EntryRecord, Header, Layout,
    VectorSlot,
};

/// Outcome of opening an existing cache file against the pool's current
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Existing shard matches schema and model id; entries were preserved.
    Reused,
    /// No shard existed yet.
    Created,
    /// Existing shard's model id or schema version didn't match; it was
    /// discarded and an empty shard was created in its place.
    Invalidated { previous_model_id: String },
}

/// Free vector-slot list, persisted alongside the shard file so bump
/// allocator reuse survives a restart. The entry-index free set is *not*
/// persisted: it is always rebuilt from a full entry-table scan on open,
/// which `Store::open` performs anyway to recover the fingerprint index.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct FreeLists {
    vector_slots: Vec<u64>,
}

pub struct Store {
    path: PathBuf,
    mmap: MmapMut,
    layout: Layout,
    header: Header,
    free: FreeLists,
    free_entry_indices: Vec<u32>,
}

/// An unsynchronized view into a shard's mmap, for the hot read path only.
///
/// The mmap is sized once at `Store::open` and never grows or moves for
/// the life of the shard, so a raw pointer into it stays valid for as
/// long as the owning `Store` does — which, since `Cache` holds both
/// behind the same `Arc`, is the lifetime of the `Cache` itself. Readers
/// only ever touch bytes that a writer publishes in full before they
/// become reachable (the entry's `vector_slot` and the vector bytes it
/// names are both written before the fingerprint is inserted into the
/// index), so a concurrent writer elsewhere in the shard never tears a
/// read this view performs.
#[derive(Clone, Copy)]
pub struct RawView {
    ptr: *const u8,
    len: usize,
    layout: Layout,
}

// SAFETY: `RawView` only ever reads through `ptr`; it never aliases a
// `&mut` into the same bytes itself. Concurrent writers go through
// `Store`'s methods under `Cache`'s mutex, which only mutate fields the
// read paths below don't depend on for correctness (hit_count,
// last_accessed) or that are write-once-before-publish (vector bytes,
// vector_slot).
unsafe impl Send for RawView {}
unsafe impl Sync for RawView {}

impl RawView {
    fn bytes(&self) -> &[u8] {
        // SAFETY: see the `RawView` doc comment; `ptr`/`len` describe the
        // whole mmap for the shard's full lifetime.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn read_entry(&self, idx: EntryIndex) -> EntryRecord {
        let off = self.layout.entry_offset(idx);
        EntryRecord::read_from(&self.bytes()[off..off + crate::layout::ENTRY_RECORD_SIZE])
    }

    pub fn read_vector(&self, slot: VectorSlot) -> Vec<f32> {
        let off = self.layout.vector_offset(slot);
        let len = self.layout.vector_slot_size();
        let bytes = &self.bytes()[off..off + len];
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".freelist");
    PathBuf::from(p)
}

impl Store {
    /// Open or create a cache shard at `path`, sized for `capacity` entries
    /// of `dim` components each under `model_id`.
    pub fn open(
        path: &Path,
        capacity: usize,
        dim: usize,
        model_id: &str,
    ) -> EmbedResult<(Self, OpenOutcome)> {
        let layout = Layout::new(capacity, dim);

        if path.exists() {
            match Self::open_existing(path, layout, model_id) {
                Ok((store, outcome)) => return Ok((store, outcome)),
                Err(e) => {
                    warn!(error = %e, "existing cache shard unreadable, recreating");
                }
            }
        }

        let store = Self::create(path, layout, model_id)?;
        Ok((store, OpenOutcome::Created))
    }

    fn create(path: &Path, layout: Layout, model_id: &str) -> EmbedResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| EmbedError::internal(format!("cannot create cache file: {e}")))?;
        file.set_len(layout.total_size() as u64)
            .map_err(|e| EmbedError::StorageFull {
                message: format!("cannot allocate cache file: {e}"),
            })?;
        let mut mmap = unsafe {
            MmapMut::map_mut(&file).map_err(|e| EmbedError::internal(format!("mmap failed: {e}")))?
        };

        let header = Header {
            schema_version: CACHE_SCHEMA_VERSION,
            capacity: layout.capacity as u32,
            live_count: 0,
            dim: layout.dim as u32,
            next_vector_slot: 0,
            model_id: model_id.to_string(),
        };
        header.write_to(&mut mmap[0..crate::layout::HEADER_SIZE]);

        let free_entry_indices = (0..layout.capacity as u32).rev().collect();

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            layout,
            header,
            free: FreeLists::default(),
            free_entry_indices,
        })
    }

    fn open_existing(path: &Path, layout: Layout, model_id: &str) -> EmbedResult<(Self, OpenOutcome)> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| EmbedError::internal(format!("cannot open cache file: {e}")))?;
        let mut mmap = unsafe {
            MmapMut::map_mut(&file).map_err(|e| EmbedError::internal(format!("mmap failed: {e}")))?
        };
        if mmap.len() < crate::layout::HEADER_SIZE {
            return Err(EmbedError::internal("cache file truncated below header size"));
        }
        let header = Header::read_from(&mmap[0..crate::layout::HEADER_SIZE]);

        let schema_ok = header.schema_version == CACHE_SCHEMA_VERSION;
        let capacity_ok = header.capacity as usize == layout.capacity;
        let dim_ok = header.dim as usize == layout.dim;
        let model_ok = header.model_id == model_id;

        if !schema_ok || !capacity_ok || !dim_ok {
            return Err(EmbedError::internal(
                "cache file schema, capacity, or dim mismatch",
            ));
        }

        if mmap.len() < layout.total_size() {
            return Err(EmbedError::internal("cache file smaller than expected layout"));
        }

        if !model_ok {
            info!(
                previous_model_id = %header.model_id,
                new_model_id = model_id,
                "cache model id changed, recreating empty shard"
            );
            let previous_model_id = header.model_id.clone();
            drop(mmap);
            let store = Self::create(path, layout, model_id)?;
            return Ok((store, OpenOutcome::Invalidated { previous_model_id }));
        }

        let free = Self::load_freelist(path);

        let mut live = vec![false; layout.capacity];
        for i in 0..layout.capacity as u32 {
            let idx = EntryIndex(i);
            let off = layout.entry_offset(idx);
            let record = EntryRecord::read_from(&mmap[off..off + crate::layout::ENTRY_RECORD_SIZE]);
            live[i as usize] = record.is_live();
        }
        let free_entry_indices = (0..layout.capacity as u32)
            .rev()
            .filter(|i| !live[*i as usize])
            .collect();

        let store = Self {
            path: path.to_path_buf(),
            mmap,
            layout,
            header,
            free,
            free_entry_indices,
        };
        Ok((store, OpenOutcome::Reused))
    }

    fn load_freelist(path: &Path) -> FreeLists {
        let sidecar = sidecar_path(path);
        match std::fs::read(&sidecar) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => FreeLists::default(),
        }
    }

    /// Persist the free lists to a sidecar file. Best effort: a missing or
    /// stale sidecar just means a full entry-table scan rebuilds in-memory
    /// state on next open, which `Cache::open` already does regardless.
    pub fn persist_freelist(&self) {
        let sidecar = sidecar_path(&self.path);
        if let Ok(bytes) = serde_json::to_vec(&self.free) {
            let _ = std::fs::write(sidecar, bytes);
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// A lock-free handle onto this shard's bytes, for `Cache::get`'s hot
    /// path. See [`RawView`].
    pub fn raw_view(&self) -> RawView {
        RawView {
            ptr: self.mmap.as_ptr(),
            len: self.mmap.len(),
            layout: self.layout,
        }
    }

    pub fn capacity(&self) -> usize {
        self.layout.capacity
    }

    pub fn live_count(&self) -> u32 {
        self.header.live_count
    }

    pub fn model_id(&self) -> &str {
        &self.header.model_id
    }

    /// Scan the key region once to rebuild the fingerprint -> entry index
    /// map. Called exactly once, at `Cache::open`.
    pub fn scan_live_entries(&self) -> Vec<(Fingerprint, EntryIndex, EntryRecord)> {
        let mut out = Vec::new();
        for i in 0..self.layout.capacity as u32 {
            let idx = EntryIndex(i);
            let key_off = self.layout.key_offset(idx);
            let key_buf = &self.mmap[key_off..key_off + embed_core::constants::KEY_RECORD_LEN];
            let Some(fp_bytes) = read_key_record(key_buf) else {
                continue;
            };
            let entry_off = self.layout.entry_offset(idx);
            let record = EntryRecord::read_from(
                &self.mmap[entry_off..entry_off + crate::layout::ENTRY_RECORD_SIZE],
            );
            if !record.is_live() {
                continue;
            }
            out.push((Fingerprint(fp_bytes), idx, record));
        }
        out
    }

    pub fn free_entry_index(&mut self, idx: EntryIndex) {
        self.free_entry_indices.push(idx.0);
    }

    /// Allocate a free entry-table row. Returns `None` if every row is live
    /// (the caller must evict first).
    pub fn alloc_entry_index(&mut self) -> Option<EntryIndex> {
        self.free_entry_indices.pop().map(EntryIndex)
    }

    /// Allocate a vector slot: reuse a freed one, or bump the allocator.
    pub fn alloc_vector_slot(&mut self) -> VectorSlot {
        if let Some(slot) = self.free.vector_slots.pop() {
            return VectorSlot(slot);
        }
        let slot = self.header.next_vector_slot;
        self.header.next_vector_slot += 1;
        VectorSlot(slot)
    }

    /// Release a vector slot. Rewinds the bump allocator when the slot was
    /// the most recently handed-out one; otherwise queues it for reuse.
    pub fn free_vector_slot(&mut self, slot: VectorSlot) {
        if slot.0 + 1 == self.header.next_vector_slot {
            self.header.next_vector_slot -= 1;
        } else {
            self.free.vector_slots.push(slot.0);
        }
    }

    /// Write a vector's bytes into its slot. Step 1 of the publish write
    /// fence: vector bytes land before the key and entry-table rows that
    /// make the slot reachable.
    pub fn write_vector(&mut self, slot: VectorSlot, data: &[f32]) {
        let off = self.layout.vector_offset(slot);
        let bytes: &[u8] = bytemuck_cast_f32_slice(data);
        self.mmap[off..off + bytes.len()].copy_from_slice(bytes);
    }

    pub fn read_vector(&self, slot: VectorSlot) -> Vec<f32> {
        let off = self.layout.vector_offset(slot);
        let len = self.layout.vector_slot_size();
        let bytes = &self.mmap[off..off + len];
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Step 2 of the publish write fence: the key record.
    pub fn write_key(&mut self, idx: EntryIndex, fingerprint: &Fingerprint) {
        let off = self.layout.key_offset(idx);
        write_key_record(
            &mut self.mmap[off..off + embed_core::constants::KEY_RECORD_LEN],
            fingerprint.as_bytes(),
        );
    }

    pub fn clear_key(&mut self, idx: EntryIndex) {
        let off = self.layout.key_offset(idx);
        clear_key_record(&mut self.mmap[off..off + embed_core::constants::KEY_RECORD_LEN]);
    }

    /// Step 3 of the publish write fence: the entry-table row.
    pub fn write_entry(&mut self, idx: EntryIndex, record: EntryRecord) {
        let off = self.layout.entry_offset(idx);
        record.write_to(&mut self.mmap[off..off + crate::layout::ENTRY_RECORD_SIZE]);
    }

    pub fn read_entry(&self, idx: EntryIndex) -> EntryRecord {
        let off = self.layout.entry_offset(idx);
        EntryRecord::read_from(&self.mmap[off..off + crate::layout::ENTRY_RECORD_SIZE])
    }

    pub fn clear_entry(&mut self, idx: EntryIndex) {
        self.write_entry(idx, EntryRecord::EMPTY);
    }

    /// Best-effort update of an entry's `last_accessed` field. Races with
    /// concurrent readers/evictors are tolerated: at worst the LRU picks a
    /// slightly stale victim, never a correctness problem.
    pub fn touch_last_accessed(&mut self, idx: EntryIndex, now: i64) {
        let off = self.layout.entry_offset(idx) + 24;
        self.mmap[off..off + 8].copy_from_slice(&now.to_le_bytes());
    }

    pub fn bump_hit_count(&mut self, idx: EntryIndex) {
        let off = self.layout.entry_offset(idx) + 16;
        let cur = u64::from_le_bytes(self.mmap[off..off + 8].try_into().unwrap());
        self.mmap[off..off + 8].copy_from_slice(&(cur + 1).to_le_bytes());
    }

    /// Step 4 of the publish write fence: bump the header's live count.
    pub fn increment_live_count(&mut self) {
        self.header.live_count += 1;
        self.flush_header();
    }

    pub fn decrement_live_count(&mut self) {
        self.header.live_count = self.header.live_count.saturating_sub(1);
        self.flush_header();
    }

    /// Step 5 of the publish write fence: durably record the header.
    fn flush_header(&mut self) {
        let mut buf = [0u8; crate::layout::HEADER_SIZE];
        self.header.write_to(&mut buf);
        self.mmap[0..crate::layout::HEADER_SIZE].copy_from_slice(&buf);
    }

    /// Scan every live entry's `last_accessed` and return the globally
    /// least-recently-used one. `O(capacity)`; only called on eviction,
    /// which is rate-limited by the miss rate, never the hot read path.
    pub fn least_recently_used(&self) -> Option<(EntryIndex, Fingerprint)> {
        let mut best: Option<(EntryIndex, i64)> = None;
        for i in 0..self.layout.capacity as u32 {
            let idx = EntryIndex(i);
            let record = self.read_entry(idx);
            if !record.is_live() {
                continue;
            }
            if best.map(|(_, ts)| record.last_accessed < ts).unwrap_or(true) {
                best = Some((idx, record.last_accessed));
            }
        }
        let (idx, _) = best?;
        let key_off = self.layout.key_offset(idx);
        let fp_bytes = read_key_record(
            &self.mmap[key_off..key_off + embed_core::constants::KEY_RECORD_LEN],
        )?;
        Some((idx, Fingerprint(fp_bytes)))
    }
}

fn bytemuck_cast_f32_slice(data: &[f32]) -> &[u8] {
    // SAFETY: f32 has no padding and any bit pattern is a valid f32; the
    // resulting byte slice's lifetime is tied to `data`'s.
    unsafe { std::slice::from_raw_parts(data.as_ptr() as *const u8, std::mem::size_of_val(data)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embed_core::fingerprint::fingerprint;
    use tempfile::tempdir;

    #[test]
    fn create_then_reopen_preserves_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shard.bin");

        let (mut store, outcome) = Store::open(&path, 16, 4, "model-a").unwrap();
        assert_eq!(outcome, OpenOutcome::Created);

        let fp = fingerprint("hello").unwrap();
        let idx = store.alloc_entry_index().unwrap();
        let slot = store.alloc_vector_slot();
        store.write_vector(slot, &[1.0, 2.0, 3.0, 4.0]);
        store.write_key(idx, &fp);
        store.write_entry(
            idx,
            EntryRecord {
                vector_slot: slot.0,
                created_at: 1,
                hit_count: 0,
                last_accessed: 1,
            },
        );
        store.increment_live_count();
        store.persist_freelist();
        drop(store);

        let (reopened, outcome) = Store::open(&path, 16, 4, "model-a").unwrap();
        assert_eq!(outcome, OpenOutcome::Reused);
        assert_eq!(reopened.live_count(), 1);
        let entries = reopened.scan_live_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, fp);
    }

    #[test]
    fn model_id_change_invalidates_shard() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shard.bin");
        let (_store, outcome) = Store::open(&path, 16, 4, "model-a").unwrap();
        assert_eq!(outcome, OpenOutcome::Created);

        let (reopened, outcome) = Store::open(&path, 16, 4, "model-b").unwrap();
        assert_eq!(
            outcome,
            OpenOutcome::Invalidated {
                previous_model_id: "model-a".to_string()
            }
        );
        assert_eq!(reopened.live_count(), 0);
        assert_eq!(reopened.model_id(), "model-b");
    }

    #[test]
    fn vector_slot_allocator_rewinds_on_lifo_free() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shard.bin");
        let (mut store, _) = Store::open(&path, 16, 4, "model-a").unwrap();
        let a = store.alloc_vector_slot();
        let b = store.alloc_vector_slot();
        assert_eq!(a.0, 0);
        assert_eq!(b.0, 1);
        store.free_vector_slot(b);
        let c = store.alloc_vector_slot();
        assert_eq!(c.0, 1, "rewound allocator should reissue the same slot");
    }

    #[test]
    fn vector_slot_freed_out_of_order_goes_to_freelist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shard.bin");
        let (mut store, _) = Store::open(&path, 16, 4, "model-a").unwrap();
        let a = store.alloc_vector_slot();
        let _b = store.alloc_vector_slot();
        store.free_vector_slot(a); // not the most recent allocation
        assert_eq!(store.header.next_vector_slot, 2);
        let c = store.alloc_vector_slot();
        assert_eq!(c.0, 0, "should reuse freelisted slot before bumping");
    }
}
