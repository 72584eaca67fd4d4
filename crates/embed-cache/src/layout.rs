//! On-disk layout of a cache shard: fixed-offset regions for the header,
//! entry table, vector region, and key region. All offsets are derived
//! from `capacity` and `dim` at open time; nothing here is self-describing
//! beyond the header.
//!
//! [`EntryIndex`] and [`VectorSlot`] are distinct handle types so a caller
//! can never accidentally use an entry-table row index where a vector
//! region slot was expected, or vice versa — they only coincide by value
//! on the common path where an entry's vector has never moved.

use embed_core::constants::{FINGERPRINT_LEN, KEY_RECORD_LEN};

/// Row index into the entry table, in `[0, capacity)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryIndex(pub u32);

/// Slot index into the vector region, in `[0, capacity)`. A vector's byte
/// offset within the region is `slot.0 as usize * dim * size_of::<f32>()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VectorSlot(pub u64);

pub const HEADER_SIZE: usize = 128;
pub const ENTRY_RECORD_SIZE: usize = 32; // vector_slot(u64) + created_at(i64) + hit_count(u64) + last_accessed(i64)
pub const MODEL_ID_FIELD_LEN: usize = 64;

const OFF_SCHEMA_VERSION: usize = 0;
const OFF_CAPACITY: usize = 4;
const OFF_LIVE_COUNT: usize = 8;
const OFF_DIM: usize = 12;
const OFF_NEXT_VECTOR_SLOT: usize = 16;
const OFF_MODEL_ID_LEN: usize = 24;
const OFF_MODEL_ID: usize = 28;

/// Layout computed once at open time from `capacity` and `dim`.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub capacity: usize,
    pub dim: usize,
}

impl Layout {
    pub fn new(capacity: usize, dim: usize) -> Self {
        Self { capacity, dim }
    }

    pub fn entry_table_offset(&self) -> usize {
        HEADER_SIZE
    }

    pub fn entry_table_size(&self) -> usize {
        self.capacity * ENTRY_RECORD_SIZE
    }

    pub fn vector_region_offset(&self) -> usize {
        self.entry_table_offset() + self.entry_table_size()
    }

    pub fn vector_slot_size(&self) -> usize {
        self.dim * std::mem::size_of::<f32>()
    }

    pub fn vector_region_size(&self) -> usize {
        self.capacity * self.vector_slot_size()
    }

    pub fn key_region_offset(&self) -> usize {
        self.vector_region_offset() + self.vector_region_size()
    }

    pub fn key_region_size(&self) -> usize {
        self.capacity * KEY_RECORD_LEN
    }

    pub fn total_size(&self) -> usize {
        self.key_region_offset() + self.key_region_size()
    }

    pub fn entry_offset(&self, idx: EntryIndex) -> usize {
        self.entry_table_offset() + idx.0 as usize * ENTRY_RECORD_SIZE
    }

    pub fn vector_offset(&self, slot: VectorSlot) -> usize {
        self.vector_region_offset() + slot.0 as usize * self.vector_slot_size()
    }

    pub fn key_offset(&self, idx: EntryIndex) -> usize {
        self.key_region_offset() + idx.0 as usize * KEY_RECORD_LEN
    }
}

/// In-memory mirror of the header record, read/written through fixed byte
/// offsets so the file format never depends on struct layout or endianness
/// of the host running `rustc`.
#[derive(Debug, Clone)]
pub struct Header {
    pub schema_version: u32,
    pub capacity: u32,
    pub live_count: u32,
    pub dim: u32,
    pub next_vector_slot: u64,
    pub model_id: String,
}

impl Header {
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[OFF_SCHEMA_VERSION..OFF_SCHEMA_VERSION + 4]
            .copy_from_slice(&self.schema_version.to_le_bytes());
        buf[OFF_CAPACITY..OFF_CAPACITY + 4].copy_from_slice(&self.capacity.to_le_bytes());
        buf[OFF_LIVE_COUNT..OFF_LIVE_COUNT + 4].copy_from_slice(&self.live_count.to_le_bytes());
        buf[OFF_DIM..OFF_DIM + 4].copy_from_slice(&self.dim.to_le_bytes());
        buf[OFF_NEXT_VECTOR_SLOT..OFF_NEXT_VECTOR_SLOT + 8]
            .copy_from_slice(&self.next_vector_slot.to_le_bytes());
        let id_bytes = self.model_id.as_bytes();
        let len = id_bytes.len().min(MODEL_ID_FIELD_LEN);
        buf[OFF_MODEL_ID_LEN..OFF_MODEL_ID_LEN + 4].copy_from_slice(&(len as u32).to_le_bytes());
        buf[OFF_MODEL_ID..OFF_MODEL_ID + MODEL_ID_FIELD_LEN].fill(0);
        buf[OFF_MODEL_ID..OFF_MODEL_ID + len].copy_from_slice(&id_bytes[..len]);
    }

    pub fn read_from(buf: &[u8]) -> Self {
        let schema_version = u32::from_le_bytes(buf[OFF_SCHEMA_VERSION..OFF_SCHEMA_VERSION + 4].try_into().unwrap());
        let capacity = u32::from_le_bytes(buf[OFF_CAPACITY..OFF_CAPACITY + 4].try_into().unwrap());
        let live_count = u32::from_le_bytes(buf[OFF_LIVE_COUNT..OFF_LIVE_COUNT + 4].try_into().unwrap());
        let dim = u32::from_le_bytes(buf[OFF_DIM..OFF_DIM + 4].try_into().unwrap());
        let next_vector_slot = u64::from_le_bytes(
            buf[OFF_NEXT_VECTOR_SLOT..OFF_NEXT_VECTOR_SLOT + 8].try_into().unwrap(),
        );
        let id_len = u32::from_le_bytes(buf[OFF_MODEL_ID_LEN..OFF_MODEL_ID_LEN + 4].try_into().unwrap()) as usize;
        let id_len = id_len.min(MODEL_ID_FIELD_LEN);
        let model_id = String::from_utf8_lossy(&buf[OFF_MODEL_ID..OFF_MODEL_ID + id_len]).into_owned();
        Self {
            schema_version,
            capacity,
            live_count,
            dim,
            next_vector_slot,
            model_id,
        }
    }
}

/// In-memory mirror of one entry-table row.
#[derive(Debug, Clone, Copy)]
pub struct EntryRecord {
    pub vector_slot: u64,
    pub created_at: i64,
    pub hit_count: u64,
    pub last_accessed: i64,
}

impl EntryRecord {
    pub const EMPTY: EntryRecord = EntryRecord {
        vector_slot: u64::MAX,
        created_at: 0,
        hit_count: 0,
        last_accessed: 0,
    };

    pub fn is_live(&self) -> bool {
        self.vector_slot != u64::MAX
    }

    pub fn write_to(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.vector_slot.to_le_bytes());
        buf[8..16].copy_from_slice(&self.created_at.to_le_bytes());
        buf[16..24].copy_from_slice(&self.hit_count.to_le_bytes());
        buf[24..32].copy_from_slice(&self.last_accessed.to_le_bytes());
    }

    pub fn read_from(buf: &[u8]) -> Self {
        Self {
            vector_slot: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            created_at: i64::from_le_bytes(buf[8..16].try_into().unwrap()),
            hit_count: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            last_accessed: i64::from_le_bytes(buf[24..32].try_into().unwrap()),
        }
    }
}

/// Write a fingerprint's key record: 1 length byte, then up to
/// `KEY_RECORD_LEN - 1` raw bytes, zero-padded.
pub fn write_key_record(buf: &mut [u8], fingerprint: &[u8; FINGERPRINT_LEN]) {
    debug_assert_eq!(buf.len(), KEY_RECORD_LEN);
    buf[0] = FINGERPRINT_LEN as u8;
    buf[1..].fill(0);
    buf[1..1 + FINGERPRINT_LEN].copy_from_slice(fingerprint);
}

pub fn clear_key_record(buf: &mut [u8]) {
    debug_assert_eq!(buf.len(), KEY_RECORD_LEN);
    buf.fill(0);
}

/// Read a key record. Returns `None` for an empty (length-zero) slot.
pub fn read_key_record(buf: &[u8]) -> Option<[u8; FINGERPRINT_LEN]> {
    let len = buf[0] as usize;
    if len == 0 {
        return None;
    }
    let mut out = [0u8; FINGERPRINT_LEN];
    let take = len.min(FINGERPRINT_LEN);
    out[..take].copy_from_slice(&buf[1..1 + take]);
    Some(out)
}
