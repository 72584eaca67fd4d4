/// Embedding vector dimensionality. Fixed by the hosted model (BGE-small).
pub const DIM: usize = 384;

/// Length in bytes of a content fingerprint.
pub const FINGERPRINT_LEN: usize = 32;

/// Maximum length of a UTF-8 fingerprint key record on disk: 1 length byte
/// plus up to 64 bytes of key material (a fingerprint's hex form is 64
/// bytes; raw fingerprints are stored as their 32 raw bytes plus a length
/// prefix, leaving headroom for future longer keys).
pub const KEY_RECORD_LEN: usize = 65;

/// On-disk cache schema version. Bumping this invalidates existing cache
/// files on open.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8766;

/// Default maximum batch size handed to a single worker dispatch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 800;

/// Default on-disk + in-memory cache capacity (entries).
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Default no-clients auto-shutdown timeout.
pub const DEFAULT_NO_CLIENTS_TIMEOUT_MS: u64 = 300_000;

/// Default idle auto-shutdown timeout.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 1_800_000;

/// Default soft deadline for a batch (workers should try to finish by then).
pub const DEFAULT_BATCH_SOFT_DEADLINE_MS: u64 = 2_000;

/// Default hard deadline for a batch (pool aborts the worker past this).
pub const DEFAULT_BATCH_HARD_DEADLINE_MS: u64 = 10_000;

/// Default stall threshold: no progress record for this long -> abort + respawn.
pub const DEFAULT_WORKER_STALL_MS: u64 = 5_000;

/// Maximum consecutive replacement failures before the pool enters `Degraded`.
pub const MAX_REPLACEMENT_FAILURES: u32 = 3;

/// Window (seconds) over which replacement failures are counted.
pub const REPLACEMENT_FAILURE_WINDOW_SECS: i64 = 60;
