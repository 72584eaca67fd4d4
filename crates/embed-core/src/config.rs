//! Server configuration (spec §6 "Configuration").
//!
//! Every field is optional with a documented default. Loadable from a TOML
//! file via [`ServerConfig::from_toml_str`] and overridable by environment
//! variables via [`ServerConfig::apply_env_overrides`], following the same
//! `#[serde(default)]` + `defaults` module pattern used for every other
//! per-subsystem config struct this crate would otherwise define.

use serde::{Deserialize, Serialize};

use crate::errors::{EmbedError, EmbedResult};

/// Named default values, kept separate from the struct so they can be
/// referenced both by `#[serde(default = "...")]` and by documentation.
pub mod defaults {
    use crate::constants;

    pub fn port() -> u16 {
        constants::DEFAULT_PORT
    }
    pub fn max_workers() -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        cores.saturating_sub(2).clamp(1, 4)
    }
    pub fn max_batch_size() -> usize {
        constants::DEFAULT_MAX_BATCH_SIZE
    }
    pub fn queue_high_water_multiplier() -> usize {
        4
    }
    pub fn cache_capacity() -> usize {
        constants::DEFAULT_CACHE_CAPACITY
    }
    pub fn dim() -> usize {
        constants::DIM
    }
    pub fn no_clients_timeout_ms() -> u64 {
        constants::DEFAULT_NO_CLIENTS_TIMEOUT_MS
    }
    pub fn idle_timeout_ms() -> u64 {
        constants::DEFAULT_IDLE_TIMEOUT_MS
    }
    pub fn batch_soft_deadline_ms() -> u64 {
        constants::DEFAULT_BATCH_SOFT_DEADLINE_MS
    }
    pub fn batch_hard_deadline_ms() -> u64 {
        constants::DEFAULT_BATCH_HARD_DEADLINE_MS
    }
    pub fn worker_stall_ms() -> u64 {
        constants::DEFAULT_WORKER_STALL_MS
    }
    pub fn model_id() -> String {
        "bge-small-en-v1.5".to_string()
    }
    pub fn worker_command() -> String {
        "embed-worker-model".to_string()
    }
}

/// Full server configuration, covering every field in spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(default = "defaults::port")]
    pub port: u16,
    #[serde(default = "defaults::max_workers")]
    pub max_workers: usize,
    #[serde(default = "defaults::max_batch_size")]
    pub max_batch_size: usize,
    /// Queue depth above which `Submit` fails fast with `Overloaded`.
    /// Defaults to `4 * max_workers`, computed at load time if absent.
    pub queue_high_water: Option<usize>,
    #[serde(default = "defaults::cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "defaults::dim")]
    pub dim: usize,
    #[serde(default = "defaults::no_clients_timeout_ms")]
    pub no_clients_timeout_ms: u64,
    #[serde(default = "defaults::idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(default = "defaults::batch_soft_deadline_ms")]
    pub batch_soft_deadline_ms: u64,
    #[serde(default = "defaults::batch_hard_deadline_ms")]
    pub batch_hard_deadline_ms: u64,
    #[serde(default = "defaults::worker_stall_ms")]
    pub worker_stall_ms: u64,
    /// Identifies which embedding function the pool's workers implement.
    /// Cache entries produced under a different id are invisible to readers.
    #[serde(default = "defaults::model_id")]
    pub model_id: String,
    /// Command line used to spawn one worker child process.
    #[serde(default = "defaults::worker_command")]
    pub worker_command: String,
    /// Directory under which the on-disk cache shard lives. Defaults to a
    /// user-home subdirectory keyed by a stable repository hash, chosen by
    /// the caller (the CLI binary) since this crate has no notion of "the
    /// current repository".
    pub cache_dir: Option<std::path::PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            max_workers: defaults::max_workers(),
            max_batch_size: defaults::max_batch_size(),
            queue_high_water: None,
            cache_capacity: defaults::cache_capacity(),
            dim: defaults::dim(),
            no_clients_timeout_ms: defaults::no_clients_timeout_ms(),
            idle_timeout_ms: defaults::idle_timeout_ms(),
            batch_soft_deadline_ms: defaults::batch_soft_deadline_ms(),
            batch_hard_deadline_ms: defaults::batch_hard_deadline_ms(),
            worker_stall_ms: defaults::worker_stall_ms(),
            model_id: defaults::model_id(),
            worker_command: defaults::worker_command(),
            cache_dir: None,
        }
    }
}

impl ServerConfig {
    /// Effective queue high-water mark: the configured value, or
    /// `4 * max_workers` if unset.
    pub fn effective_queue_high_water(&self) -> usize {
        self.queue_high_water
            .unwrap_or(self.max_workers * defaults::queue_high_water_multiplier())
    }

    /// Parse configuration from a TOML document. Missing fields take their
    /// documented default.
    pub fn from_toml_str(s: &str) -> EmbedResult<Self> {
        toml::from_str(s).map_err(|e| EmbedError::invalid_input(format!("invalid config: {e}")))
    }

    /// Apply `EMBED_*` environment variable overrides on top of a loaded
    /// config. Unset variables leave the corresponding field untouched.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("EMBED_PORT") {
            if let Ok(p) = v.parse() {
                self.port = p;
            }
        }
        if let Ok(v) = std::env::var("EMBED_MAX_WORKERS") {
            if let Ok(n) = v.parse() {
                self.max_workers = n;
            }
        }
        if let Ok(v) = std::env::var("EMBED_CACHE_CAPACITY") {
            if let Ok(n) = v.parse() {
                self.cache_capacity = n;
            }
        }
        if let Ok(v) = std::env::var("EMBED_CACHE_DIR") {
            self.cache_dir = Some(std::path::PathBuf::from(v));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 8766);
        assert_eq!(cfg.max_batch_size, 800);
        assert_eq!(cfg.cache_capacity, 10_000);
        assert_eq!(cfg.dim, 384);
        assert_eq!(cfg.no_clients_timeout_ms, 300_000);
        assert_eq!(cfg.idle_timeout_ms, 1_800_000);
    }

    #[test]
    fn queue_high_water_defaults_to_four_times_workers() {
        let mut cfg = ServerConfig::default();
        cfg.max_workers = 4;
        assert_eq!(cfg.effective_queue_high_water(), 16);
    }

    #[test]
    fn explicit_queue_high_water_overrides_default() {
        let mut cfg = ServerConfig::default();
        cfg.max_workers = 4;
        cfg.queue_high_water = Some(99);
        assert_eq!(cfg.effective_queue_high_water(), 99);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg = ServerConfig::from_toml_str("port = 9000\n").unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.max_batch_size, 800);
    }

    #[test]
    fn invalid_toml_is_rejected() {
        assert!(ServerConfig::from_toml_str("not valid [[[ toml").is_err());
    }
}
