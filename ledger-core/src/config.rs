//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// How long a caller may wait for an account's writer right (milliseconds)
    pub lock_timeout_ms: u64,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            lock_timeout_ms: 3_000,
            rocksdb: RocksDBConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// fsync the WAL on every commit
    pub sync_writes: bool,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            sync_writes: true,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("GREENMILES_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(timeout) = std::env::var("GREENMILES_LEDGER_LOCK_TIMEOUT_MS") {
            config.lock_timeout_ms = timeout.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid GREENMILES_LEDGER_LOCK_TIMEOUT_MS: {}", e))
            })?;
        }

        Ok(config)
    }

    /// Writer-right timeout as a Duration
    pub fn lock_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.lock_timeout_ms, 3_000);
        assert!(config.rocksdb.sync_writes);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("lock_timeout_ms = 250\n").unwrap();
        assert_eq!(config.lock_timeout_ms, 250);
        assert_eq!(config.data_dir, PathBuf::from("./data/ledger"));
    }
}
