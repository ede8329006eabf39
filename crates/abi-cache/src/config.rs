//! Cache configuration and TOML loading.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Size and expiry policy of a [`DiffCache`](crate::DiffCache).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached results; least recently used are evicted first.
    pub max_entries: usize,
    /// Idle time after the last access before a result expires.
    pub idle_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            idle_timeout_ms: 120_000,
        }
    }
}

/// Layout of a configuration file: everything lives under `[cache]`.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    cache: CacheConfig,
}

impl CacheConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Parse and validate a TOML document with a `[cache]` table.
    pub fn from_toml_str(content: &str) -> CacheResult<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| CacheError::ConfigParse(e.to_string()))?;
        file.cache.validate()?;
        Ok(file.cache)
    }

    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> CacheResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CacheError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.max_entries == 0 {
            return Err(CacheError::InvalidConfig(
                "max_entries must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
