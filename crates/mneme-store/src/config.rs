//! Repository-local configuration (`.mneme/config.json`).

use crate::fsio::{read_optional, write_atomic};
use mneme_core::{ChainPolicy, MemoryError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment override for [`StoreConfig::lock_timeout_ms`].
pub const LOCK_TIMEOUT_ENV: &str = "MNEME_LOCK_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long a writer polls for a branch lock before failing `Busy`.
    pub lock_timeout_ms: u64,
    /// Chained-summary bounds.
    pub chain: ChainPolicy,
    /// Commits shown by branch-level context when the caller gives no limit.
    pub context_depth: usize,
    /// Events shown by trace-level context when the caller gives no limit.
    pub trace_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 2000,
            chain: ChainPolicy::default(),
            context_depth: 5,
            trace_limit: 20,
        }
    }
}

impl StoreConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    /// An unparsable file is `Corrupt`, never silently replaced.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match read_optional(path)? {
            Some(content) => serde_json::from_str(&content)
                .map_err(|e| MemoryError::corrupt(path, format!("invalid config: {e}")))?,
            None => StoreConfig::default(),
        };
        if let Some(ms) = std::env::var(LOCK_TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.lock_timeout_ms = ms;
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| MemoryError::corrupt(path, format!("cannot serialize config: {e}")))?;
        write_atomic(path, format!("{json}\n").as_bytes())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
