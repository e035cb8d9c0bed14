//! # Memory Configuration
//!
//! Startup settings for the process-wide allocators, loaded once from TOML:
//!
//! ```toml
//! scratch_size = 1048576
//! leak_policy = "fatal"   # or "log"
//! debug_fill = true
//! ```
//!
//! Missing keys fall back to [`MemoryConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};
use crate::scratch::{MAX_RING_SIZE, MIN_RING_SIZE};

/// Default size of the process-wide scratch ring (1 MiB).
pub const DEFAULT_SCRATCH_SIZE: usize = 1024 * 1024;

/// What an allocator does when it is torn down with live allocations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakPolicy {
    /// Log the leak and panic.
    #[default]
    Fatal,
    /// Log the leak and continue.
    Log,
}

/// Settings for [`MemoryGlobals`](crate::MemoryGlobals).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Size of the default scratch ring in bytes.
    pub scratch_size: usize,
    /// Leak handling at shutdown.
    pub leak_policy: LeakPolicy,
    /// Overwrite fresh and released blocks with marker bytes.
    pub debug_fill: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            scratch_size: DEFAULT_SCRATCH_SIZE,
            leak_policy: LeakPolicy::Fatal,
            debug_fill: cfg!(debug_assertions),
        }
    }
}

impl MemoryConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] on malformed TOML or on values
    /// rejected by [`MemoryConfig::validate`].
    pub fn from_toml_str(text: &str) -> MemoryResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| MemoryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] if the file cannot be read or
    /// its contents are rejected.
    pub fn from_file(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MemoryError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks that the values can be used to build the allocators.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] if `scratch_size` is outside
    /// the range a scratch ring supports.
    pub fn validate(&self) -> MemoryResult<()> {
        if !(MIN_RING_SIZE..=MAX_RING_SIZE).contains(&self.scratch_size) {
            return Err(MemoryError::InvalidConfig(format!(
                "scratch_size {} must be between {MIN_RING_SIZE} and {MAX_RING_SIZE}",
                self.scratch_size
            )));
        }
        Ok(())
    }
}
