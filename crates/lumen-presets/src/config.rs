//! Scheduler configuration.
//!
//! Loaded from TOML; every field has a default, so an empty file is valid:
//!
//! ```toml
//! lock_retries = 5
//! retry_delay_ms = 50
//! quiesce_frames = 2
//! frame_time_ms = 42
//! buffer_capacity = 32768
//! protected_ids = [1, 2]
//! seed_factory = true
//!
//! [ram_cache]
//! enabled = true
//! budget_bytes = 16384
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lumen_core::PresetId;
use lumen_store::{AcquireMode, FACTORY_PROTECTED_IDS, RamCache};

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A field holds an unusable value
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Description of why the value is invalid.
        reason: String,
    },
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Quick-slot RAM cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RamCacheConfig {
    /// Serve the quick slot from RAM when possible.
    pub enabled: bool,
    /// Largest blob the cache accepts, in bytes.
    pub budget_bytes: usize,
}

impl Default for RamCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            budget_bytes: 16 * 1024,
        }
    }
}

/// Tunables for [`PresetScheduler`](crate::PresetScheduler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Extra attempts a save makes to acquire the buffer.
    pub lock_retries: u8,
    /// Delay between buffer acquisition attempts.
    pub retry_delay_ms: u64,
    /// Frames a save waits for the renderer to finish drawing.
    pub quiesce_frames: u32,
    /// Duration of one frame.
    pub frame_time_ms: u64,
    /// Capacity preallocated for the shared buffer.
    pub buffer_capacity: usize,
    /// Ids that can be neither overwritten nor deleted.
    pub protected_ids: Vec<u8>,
    /// Write the factory presets when no durable file exists.
    pub seed_factory: bool,
    /// Quick-slot RAM cache.
    pub ram_cache: RamCacheConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lock_retries: 5,
            retry_delay_ms: 50,
            quiesce_frames: 2,
            frame_time_ms: 42,
            buffer_capacity: 32 * 1024,
            protected_ids: FACTORY_PROTECTED_IDS.to_vec(),
            seed_factory: true,
            ram_cache: RamCacheConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::write_file(parent, e))?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_time_ms == 0 {
            return Err(ConfigError::invalid("frame_time_ms", "must be at least 1"));
        }
        if let Some(bad) = self
            .protected_ids
            .iter()
            .find(|raw| !PresetId::new(**raw).is_persistent())
        {
            return Err(ConfigError::invalid(
                "protected_ids",
                format!("{bad} is outside 1..=250"),
            ));
        }
        Ok(())
    }

    /// How a save acquires the shared buffer.
    pub fn save_acquire_mode(&self) -> AcquireMode {
        AcquireMode::Blocking {
            max_retries: self.lock_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Longest a save waits for an in-flight frame.
    pub fn quiesce_timeout(&self) -> Duration {
        Duration::from_millis(
            self.frame_time_ms
                .saturating_mul(u64::from(self.quiesce_frames))
                .saturating_add(1),
        )
    }

    /// Protected ids as [`PresetId`]s.
    pub fn protected(&self) -> impl Iterator<Item = PresetId> + '_ {
        self.protected_ids.iter().copied().map(PresetId::new)
    }

    /// Build the RAM cache described by this configuration.
    pub fn build_ram_cache(&self) -> RamCache {
        if self.ram_cache.enabled {
            RamCache::new(self.ram_cache.budget_bytes)
        } else {
            RamCache::disabled()
        }
    }
}
