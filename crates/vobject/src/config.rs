//! Configuration Module - Allocation Tuning Parameters
//!
//! Manages the sizing parameters of the thread-local allocation buffers,
//! the large-object path and region/arena chunks.

use crate::error::{Result, VobjectError};
use crate::util::constants::{KB, MB};
use std::sync::OnceLock;

/// Main configuration for the allocation layer
///
/// # Examples
///
/// ```rust
/// use vobject::RuntimeConfig;
///
/// let config = RuntimeConfig {
///     tlab_size: 64 * 1024,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Thread-local allocation buffer size in bytes
    ///
    /// Each thread carves owner allocations out of a buffer of this size.
    /// Default: 256KB
    pub tlab_size: usize,

    /// Threshold for large objects (bytes)
    ///
    /// Thread-local requests above this size bypass the TLAB and get a
    /// dedicated chunk. Must not exceed `tlab_size`.
    /// Default: 16KB
    pub large_threshold: usize,

    /// Chunk size used by regions for their member objects
    ///
    /// Default: 64KB
    pub region_chunk_size: usize,

    /// Default chunk size for explicit arenas
    ///
    /// Default: 256KB
    pub arena_chunk_size: usize,

    /// Enable verbose allocation logging
    ///
    /// Default: false
    pub verbose: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            tlab_size: 256 * KB,
            large_threshold: 16 * KB,
            region_chunk_size: 64 * KB,
            arena_chunk_size: 256 * KB,
            verbose: false,
        }
    }
}

impl RuntimeConfig {
    /// Validate configuration
    ///
    /// ```rust
    /// use vobject::RuntimeConfig;
    ///
    /// let config = RuntimeConfig {
    ///     tlab_size: 0,
    ///     ..Default::default()
    /// };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.tlab_size < 4 * KB {
            return Err(ConfigError::InvalidTlabSize(
                "tlab_size must be at least 4KB".to_string(),
            ));
        }

        if self.tlab_size > 64 * MB {
            return Err(ConfigError::InvalidTlabSize(
                "tlab_size must not exceed 64MB".to_string(),
            ));
        }

        if self.large_threshold == 0 || self.large_threshold > self.tlab_size {
            return Err(ConfigError::InvalidThreshold(
                "large_threshold must be in 1..=tlab_size".to_string(),
            ));
        }

        if self.region_chunk_size < KB {
            return Err(ConfigError::InvalidChunkSize(
                "region_chunk_size must be at least 1KB".to_string(),
            ));
        }

        if self.arena_chunk_size < KB {
            return Err(ConfigError::InvalidChunkSize(
                "arena_chunk_size must be at least 1KB".to_string(),
            ));
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - VOBJECT_TLAB_SIZE
    /// - VOBJECT_LARGE_THRESHOLD
    /// - VOBJECT_REGION_CHUNK
    /// - VOBJECT_ARENA_CHUNK
    /// - VOBJECT_VERBOSE
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(size) = env_usize("VOBJECT_TLAB_SIZE") {
            config.tlab_size = size;
        }

        if let Some(size) = env_usize("VOBJECT_LARGE_THRESHOLD") {
            config.large_threshold = size;
        }

        if let Some(size) = env_usize("VOBJECT_REGION_CHUNK") {
            config.region_chunk_size = size;
        }

        if let Some(size) = env_usize("VOBJECT_ARENA_CHUNK") {
            config.arena_chunk_size = size;
        }

        if let Ok(val) = std::env::var("VOBJECT_VERBOSE") {
            config.verbose = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse::<usize>().ok()
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TLAB size: {0}")]
    InvalidTlabSize(String),

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),
}

static CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// Install the process configuration
///
/// Fails if the configuration is invalid or if one was already installed,
/// either explicitly or lazily by a first allocation.
pub fn install(config: RuntimeConfig) -> Result<()> {
    config.validate()?;

    let mut installed = false;
    CONFIG.get_or_init(|| {
        installed = true;
        config
    });

    if installed {
        Ok(())
    } else {
        Err(VobjectError::AlreadyInitialized)
    }
}

/// Get the process configuration
///
/// Falls back to [`RuntimeConfig::from_env`], or to the defaults when the
/// environment holds an invalid combination.
pub fn current() -> &'static RuntimeConfig {
    CONFIG.get_or_init(|| {
        let config = RuntimeConfig::from_env();
        match config.validate() {
            Ok(()) => config,
            Err(e) => {
                log::warn!("Ignoring environment configuration: {}", e);
                RuntimeConfig::default()
            },
        }
    })
}
