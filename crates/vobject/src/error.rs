//! Error Module - Vobject Error Types
//!
//! Defines the error types returned by allocation entry points and by the
//! region/allocator collaborator.
//!
//! # Error Categories
//!
//! ## Allocation Errors
//! - `OutOfMemory` - Allocator could not satisfy the request
//! - `InvalidArgument` - Request rejected before touching memory
//!
//! ## Region Errors
//! - `NoOpenRegion` - Plain allocation with no ambient region
//! - `RegionReleased` - Region was already torn down
//! - `UnknownRegion` - No region is rooted at the given object
//!
//! ## Configuration Errors
//! - `Configuration` - Invalid configuration
//! - `AlreadyInitialized` - Process configuration installed twice
//!
//! Caller bugs (an oversized owner request smaller than the payload
//! footprint, an over-aligned payload type) are not represented here. They
//! panic through [`assert_context!`](crate::assert_context).

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for all vobject operations
///
/// # Examples
///
/// ```rust
/// use vobject::VobjectError;
///
/// fn handle_error(err: VobjectError) {
///     match err {
///         VobjectError::OutOfMemory { requested, available } => {
///             eprintln!("OOM: requested {}, available {}", requested, available);
///         }
///         VobjectError::NoOpenRegion => {
///             eprintln!("open a region before allocating plain objects");
///         }
///         _ => {
///             eprintln!("Other error: {}", err);
///         }
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum VobjectError {
    /// Out of memory - allocator exhaustion
    ///
    /// **When returned:** The thread-local, explicit or region allocator
    /// cannot hand out `requested` bytes. No partial object exists.
    ///
    /// **Recovery strategy:** Release regions, use a larger arena, or fail
    #[error("Out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    /// Invalid argument
    ///
    /// **When returned:** A size or alignment fails validation before any
    /// memory is acquired (zero-sized chunk, non power-of-two alignment)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Plain allocation requested with no region open on this thread
    ///
    /// **Recovery strategy:** Open the target region with
    /// [`RegionContext::open`](crate::region::RegionContext::open)
    #[error("No region is open on the current thread")]
    NoOpenRegion,

    /// The region has already been released
    #[error("Region rooted at {root:#x} has been released")]
    RegionReleased { root: usize },

    /// No live region is rooted at the given object
    #[error("No region is rooted at {root:#x}")]
    UnknownRegion { root: usize },

    /// Configuration error
    ///
    /// **When returned:** `init_with_config` rejects the configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Process configuration was already installed
    #[error("Runtime configuration already initialized")]
    AlreadyInitialized,

    /// Internal error - indicates a bug in vobject
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VobjectError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VobjectError::OutOfMemory { .. } | VobjectError::NoOpenRegion
        )
    }

    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(self, VobjectError::Internal(_))
    }
}

impl From<ConfigError> for VobjectError {
    fn from(err: ConfigError) -> Self {
        VobjectError::Configuration(err.to_string())
    }
}

/// Result type alias for vobject operations
pub type Result<T> = std::result::Result<T, VobjectError>;

/// Assertion for caller-bug preconditions, with context
///
/// These are programming errors, never recoverable conditions, so they
/// abort the calling thread instead of surfacing as an `Err`.
#[macro_export]
macro_rules! assert_context {
    ($cond:expr, $context:expr) => {
        if !$cond {
            panic!("Assertion failed at {}: {}", stringify!($cond), $context);
        }
    };
    ($cond:expr, $context:expr, $($arg:tt)*) => {
        if !$cond {
            panic!("Assertion failed at {}: {}", stringify!($cond), format!($context, $($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_memory_is_recoverable() {
        let err = VobjectError::OutOfMemory {
            requested: 64,
            available: 8,
        };
        assert!(err.is_recoverable());
        assert!(!err.is_bug());
        assert_eq!(
            err.to_string(),
            "Out of memory: requested 64 bytes, available 8 bytes"
        );
    }

    #[test]
    fn test_internal_is_bug() {
        let err = VobjectError::Internal("torn header".to_string());
        assert!(err.is_bug());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: VobjectError = ConfigError::InvalidTlabSize("zero".to_string()).into();
        assert!(matches!(err, VobjectError::Configuration(_)));
    }

    #[test]
    #[should_panic(expected = "Assertion failed")]
    fn test_assert_context_panics() {
        let requested = 8;
        assert_context!(requested >= 16, "requested {} < footprint {}", requested, 16);
    }
}
