//! Error types for loading and driving the guest
//!
//! Provides detailed error information for debugging and user feedback.

use crate::platform::PlatformError;
use std::fmt;

/// Result type for loader operations
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors that can occur while fetching, validating, or instantiating the guest
///
/// All of these are fatal: the frame driver never starts after one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Artifact could not be fetched at all
    Fetch { path: String, reason: String },

    /// Artifact request completed with a non-success status
    HttpStatus { path: String, status: u16 },

    /// Module binary is malformed or invalid
    InvalidModule { reason: String },

    /// Module imports something the host does not provide
    UnresolvedImport { module: String, name: String },

    /// The color callback import has the wrong signature
    ImportSignatureMismatch {
        name: String,
        expected: &'static str,
        got: String,
    },

    /// Required export is missing
    MissingExport { name: String },

    /// Export has wrong type
    WrongExportType {
        name: String,
        expected: String,
        got: String,
    },

    /// Module instantiation failed
    InstantiationFailed { reason: String },

    /// Fetch + instantiate did not finish in time
    Timeout { ms: u32 },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch { path, reason } => {
                write!(f, "failed to fetch '{}': {}", path, reason)
            }
            Self::HttpStatus { path, status } => {
                write!(f, "fetching '{}' returned HTTP {}", path, status)
            }
            Self::InvalidModule { reason } => {
                write!(f, "invalid WASM module: {}", reason)
            }
            Self::UnresolvedImport { module, name } => {
                write!(f, "unresolved import: '{}.{}'", module, name)
            }
            Self::ImportSignatureMismatch {
                name,
                expected,
                got,
            } => {
                write!(
                    f,
                    "import '{}' has wrong signature: expected {}, got {}",
                    name, expected, got
                )
            }
            Self::MissingExport { name } => {
                write!(f, "missing required export: '{}'", name)
            }
            Self::WrongExportType {
                name,
                expected,
                got,
            } => {
                write!(
                    f,
                    "export '{}' has wrong type: expected {}, got {}",
                    name, expected, got
                )
            }
            Self::InstantiationFailed { reason } => {
                write!(f, "module instantiation failed: {}", reason)
            }
            Self::Timeout { ms } => {
                write!(f, "module load timed out after {} ms", ms)
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// A guest-declared byte window that does not fit in current memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsError {
    pub address: u32,
    pub size: u32,
    pub memory_size: u64,
}

impl fmt::Display for BoundsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory access out of bounds: address {} + size {} > memory size {}",
            self.address, self.size, self.memory_size
        )
    }
}

impl std::error::Error for BoundsError {}

/// Errors local to a single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickError {
    /// The color callback was handed an out-of-bounds offset
    Bounds(BoundsError),

    /// Writing to the page failed
    Present(PlatformError),

    /// The guest trapped or threw during the frame export
    Trap { reason: String },
}

impl fmt::Display for TickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounds(e) => write!(f, "color callback: {}", e),
            Self::Present(e) => write!(f, "presentation failed: {}", e),
            Self::Trap { reason } => write!(f, "guest trapped: {}", reason),
        }
    }
}

impl std::error::Error for TickError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bounds(e) => Some(e),
            Self::Present(e) => Some(e),
            Self::Trap { .. } => None,
        }
    }
}

impl From<BoundsError> for TickError {
    fn from(e: BoundsError) -> Self {
        Self::Bounds(e)
    }
}

impl From<PlatformError> for TickError {
    fn from(e: PlatformError) -> Self {
        Self::Present(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoadError::MissingExport {
            name: "memory".to_string(),
        };
        assert_eq!(err.to_string(), "missing required export: 'memory'");

        let err = LoadError::UnresolvedImport {
            module: "env".to_string(),
            name: "abort".to_string(),
        };
        assert_eq!(err.to_string(), "unresolved import: 'env.abort'");

        let err = BoundsError {
            address: 65534,
            size: 3,
            memory_size: 65536,
        };
        assert!(err.to_string().contains("65534"));
        assert!(err.to_string().contains("65536"));
    }

    #[test]
    fn test_tick_error_source() {
        use std::error::Error;

        let err = TickError::from(BoundsError {
            address: 10,
            size: 3,
            memory_size: 8,
        });
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("color callback:"));

        let err = TickError::Trap {
            reason: "unreachable".to_string(),
        };
        assert!(err.source().is_none());
    }
}
