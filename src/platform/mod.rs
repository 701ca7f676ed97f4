//! Platform Abstraction Layer
//!
//! The callback and the frame driver only talk to the page through the
//! traits defined here:
//!
//! - [`Presenter`]: where a color ends up (page background and label)
//! - [`FrameSource`]: the "next display refresh" event source
//!
//! The browser implementations live in [`web`]. Native builds (and the
//! native test suite) provide their own implementations.

#[cfg(target_arch = "wasm32")]
pub mod web;

use std::future::Future;

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Platform-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// A DOM or browser call failed
    Io(String),
    /// Feature not supported on this platform
    NotSupported(String),
    /// Initialization failed (e.g. a configured element does not exist)
    InitFailed(String),
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::Io(s) => write!(f, "I/O error: {}", s),
            PlatformError::NotSupported(s) => write!(f, "Not supported: {}", s),
            PlatformError::InitFailed(s) => write!(f, "Init failed: {}", s),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Presentation targets on the page
///
/// Calls arrive in a fixed order per color: background first, then label.
pub trait Presenter {
    /// Set the background color style to a CSS color expression
    fn set_background(&mut self, css: &str) -> PlatformResult<()>;

    /// Replace the label's text
    fn set_label(&mut self, text: &str) -> PlatformResult<()>;
}

/// Source of display refresh signals
///
/// Each call resolves once the next frame is due. `None` means the source
/// is gone (page torn down, test script exhausted) and no more frames will
/// come.
pub trait FrameSource {
    /// Wait for the next frame, yielding its timestamp in milliseconds
    fn next_frame(&mut self) -> impl Future<Output = Option<f64>>;
}
