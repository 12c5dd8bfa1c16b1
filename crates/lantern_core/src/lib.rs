//! Lantern Core
//!
//! Core types, errors, and telemetry shared across all Lantern crates.

pub mod error;
pub mod id;
pub mod result;
pub mod telemetry;

// Re-exports for convenience
pub use error::{Error, ErrorContext, ErrorKind};
pub use id::{ProjectId, SessionId};
pub use result::Result;

/// Application-wide constants
pub mod constants {
    /// Default per-request timeout for fast language servers (seconds)
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: f64 = 30.0;

    /// Default per-request timeout for Bundler-based Ruby servers (seconds)
    pub const BUNDLER_REQUEST_TIMEOUT_SECS: f64 = 120.0;

    /// Ceiling on post-`initialized` indexing before a session is forced ready (seconds)
    pub const DEFAULT_INDEXING_TIMEOUT_SECS: f64 = 120.0;

    /// Grace period after `shutdown`/`exit` before the child is terminated (seconds)
    pub const SHUTDOWN_GRACE_SECS: u64 = 5;

    /// Directory names pruned from symbol trees and reference lists in every language
    pub const COMMON_IGNORED_DIRS: &[&str] = &[".git", ".hg", ".svn", "node_modules", "__pycache__"];
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, ErrorContext, ErrorKind};
    pub use crate::id::*;
    pub use crate::result::Result;
    pub use anyhow::Context as AnyhowContext;
    pub use tracing::{debug, error, info, instrument, trace, warn};
}
