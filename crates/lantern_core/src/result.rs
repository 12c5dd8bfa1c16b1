//! Result type alias for Lantern operations

use crate::error::Error;

/// A specialized Result type for Lantern operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
