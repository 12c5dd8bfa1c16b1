//! Change stamps for cache invalidation

use std::path::Path;
use std::time::SystemTime;

/// What the cache remembers about a file's on-disk state.
///
/// Mtime alone is not enough: ext4 and tmpfs only guarantee 1-second
/// resolution, so two writes inside the same second look identical. Pairing
/// mtime with the byte size catches the common cases; callers that rewrite a
/// file to the same length within one second must use an explicit
/// invalidation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
  pub mtime: SystemTime,
  pub size: u64,
}

impl FileStamp {
  /// Read the current stamp of a file on disk
  pub fn read(path: &Path) -> std::io::Result<Self> {
    let metadata = std::fs::metadata(path)?;
    Ok(Self {
      mtime: metadata.modified()?,
      size: metadata.len(),
    })
  }

  /// Whether the file on disk no longer matches this stamp
  pub fn is_stale(&self, path: &Path) -> std::io::Result<bool> {
    Ok(Self::read(path)? != *self)
  }
}
