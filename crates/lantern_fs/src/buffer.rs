//! In-memory file buffer cache with stat-based invalidation
//!
//! The cache exclusively owns one entry per workspace-relative path. Callers
//! acquire scoped [`FileHandle`]s; the entry stays resident while at least
//! one handle is alive and the last release evicts it. Every read through a
//! handle revalidates the on-disk `(mtime, size)` stamp, so externally
//! mutated files are picked up without any notification machinery.

use lantern_core::prelude::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::stamp::FileStamp;

/// Immutable snapshot of a file's contents at a point in time
#[derive(Debug, Clone)]
pub struct FileBuffer {
  /// Full file contents
  pub contents: Arc<str>,
  /// On-disk stamp at load time
  pub stamp: FileStamp,
  /// Bumped every time the cache re-reads the file
  pub generation: u64,
}

struct CacheEntry {
  buffer: FileBuffer,
  refs: usize,
  /// Forces a re-read on the next access regardless of the stamp
  dirty: bool,
}

/// Cache of open file buffers, keyed by workspace-relative path
pub struct FileBufferCache {
  root: PathBuf,
  entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl FileBufferCache {
  /// Create a cache rooted at the workspace directory
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      entries: Mutex::new(HashMap::new()),
    }
  }

  /// The workspace root this cache serves
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Normalize a caller-supplied path to the workspace-relative cache key.
  ///
  /// Absolute paths inside the root are accepted and re-relativized; paths
  /// escaping the root are rejected.
  pub fn relativize(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let rel = if path.is_absolute() {
      path
        .strip_prefix(&self.root)
        .map_err(|_| Error::PathOutsideWorkspace {
          path: path.to_path_buf(),
        })?
        .to_path_buf()
    } else {
      path.to_path_buf()
    };

    if rel
      .components()
      .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir))
    {
      return Err(Error::PathOutsideWorkspace {
        path: path.to_path_buf(),
      });
    }
    Ok(rel)
  }

  /// Acquire a scoped handle on a file, loading it on first open.
  ///
  /// Concurrent acquisitions of the same path share one entry.
  pub fn open(self: &Arc<Self>, path: impl AsRef<Path>) -> Result<FileHandle> {
    let rel = self.relativize(path)?;
    {
      let mut entries = self.entries.lock();
      if let Some(entry) = entries.get_mut(&rel) {
        entry.refs += 1;
      } else {
        let buffer = self.load(&rel, 0)?;
        entries.insert(
          rel.clone(),
          CacheEntry {
            buffer,
            refs: 1,
            dirty: false,
          },
        );
      }
    }
    Ok(FileHandle {
      cache: Arc::clone(self),
      rel,
    })
  }

  /// Current snapshot of a cached file, revalidating the stamp first.
  ///
  /// Re-reads are idempotent, so racing an external edit is safe: the caller
  /// gets either the old or the new snapshot, never a torn one.
  pub fn snapshot(&self, rel: &Path) -> Result<FileBuffer> {
    let mut entries = self.entries.lock();
    let entry = entries
      .get_mut(rel)
      .ok_or_else(|| Error::FileNotFound {
        path: rel.to_path_buf(),
      })?;

    let stale = entry
      .buffer
      .stamp
      .is_stale(&self.root.join(rel))
      .map_err(|_| Error::FileNotFound {
        path: rel.to_path_buf(),
      })?;

    if entry.dirty || stale {
      let generation = entry.buffer.generation + 1;
      entry.buffer = self.load(rel, generation)?;
      entry.dirty = false;
      debug!(path = %rel.display(), generation, "File buffer reloaded");
    }
    Ok(entry.buffer.clone())
  }

  /// Mark a file so the next access re-reads it (external touch signal)
  pub fn invalidate(&self, path: impl AsRef<Path>) {
    if let Ok(rel) = self.relativize(path) {
      if let Some(entry) = self.entries.lock().get_mut(&rel) {
        entry.dirty = true;
      }
    }
  }

  /// Number of resident entries
  pub fn len(&self) -> usize {
    self.entries.lock().len()
  }

  /// Whether the cache holds no entries
  pub fn is_empty(&self) -> bool {
    self.entries.lock().is_empty()
  }

  fn load(&self, rel: &Path, generation: u64) -> Result<FileBuffer> {
    let abs = self.root.join(rel);
    let stamp = FileStamp::read(&abs).map_err(|_| Error::FileNotFound { path: abs.clone() })?;
    let bytes = std::fs::read(&abs).map_err(|_| Error::FileNotFound { path: abs.clone() })?;
    let contents = String::from_utf8(bytes).map_err(|_| Error::InvalidEncoding { path: abs })?;
    Ok(FileBuffer {
      contents: contents.into(),
      stamp,
      generation,
    })
  }

  fn release(&self, rel: &Path) {
    let mut entries = self.entries.lock();
    if let Some(entry) = entries.get_mut(rel) {
      entry.refs -= 1;
      if entry.refs == 0 {
        entries.remove(rel);
      }
    }
  }
}

/// Scoped handle on a cached file.
///
/// Dropping the handle releases the entry; the last holder evicts it.
pub struct FileHandle {
  cache: Arc<FileBufferCache>,
  rel: PathBuf,
}

impl FileHandle {
  /// The workspace-relative path of this file
  pub fn path(&self) -> &Path {
    &self.rel
  }

  /// Current contents, revalidated against the on-disk stamp
  pub fn contents(&self) -> Result<Arc<str>> {
    Ok(self.cache.snapshot(&self.rel)?.contents)
  }

  /// Current snapshot including the generation counter
  pub fn snapshot(&self) -> Result<FileBuffer> {
    self.cache.snapshot(&self.rel)
  }
}

impl Drop for FileHandle {
  fn drop(&mut self) {
    self.cache.release(&self.rel);
  }
}
