//! External-edit watching
//!
//! Stat-based invalidation can miss a rewrite on filesystems with coarse
//! mtime resolution. [`ChangeWatcher`] closes that gap: every debounced
//! change under the workspace root is fed straight into
//! [`FileBufferCache::invalidate`], so the next read through any handle
//! re-checks the file. Dropping the watcher stops delivery.

use lantern_core::prelude::*;
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::FileBufferCache;

/// Window over which bursts of fs events collapse into one invalidation
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// Marks externally touched buffers dirty
pub struct ChangeWatcher {
  _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl ChangeWatcher {
  /// Watch the cache's workspace root recursively
  pub fn start(cache: Arc<FileBufferCache>) -> Result<Self> {
    let root = cache.root().to_path_buf();

    let mut debouncer = new_debouncer(
      DEBOUNCE_WINDOW,
      None,
      move |outcome: std::result::Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match outcome {
        Ok(events) => {
          for event in &events {
            if !touches_contents(&event.kind) {
              continue;
            }
            for path in &event.paths {
              debug!(path = %path.display(), "External change; invalidating buffer");
              cache.invalidate(path);
            }
          }
        },
        Err(errors) => {
          for error in errors {
            warn!("Watch error: {}", error);
          }
        },
      },
    )
    .map_err(|e| Error::Internal(format!("cannot start change watcher: {}", e)))?;

    debouncer
      .watch(&root, RecursiveMode::Recursive)
      .map_err(|e| Error::Internal(format!("cannot watch {}: {}", root.display(), e)))?;

    info!(root = %root.display(), "Watching workspace for external edits");
    Ok(Self {
      _debouncer: debouncer,
    })
  }
}

/// Which event kinds can alter what a buffer would read.
///
/// Access-time and metadata-only chatter is dropped here so the cache is
/// not invalidated by its own reads.
fn touches_contents(kind: &EventKind) -> bool {
  match kind {
    EventKind::Create(_) | EventKind::Remove(_) => true,
    EventKind::Modify(modify) => !matches!(modify, notify::event::ModifyKind::Metadata(_)),
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use notify::event::{CreateKind, MetadataKind, ModifyKind};
  use tempfile::TempDir;

  #[test]
  fn test_event_classification() {
    assert!(touches_contents(&EventKind::Create(CreateKind::File)));
    assert!(touches_contents(&EventKind::Modify(ModifyKind::Any)));
    assert!(!touches_contents(&EventKind::Modify(ModifyKind::Metadata(
      MetadataKind::AccessTime
    ))));
    assert!(!touches_contents(&EventKind::Access(
      notify::event::AccessKind::Any
    )));
  }

  #[test]
  fn test_start_and_drop() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(FileBufferCache::new(dir.path()));
    let watcher = ChangeWatcher::start(cache).unwrap();
    drop(watcher);
  }
}
