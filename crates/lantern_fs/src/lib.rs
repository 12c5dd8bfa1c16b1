//! Lantern File System
//!
//! File buffer caching, source-file enumeration, and external-edit watching.

pub mod buffer;
pub mod stamp;
pub mod walker;
pub mod watcher;

pub use buffer::{FileBuffer, FileBufferCache, FileHandle};
pub use stamp::FileStamp;
pub use walker::{is_ignored_path, SourceScan};
pub use watcher::ChangeWatcher;
