//! Source-file enumeration for symbol-tree walks
//!
//! Symbol trees and directory overviews need one thing from the filesystem:
//! the source files of a workspace, minus everything under an ignored
//! directory. [`SourceScan`] answers that directly, yielding sorted
//! workspace-relative paths so tree builds are deterministic. The ignored
//! set is checked lexically on path segments, never on file contents, which
//! is also what [`is_ignored_path`] exposes for filtering server responses.

use lantern_core::prelude::*;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Lexical check: does any segment of `path` name an ignored directory?
///
/// `vendored.rb` is not confused with `vendor/`; only whole segments match.
pub fn is_ignored_path(path: &Path, ignored_dirs: &[String]) -> bool {
  path.components().any(|c| {
    c.as_os_str()
      .to_str()
      .map(|name| ignored_dirs.iter().any(|d| d == name))
      .unwrap_or(false)
  })
}

/// Enumerates the source files of a workspace
pub struct SourceScan {
  root: PathBuf,
  start: Option<PathBuf>,
  extensions: Vec<String>,
  ignored_dirs: Vec<String>,
}

impl SourceScan {
  /// Scan a whole workspace
  pub fn workspace(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      start: None,
      extensions: Vec::new(),
      ignored_dirs: Vec::new(),
    }
  }

  /// Restrict the scan to one workspace-relative subtree
  pub fn under(mut self, dir: impl Into<PathBuf>) -> Self {
    self.start = Some(dir.into());
    self
  }

  /// Keep only files with these extensions (empty keeps everything)
  pub fn extensions(mut self, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
    self.extensions = extensions.into_iter().map(Into::into).collect();
    self
  }

  /// Prune directories with any of these names
  pub fn ignored_dirs(mut self, dirs: impl IntoIterator<Item = String>) -> Self {
    self.ignored_dirs = dirs.into_iter().collect();
    self
  }

  /// Run the scan, returning sorted workspace-relative file paths
  pub fn files(&self) -> Result<Vec<PathBuf>> {
    let start = match &self.start {
      Some(dir) => self.root.join(dir),
      None => self.root.clone(),
    };

    let mut builder = WalkBuilder::new(&start);
    // Hidden files and gitignored paths stay out, as in any editor view
    builder.standard_filters(true);
    let pruned = self.ignored_dirs.clone();
    builder.filter_entry(move |entry| {
      let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
      !(is_dir
        && entry
          .file_name()
          .to_str()
          .is_some_and(|name| pruned.iter().any(|d| d == name)))
    });

    let mut files = Vec::new();
    for entry in builder.build() {
      let entry = entry.map_err(|e| Error::Internal(format!("workspace scan failed: {}", e)))?;
      if !entry.file_type().is_some_and(|t| t.is_file()) {
        continue;
      }
      let path = entry.into_path();
      if !self.wants(&path) {
        continue;
      }
      if let Ok(rel) = path.strip_prefix(&self.root) {
        files.push(rel.to_path_buf());
      }
    }

    files.sort();
    Ok(files)
  }

  fn wants(&self, path: &Path) -> bool {
    if self.extensions.is_empty() {
      return true;
    }
    path
      .extension()
      .and_then(|e| e.to_str())
      .is_some_and(|ext| self.extensions.iter().any(|want| want == ext))
  }
}
