//! Lantern Diff
//!
//! Deterministic unified-diff previews for proposed edits, plus the
//! process-wide "latest preview" slot consumed by dashboards and tools.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use similar::TextDiff;

/// A rendered preview of a proposed change to one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffPreview {
  /// Workspace-relative path shown in the diff headers
  pub file_path: String,
  /// Symbol being replaced, when the edit targets one
  pub symbol_name: Option<String>,
  /// Unified diff text with `a/<path>` / `b/<path>` headers
  pub unified_diff: String,
  /// Count of `+` lines (excluding the `+++` header)
  pub lines_added: usize,
  /// Count of `-` lines (excluding the `---` header)
  pub lines_removed: usize,
  /// When this preview was generated
  pub created_at: DateTime<Utc>,
}

/// Generates diff previews and holds the latest one.
///
/// The slot is per core instance, not per server session; writers race and
/// the last one wins.
#[derive(Default)]
pub struct DiffManager {
  latest: Mutex<Option<DiffPreview>>,
}

impl DiffManager {
  pub fn new() -> Self {
    Self::default()
  }

  /// Overwrite the latest-preview slot
  pub fn set_latest(&self, preview: DiffPreview) {
    *self.latest.lock() = Some(preview);
  }

  /// Read the latest preview, if any
  pub fn get_latest(&self) -> Option<DiffPreview> {
    self.latest.lock().clone()
  }

  /// Empty the latest-preview slot
  pub fn clear_latest(&self) {
    *self.latest.lock() = None;
  }

  /// Generate a preview diff between old and new content.
  ///
  /// Output is stable: identical inputs yield byte-identical diffs, and
  /// equal sides yield an empty diff with zero counters.
  pub fn generate_diff_preview(
    old_content: &str,
    new_content: &str,
    file_path: &str,
    symbol_name: Option<&str>,
  ) -> DiffPreview {
    let diff = TextDiff::from_lines(old_content, new_content);
    let unified = diff
      .unified_diff()
      .header(&format!("a/{}", file_path), &format!("b/{}", file_path))
      .to_string();
    // No trailing blank line terminator
    let unified = unified.trim_end_matches('\n').to_string();

    let mut lines_added = 0;
    let mut lines_removed = 0;
    for line in unified.lines() {
      if line.starts_with('+') && !line.starts_with("+++") {
        lines_added += 1;
      } else if line.starts_with('-') && !line.starts_with("---") {
        lines_removed += 1;
      }
    }

    DiffPreview {
      file_path: file_path.to_string(),
      symbol_name: symbol_name.map(String::from),
      unified_diff: unified,
      lines_added,
      lines_removed,
      created_at: Utc::now(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_identical_content_is_empty() {
    let preview =
      DiffManager::generate_diff_preview("a\nb\nc\n", "a\nb\nc\n", "lib.rb", Some("A"));
    assert_eq!(preview.unified_diff, "");
    assert_eq!(preview.lines_added, 0);
    assert_eq!(preview.lines_removed, 0);
  }

  #[test]
  fn test_counts_single_line_replacement() {
    let old = "fn main() {\n    println!(\"hello\");\n}\n";
    let new = "fn main() {\n    println!(\"goodbye\");\n}\n";
    let preview = DiffManager::generate_diff_preview(old, new, "src/main.rs", None);

    assert_eq!(preview.lines_added, 1);
    assert_eq!(preview.lines_removed, 1);
    assert!(preview.unified_diff.starts_with("--- a/src/main.rs\n+++ b/src/main.rs\n"));
  }

  #[test]
  fn test_unified_output_is_stable() {
    let old = "fn main() {\n    println!(\"hello\");\n}\n";
    let new = "fn main() {\n    println!(\"goodbye\");\n}\n";
    let first = DiffManager::generate_diff_preview(old, new, "src/main.rs", None);
    let second = DiffManager::generate_diff_preview(old, new, "src/main.rs", None);
    assert_eq!(first.unified_diff, second.unified_diff);

    insta::assert_snapshot!(first.unified_diff, @r###"
    --- a/src/main.rs
    +++ b/src/main.rs
    @@ -1,3 +1,3 @@
     fn main() {
    -    println!("hello");
    +    println!("goodbye");
     }
    "###);
  }

  #[test]
  fn test_pure_addition() {
    let preview = DiffManager::generate_diff_preview("a\n", "a\nb\nc\n", "notes.md", None);
    assert_eq!(preview.lines_added, 2);
    assert_eq!(preview.lines_removed, 0);
  }

  #[test]
  fn test_latest_slot_roundtrip() {
    let manager = DiffManager::new();
    assert!(manager.get_latest().is_none());

    let preview = DiffManager::generate_diff_preview("x\n", "y\n", "f.txt", Some("sym"));
    manager.set_latest(preview.clone());
    assert_eq!(manager.get_latest(), Some(preview));

    manager.clear_latest();
    assert!(manager.get_latest().is_none());
  }

  #[test]
  fn test_latest_slot_last_writer_wins() {
    let manager = DiffManager::new();
    let first = DiffManager::generate_diff_preview("1\n", "2\n", "a.txt", None);
    let second = DiffManager::generate_diff_preview("3\n", "4\n", "b.txt", None);
    manager.set_latest(first);
    manager.set_latest(second.clone());
    assert_eq!(manager.get_latest(), Some(second));
  }

  proptest::proptest! {
    /// added - removed always equals the line-count delta between the sides
    #[test]
    fn prop_count_delta_matches_line_delta(
      old in proptest::collection::vec("[ab]{0,3}", 0..8),
      new in proptest::collection::vec("[ab]{0,3}", 0..8),
    ) {
      let old_text = old.iter().map(|l| format!("{}\n", l)).collect::<String>();
      let new_text = new.iter().map(|l| format!("{}\n", l)).collect::<String>();
      let preview = DiffManager::generate_diff_preview(&old_text, &new_text, "p.txt", None);

      let delta = preview.lines_added as i64 - preview.lines_removed as i64;
      proptest::prop_assert_eq!(delta, new.len() as i64 - old.len() as i64);
    }

    /// equal sides always produce an empty diff
    #[test]
    fn prop_equal_sides_empty(lines in proptest::collection::vec("[abc]{0,4}", 0..10)) {
      let text = lines.iter().map(|l| format!("{}\n", l)).collect::<String>();
      let preview = DiffManager::generate_diff_preview(&text, &text, "p.txt", None);
      proptest::prop_assert_eq!(preview.unified_diff, "");
      proptest::prop_assert_eq!(preview.lines_added, 0);
      proptest::prop_assert_eq!(preview.lines_removed, 0);
    }
  }
}
