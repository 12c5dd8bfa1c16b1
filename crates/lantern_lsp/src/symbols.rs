//! Symbol model and position arithmetic
//!
//! LSP-shaped document symbols enriched for the query API: a per-language
//! kind remap applied at ingest, optional body text cut from the buffer
//! cache, and the range arithmetic behind "smallest enclosing symbol".
//! Positions follow LSP's UTF-16 position encoding.

use lsp_types::{DocumentSymbol, DocumentSymbolResponse, Position, Range, SymbolKind, Uri};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A document symbol after ingest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolInfo {
  pub name: String,
  pub kind: SymbolKind,
  pub range: Range,
  pub selection_range: Range,
  pub children: Vec<SymbolInfo>,
  /// Source text of `range`, populated on request
  pub body: Option<String>,
}

impl SymbolInfo {
  /// Convert a hierarchical document symbol, applying the kind remap to the
  /// whole subtree.
  pub fn from_document_symbol(
    symbol: &DocumentSymbol,
    remap: &dyn Fn(SymbolKind) -> SymbolKind,
  ) -> Self {
    Self {
      name: symbol.name.clone(),
      kind: remap(symbol.kind),
      range: symbol.range,
      selection_range: symbol.selection_range,
      children: symbol
        .children
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|child| Self::from_document_symbol(child, remap))
        .collect(),
      body: None,
    }
  }

  /// Convert a whole documentSymbol response. Flat responses (old servers)
  /// lose hierarchy; ranges come from each symbol's location.
  pub fn from_response(
    response: &DocumentSymbolResponse,
    remap: &dyn Fn(SymbolKind) -> SymbolKind,
  ) -> Vec<SymbolInfo> {
    match response {
      DocumentSymbolResponse::Nested(symbols) => symbols
        .iter()
        .map(|s| Self::from_document_symbol(s, remap))
        .collect(),
      DocumentSymbolResponse::Flat(symbols) => symbols
        .iter()
        .map(|s| SymbolInfo {
          name: s.name.clone(),
          kind: remap(s.kind),
          range: s.location.range,
          selection_range: s.location.range,
          children: Vec::new(),
          body: None,
        })
        .collect(),
    }
  }

  /// Pre-order flattening of a symbol forest
  pub fn flatten(roots: &[SymbolInfo]) -> Vec<SymbolInfo> {
    let mut flat = Vec::new();
    fn walk(symbols: &[SymbolInfo], out: &mut Vec<SymbolInfo>) {
      for symbol in symbols {
        out.push(symbol.clone());
        walk(&symbol.children, out);
      }
    }
    walk(roots, &mut flat);
    flat
  }

  /// Shallow info for overviews
  pub fn summary(&self) -> SymbolSummary {
    SymbolSummary {
      name: self.name.clone(),
      kind: self.kind,
      line: self.selection_range.start.line,
    }
  }
}

/// Shallow symbol info returned by overview queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolSummary {
  pub name: String,
  pub kind: SymbolKind,
  pub line: u32,
}

/// A location with workspace-relative path semantics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileLocation {
  pub relative_path: PathBuf,
  pub uri: Uri,
  pub range: Range,
}

/// Node of the directory-shaped full symbol tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SymbolTreeNode {
  Directory {
    name: String,
    children: Vec<SymbolTreeNode>,
  },
  File {
    path: PathBuf,
    symbols: Vec<SymbolInfo>,
  },
}

impl SymbolTreeNode {
  pub fn name(&self) -> String {
    match self {
      SymbolTreeNode::Directory { name, .. } => name.clone(),
      SymbolTreeNode::File { path, .. } => path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default(),
    }
  }
}

/// Build the directory-shaped tree from per-file symbol lists.
///
/// Internal nodes are directories, leaves are file nodes whose children are
/// that file's document symbols. Order is deterministic (path-sorted).
pub fn build_symbol_tree(
  root_name: &str,
  files: Vec<(PathBuf, Vec<SymbolInfo>)>,
) -> SymbolTreeNode {
  #[derive(Default)]
  struct DirNode {
    dirs: BTreeMap<String, DirNode>,
    files: BTreeMap<String, (PathBuf, Vec<SymbolInfo>)>,
  }

  let mut root = DirNode::default();
  for (path, symbols) in files {
    let mut node = &mut root;
    let components: Vec<String> = path
      .components()
      .map(|c| c.as_os_str().to_string_lossy().into_owned())
      .collect();
    let (file_name, dirs) = match components.split_last() {
      Some(split) => split,
      None => continue,
    };
    for dir in dirs {
      node = node.dirs.entry(dir.clone()).or_default();
    }
    node.files.insert(file_name.clone(), (path, symbols));
  }

  fn into_tree(name: String, node: DirNode) -> SymbolTreeNode {
    let mut children: Vec<SymbolTreeNode> = node
      .dirs
      .into_iter()
      .map(|(dir_name, dir)| into_tree(dir_name, dir))
      .collect();
    children.extend(
      node
        .files
        .into_values()
        .map(|(path, symbols)| SymbolTreeNode::File { path, symbols }),
    );
    SymbolTreeNode::Directory { name, children }
  }

  into_tree(root_name.to_string(), root)
}

/// Inclusive range containment in UTF-16 coordinates
pub fn range_contains(range: Range, position: Position) -> bool {
  let start = (range.start.line, range.start.character);
  let end = (range.end.line, range.end.character);
  let point = (position.line, position.character);
  start <= point && point <= end
}

/// The smallest symbol whose range encloses the position.
///
/// Ties resolve to the deepest symbol: a child containing the position wins
/// over its parent.
pub fn find_smallest_enclosing(
  symbols: &[SymbolInfo],
  position: Position,
) -> Option<&SymbolInfo> {
  for symbol in symbols {
    if range_contains(symbol.range, position) {
      return Some(find_smallest_enclosing(&symbol.children, position).unwrap_or(symbol));
    }
  }
  None
}

/// Byte offset of an LSP position (UTF-16 line/character) in `text`
pub fn position_to_offset(text: &str, position: Position) -> Option<usize> {
  let mut line_start = 0usize;
  let mut line_index = 0u32;

  if position.line > 0 {
    let mut found = false;
    for (idx, byte) in text.bytes().enumerate() {
      if byte == b'\n' {
        line_index += 1;
        if line_index == position.line {
          line_start = idx + 1;
          found = true;
          break;
        }
      }
    }
    if !found {
      return None;
    }
  }

  let line = &text[line_start..];
  let mut utf16 = 0u32;
  for (idx, ch) in line.char_indices() {
    if utf16 >= position.character {
      return Some(line_start + idx);
    }
    if ch == '\n' {
      // Position past end of line clamps to the newline
      return Some(line_start + idx);
    }
    utf16 += ch.len_utf16() as u32;
  }
  Some(line_start + line.len())
}

/// Source text covered by `range`
pub fn extract_range(text: &str, range: Range) -> Option<String> {
  let start = position_to_offset(text, range.start)?;
  let end = position_to_offset(text, range.end)?;
  text.get(start..end).map(str::to_string)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pos(line: u32, character: u32) -> Position {
    Position { line, character }
  }

  fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
    Range {
      start: pos(sl, sc),
      end: pos(el, ec),
    }
  }

  fn symbol(name: &str, r: Range, children: Vec<SymbolInfo>) -> SymbolInfo {
    SymbolInfo {
      name: name.to_string(),
      kind: SymbolKind::CLASS,
      range: r,
      selection_range: r,
      children,
      body: None,
    }
  }

  #[test]
  fn test_range_contains_is_inclusive() {
    let r = range(1, 2, 3, 4);
    assert!(range_contains(r, pos(1, 2)));
    assert!(range_contains(r, pos(3, 4)));
    assert!(range_contains(r, pos(2, 0)));
    assert!(!range_contains(r, pos(1, 1)));
    assert!(!range_contains(r, pos(3, 5)));
  }

  #[test]
  fn test_smallest_enclosing_prefers_deepest() {
    let inner = symbol("method", range(2, 2, 4, 3), vec![]);
    let outer = symbol("class", range(0, 0, 10, 3), vec![inner]);
    let roots = vec![outer];

    let hit = find_smallest_enclosing(&roots, pos(3, 0)).unwrap();
    assert_eq!(hit.name, "method");

    let hit = find_smallest_enclosing(&roots, pos(7, 0)).unwrap();
    assert_eq!(hit.name, "class");

    assert!(find_smallest_enclosing(&roots, pos(11, 0)).is_none());
  }

  #[test]
  fn test_enclosing_symbol_contains_position_and_no_deeper_child_does() {
    let grandchild = symbol("g", range(3, 0, 3, 10), vec![]);
    let child = symbol("c", range(2, 0, 5, 0), vec![grandchild]);
    let root = symbol("r", range(0, 0, 9, 0), vec![child]);
    let roots = vec![root];

    let position = pos(4, 2);
    let hit = find_smallest_enclosing(&roots, position).unwrap();
    assert!(range_contains(hit.range, position));
    assert!(!hit
      .children
      .iter()
      .any(|c| range_contains(c.range, position)));
  }

  #[test]
  fn test_position_to_offset_ascii() {
    let text = "abc\ndef\nghi";
    assert_eq!(position_to_offset(text, pos(0, 0)), Some(0));
    assert_eq!(position_to_offset(text, pos(1, 1)), Some(5));
    assert_eq!(position_to_offset(text, pos(2, 3)), Some(11));
    assert_eq!(position_to_offset(text, pos(3, 0)), None);
  }

  #[test]
  fn test_position_to_offset_utf16() {
    // '𝕏' is one surrogate pair: two UTF-16 units, four UTF-8 bytes
    let text = "a𝕏b";
    assert_eq!(position_to_offset(text, pos(0, 1)), Some(1));
    assert_eq!(position_to_offset(text, pos(0, 3)), Some(5));
    assert_eq!(position_to_offset(text, pos(0, 4)), Some(6));
  }

  #[test]
  fn test_extract_range() {
    let text = "class A\n  def m\n    1\n  end\nend\n";
    let body = extract_range(text, range(1, 2, 3, 5)).unwrap();
    assert_eq!(body, "def m\n    1\n  end");
  }

  #[test]
  fn test_flatten_is_preorder() {
    let leaf = symbol("leaf", range(1, 0, 1, 5), vec![]);
    let mid = symbol("mid", range(0, 0, 2, 0), vec![leaf]);
    let top = symbol("top", range(0, 0, 9, 0), vec![mid]);

    let flat = SymbolInfo::flatten(&[top]);
    let names: Vec<_> = flat.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["top", "mid", "leaf"]);
  }

  #[test]
  fn test_build_symbol_tree_shapes_directories() {
    let files = vec![
      (PathBuf::from("lib.rb"), vec![]),
      (PathBuf::from("app/models/user.rb"), vec![]),
      (PathBuf::from("app/helpers.rb"), vec![]),
    ];
    let tree = build_symbol_tree("repo", files);

    let SymbolTreeNode::Directory { name, children } = &tree else {
      panic!("root must be a directory");
    };
    assert_eq!(name, "repo");
    let names: Vec<_> = children.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["app", "lib.rb"]);

    let SymbolTreeNode::Directory { children: app, .. } = &children[0] else {
      panic!("app must be a directory");
    };
    let app_names: Vec<_> = app.iter().map(|c| c.name()).collect();
    assert_eq!(app_names, vec!["models", "helpers.rb"]);
  }

  #[test]
  fn test_kind_remap_applies_to_subtree() {
    #[allow(deprecated)]
    let heading = DocumentSymbol {
      name: "Sub".to_string(),
      detail: None,
      kind: SymbolKind::STRING,
      tags: None,
      deprecated: None,
      range: range(1, 0, 1, 6),
      selection_range: range(1, 0, 1, 6),
      children: None,
    };
    #[allow(deprecated)]
    let top = DocumentSymbol {
      name: "Top".to_string(),
      detail: None,
      kind: SymbolKind::STRING,
      tags: None,
      deprecated: None,
      range: range(0, 0, 2, 0),
      selection_range: range(0, 0, 0, 5),
      children: Some(vec![heading]),
    };

    let remap = |kind: SymbolKind| {
      if kind == SymbolKind::STRING {
        SymbolKind::NAMESPACE
      } else {
        kind
      }
    };
    let info = SymbolInfo::from_document_symbol(&top, &remap);
    assert_eq!(info.kind, SymbolKind::NAMESPACE);
    assert_eq!(info.children[0].kind, SymbolKind::NAMESPACE);
  }
}
