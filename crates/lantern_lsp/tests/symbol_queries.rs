//! Symbol query scenarios against a scripted fake server

mod common;

use common::{progress, FakeServer};
use lantern_lsp::adapters::{MarksmanAdapter, RubyLspAdapter};
use lantern_lsp::uri::path_to_uri;
use lantern_lsp::{LspServer, SymbolTreeNode};
use lantern_settings::Settings;
use lsp_types::SymbolKind;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn test_settings() -> Settings {
  let mut settings = Settings::default();
  settings.timeouts.indexing_timeout_seconds = Some(5.0);
  settings
}

fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Value {
  json!({
    "start": {"line": sl, "character": sc},
    "end": {"line": el, "character": ec},
  })
}

/// Ruby workspace with a vendored reference to `Calculator`
fn ruby_workspace() -> TempDir {
  let dir = TempDir::new().unwrap();
  std::fs::write(
    dir.path().join("lib.rb"),
    "class Calculator\n  def add(a, b)\n    a + b\n  end\nend\n",
  )
  .unwrap();
  std::fs::create_dir(dir.path().join("vendor")).unwrap();
  std::fs::write(dir.path().join("vendor/dummy.rb"), "Calculator.new\n").unwrap();
  dir
}

/// ruby-lsp announces readiness with a progress end
fn ruby_fake() -> FakeServer {
  FakeServer {
    after_initialized: vec![progress("rails-indexing", "end")],
    ..FakeServer::default()
  }
}

fn calculator_symbols() -> Value {
  json!([{
    "name": "Calculator",
    "kind": 5,
    "range": range(0, 0, 4, 3),
    "selectionRange": range(0, 6, 0, 16),
    "children": [{
      "name": "add",
      "kind": 6,
      "range": range(1, 2, 3, 5),
      "selectionRange": range(1, 6, 1, 9),
    }],
  }])
}

#[tokio::test]
async fn markdown_headings_are_remapped_to_namespace() {
  let workspace = TempDir::new().unwrap();
  std::fs::write(workspace.path().join("README.md"), "# Test Repository\n").unwrap();

  let mut fake = FakeServer::default();
  fake.document_symbols.insert(
    "README.md".to_string(),
    json!([{
      "name": "Test Repository",
      "kind": 15,
      "range": range(0, 0, 0, 17),
      "selectionRange": range(0, 2, 0, 17),
    }]),
  );
  let (reader, writer) = fake.launch();

  let server = LspServer::start_with_transport(
    Arc::new(MarksmanAdapter),
    workspace.path(),
    &test_settings(),
    reader,
    writer,
  )
  .await
  .unwrap();

  let (flat, roots) = server.request_document_symbols("README.md").await.unwrap();
  assert_eq!(flat.len(), 1);
  assert_eq!(flat[0].name, "Test Repository");
  // The server said String(15); consumers must see Namespace(3)
  assert_eq!(flat[0].kind, SymbolKind::NAMESPACE);
  assert_eq!(roots[0].kind, SymbolKind::NAMESPACE);
}

#[tokio::test]
async fn references_under_ignored_dirs_are_filtered() {
  let workspace = ruby_workspace();

  let mut fake = ruby_fake();
  fake.references = json!([
    {
      "uri": path_to_uri(&workspace.path().join("lib.rb")).unwrap().as_str(),
      "range": range(1, 2, 1, 9),
    },
    {
      "uri": path_to_uri(&workspace.path().join("vendor/dummy.rb")).unwrap().as_str(),
      "range": range(0, 0, 0, 10),
    },
  ]);
  let (reader, writer) = fake.launch();

  let server = LspServer::start_with_transport(
    Arc::new(RubyLspAdapter),
    workspace.path(),
    &test_settings(),
    reader,
    writer,
  )
  .await
  .unwrap();

  let references = server.request_references("lib.rb", 0, 6).await.unwrap();
  assert!(!references.is_empty());
  assert!(references
    .iter()
    .all(|reference| !reference.uri.as_str().contains("vendor/")));
  assert!(references
    .iter()
    .any(|reference| reference.relative_path == Path::new("lib.rb")));
}

#[tokio::test]
async fn full_symbol_tree_prunes_ignored_dirs() {
  let workspace = ruby_workspace();

  let mut fake = ruby_fake();
  fake
    .document_symbols
    .insert("lib.rb".to_string(), calculator_symbols());
  fake.document_symbols.insert(
    "dummy.rb".to_string(),
    json!([{
      "name": "dummy",
      "kind": 13,
      "range": range(0, 0, 0, 14),
      "selectionRange": range(0, 0, 0, 14),
    }]),
  );
  let (reader, writer) = fake.launch();

  let server = LspServer::start_with_transport(
    Arc::new(RubyLspAdapter),
    workspace.path(),
    &test_settings(),
    reader,
    writer,
  )
  .await
  .unwrap();

  let tree = server.request_full_symbol_tree().await.unwrap();
  let SymbolTreeNode::Directory { children, .. } = &tree[0] else {
    panic!("root must be a directory");
  };

  let names: Vec<String> = children.iter().map(SymbolTreeNode::name).collect();
  assert!(names.contains(&"lib.rb".to_string()));
  assert!(!names.contains(&"vendor".to_string()));

  // lib.rb is reachable in the tree with its document symbols as children
  let SymbolTreeNode::File { symbols, .. } = children
    .iter()
    .find(|node| node.name() == "lib.rb")
    .unwrap()
  else {
    panic!("lib.rb must be a file node");
  };
  assert_eq!(symbols[0].name, "Calculator");
}

#[tokio::test]
async fn queries_on_ignored_paths_read_as_missing() {
  let workspace = ruby_workspace();
  let (reader, writer) = ruby_fake().launch();

  let server = LspServer::start_with_transport(
    Arc::new(RubyLspAdapter),
    workspace.path(),
    &test_settings(),
    reader,
    writer,
  )
  .await
  .unwrap();

  let err = server
    .request_document_symbols("vendor/dummy.rb")
    .await
    .unwrap_err();
  assert!(matches!(err, lantern_core::Error::PathIgnored { .. }));
}

#[tokio::test]
async fn containing_symbol_picks_deepest_and_extracts_body() {
  let workspace = ruby_workspace();

  let mut fake = ruby_fake();
  fake
    .document_symbols
    .insert("lib.rb".to_string(), calculator_symbols());
  let (reader, writer) = fake.launch();

  let server = LspServer::start_with_transport(
    Arc::new(RubyLspAdapter),
    workspace.path(),
    &test_settings(),
    reader,
    writer,
  )
  .await
  .unwrap();

  // Inside `add`: the method wins over the class
  let symbol = server
    .request_containing_symbol("lib.rb", 2, 4, true)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(symbol.name, "add");
  assert_eq!(symbol.body.as_deref(), Some("def add(a, b)\n    a + b\n  end"));

  // Between methods: the class
  let symbol = server
    .request_containing_symbol("lib.rb", 4, 0, false)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(symbol.name, "Calculator");
  assert!(symbol.body.is_none());

  // Nowhere: no containing symbol is not an error
  let none = server
    .request_containing_symbol("lib.rb", 20, 0, false)
    .await
    .unwrap();
  assert!(none.is_none());
}

#[tokio::test]
async fn defining_symbol_combines_definition_and_symbols() {
  let workspace = ruby_workspace();

  let mut fake = ruby_fake();
  fake
    .document_symbols
    .insert("lib.rb".to_string(), calculator_symbols());
  // Definition of the call site points at `add` in lib.rb
  fake.definition = json!([{
    "uri": path_to_uri(&workspace.path().join("lib.rb")).unwrap().as_str(),
    "range": range(1, 6, 1, 9),
  }]);
  let (reader, writer) = fake.launch();

  let server = LspServer::start_with_transport(
    Arc::new(RubyLspAdapter),
    workspace.path(),
    &test_settings(),
    reader,
    writer,
  )
  .await
  .unwrap();

  let symbol = server
    .request_defining_symbol("lib.rb", 2, 4)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(symbol.name, "add");
}

#[tokio::test]
async fn overviews_return_shallow_info() {
  let workspace = ruby_workspace();

  let mut fake = ruby_fake();
  fake
    .document_symbols
    .insert("lib.rb".to_string(), calculator_symbols());
  let (reader, writer) = fake.launch();

  let server = LspServer::start_with_transport(
    Arc::new(RubyLspAdapter),
    workspace.path(),
    &test_settings(),
    reader,
    writer,
  )
  .await
  .unwrap();

  let document = server.request_document_overview("lib.rb").await.unwrap();
  assert_eq!(document.len(), 1);
  assert_eq!(document[0].name, "Calculator");
  assert_eq!(document[0].kind, SymbolKind::CLASS);
  assert_eq!(document[0].line, 0);

  let dir = server.request_dir_overview(".").await.unwrap();
  let entries: Vec<&Path> = dir.keys().map(|path| path.as_path()).collect();
  assert_eq!(entries, vec![Path::new("lib.rb")]);
}

#[tokio::test]
async fn external_edit_is_visible_to_later_queries() {
  let workspace = ruby_workspace();

  let mut fake = ruby_fake();
  fake
    .document_symbols
    .insert("lib.rb".to_string(), calculator_symbols());
  let (reader, writer) = fake.launch();

  let server = LspServer::start_with_transport(
    Arc::new(RubyLspAdapter),
    workspace.path(),
    &test_settings(),
    reader,
    writer,
  )
  .await
  .unwrap();

  let symbol = server
    .request_containing_symbol("lib.rb", 0, 7, true)
    .await
    .unwrap()
    .unwrap();
  assert!(symbol.body.unwrap().starts_with("class Calculator"));

  // Rewrite the file externally and push its mtime forward past coarse
  // filesystem resolution
  let path = workspace.path().join("lib.rb");
  std::fs::write(&path, "class Calculator2\n  def add(a, b)\n    a + b\n  end\nend\n").unwrap();
  let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
  let file = std::fs::File::options().write(true).open(&path).unwrap();
  file
    .set_modified(mtime + std::time::Duration::from_secs(2))
    .unwrap();

  let symbol = server
    .request_containing_symbol("lib.rb", 0, 7, true)
    .await
    .unwrap()
    .unwrap();
  assert!(symbol.body.unwrap().starts_with("class Calculator2"));
}
