//! Symbol, reference, and definition queries
//!
//! The high-level query surface on top of a ready session. Paths at this
//! boundary are workspace-relative; conversion to file URIs happens here.
//! Results under ignored directories never escape: symbol-tree walks prune
//! them and reference/definition lists are filtered lexically on path
//! segments.

use indexmap::IndexMap;
use lantern_core::prelude::*;
use lantern_core::time_operation;
use lantern_fs::{is_ignored_path, SourceScan};
use lsp_types::{GotoDefinitionResponse, Hover, Location, Position, WorkspaceSymbolResponse};
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::server::LspServer;
use crate::symbols::{
  build_symbol_tree, extract_range, find_smallest_enclosing, FileLocation, SymbolInfo,
  SymbolSummary, SymbolTreeNode,
};
use crate::uri::uri_to_workspace_relative;

/// A `workspace/symbol` hit with workspace-relative location
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceSymbolHit {
  pub name: String,
  pub kind: lsp_types::SymbolKind,
  pub location: FileLocation,
}

impl LspServer {
  /// Hierarchical symbol tree for one file: `(flat pre-order list, roots)`
  pub async fn request_document_symbols(
    &self,
    path: impl AsRef<Path>,
  ) -> Result<(Vec<SymbolInfo>, Vec<SymbolInfo>)> {
    self.ensure_ready()?;
    let rel = self.checked_path(path.as_ref())?;
    self.sync_document(&rel)?;

    let uri = self.uri_for(&rel)?;
    let result = self
      .rpc
      .request(
        "textDocument/documentSymbol",
        json!({"textDocument": {"uri": uri.as_str()}}),
      )
      .await?;
    if result.is_null() {
      return Ok((Vec::new(), Vec::new()));
    }

    let response = serde_json::from_value(result)?;
    let remap = |kind| self.adapter.remap_symbol_kind(kind);
    let roots = SymbolInfo::from_response(&response, &remap);
    let flat = SymbolInfo::flatten(&roots);
    Ok((flat, roots))
  }

  /// Directory-shaped symbol tree over the whole workspace.
  ///
  /// Internal nodes are directories, leaves are file nodes whose children
  /// are document symbols. Ignored directories are pruned from the walk.
  pub async fn request_full_symbol_tree(&self) -> Result<Vec<SymbolTreeNode>> {
    self.ensure_ready()?;
    time_operation!("request_full_symbol_tree", threshold = 500);

    let mut files = Vec::new();
    for rel in self.workspace_source_files(None)? {
      match self.request_document_symbols(&rel).await {
        Ok((_, roots)) => files.push((rel, roots)),
        Err(e) if e.is_recoverable() => {
          warn!(path = %rel.display(), "Skipping file in symbol tree: {}", e);
        },
        Err(e) => return Err(e),
      }
    }

    let root_name = self
      .root()
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "workspace".to_string());
    Ok(vec![build_symbol_tree(&root_name, files)])
  }

  /// All references to the symbol at a position. Locations under ignored
  /// directories are filtered out.
  pub async fn request_references(
    &self,
    path: impl AsRef<Path>,
    line: u32,
    character: u32,
  ) -> Result<Vec<FileLocation>> {
    self.ensure_ready()?;
    let rel = self.checked_path(path.as_ref())?;
    self.sync_document(&rel)?;

    let uri = self.uri_for(&rel)?;
    let result = self
      .rpc
      .request(
        "textDocument/references",
        json!({
          "textDocument": {"uri": uri.as_str()},
          "position": {"line": line, "character": character},
          "context": {"includeDeclaration": false},
        }),
      )
      .await?;

    let locations: Option<Vec<Location>> = serde_json::from_value(result)?;
    Ok(self.admit_locations(locations.unwrap_or_default()))
  }

  /// Definition locations for the symbol at a position
  pub async fn request_definition(
    &self,
    path: impl AsRef<Path>,
    line: u32,
    character: u32,
  ) -> Result<Vec<FileLocation>> {
    self.ensure_ready()?;
    let rel = self.checked_path(path.as_ref())?;
    self.sync_document(&rel)?;

    let uri = self.uri_for(&rel)?;
    let result = self
      .rpc
      .request(
        "textDocument/definition",
        json!({
          "textDocument": {"uri": uri.as_str()},
          "position": {"line": line, "character": character},
        }),
      )
      .await?;

    let response: Option<GotoDefinitionResponse> = serde_json::from_value(result)?;
    let locations = match response {
      Some(GotoDefinitionResponse::Scalar(location)) => vec![location],
      Some(GotoDefinitionResponse::Array(locations)) => locations,
      Some(GotoDefinitionResponse::Link(links)) => links
        .into_iter()
        .map(|link| Location {
          uri: link.target_uri,
          range: link.target_selection_range,
        })
        .collect(),
      None => Vec::new(),
    };
    Ok(self.admit_locations(locations))
  }

  /// The smallest symbol whose range encloses the position, optionally with
  /// the source text of that range. `None` when no symbol contains it.
  pub async fn request_containing_symbol(
    &self,
    path: impl AsRef<Path>,
    line: u32,
    character: u32,
    include_body: bool,
  ) -> Result<Option<SymbolInfo>> {
    let rel = self.checked_path(path.as_ref())?;
    let (_, roots) = self.request_document_symbols(&rel).await?;

    let position = Position { line, character };
    let Some(found) = find_smallest_enclosing(&roots, position) else {
      return Ok(None);
    };

    let mut symbol = found.clone();
    if include_body {
      let contents = self.sync_document(&rel)?;
      symbol.body = extract_range(&contents, symbol.range);
    }
    Ok(Some(symbol))
  }

  /// The symbol record defining whatever sits at the position: definition
  /// lookup combined with a containing-symbol query in the target file.
  pub async fn request_defining_symbol(
    &self,
    path: impl AsRef<Path>,
    line: u32,
    character: u32,
  ) -> Result<Option<SymbolInfo>> {
    let definitions = self.request_definition(path, line, character).await?;
    let Some(definition) = definitions.first() else {
      return Ok(None);
    };

    // Definitions outside the workspace (stdlib, gems) have no symbol record
    if definition.relative_path.is_absolute() {
      return Ok(None);
    }
    self
      .request_containing_symbol(
        &definition.relative_path,
        definition.range.start.line,
        definition.range.start.character,
        false,
      )
      .await
  }

  /// Shallow symbol info for each top-level symbol of one file
  pub async fn request_document_overview(
    &self,
    path: impl AsRef<Path>,
  ) -> Result<Vec<SymbolSummary>> {
    let (_, roots) = self.request_document_symbols(path).await?;
    Ok(roots.iter().map(SymbolInfo::summary).collect())
  }

  /// Shallow symbol info for every source file under a directory
  pub async fn request_dir_overview(
    &self,
    dir: impl AsRef<Path>,
  ) -> Result<IndexMap<PathBuf, Vec<SymbolSummary>>> {
    self.ensure_ready()?;
    let rel_dir = self.checked_path(dir.as_ref())?;

    let mut overview = IndexMap::new();
    for rel in self.workspace_source_files(Some(&rel_dir))? {
      match self.request_document_overview(&rel).await {
        Ok(summaries) => {
          overview.insert(rel, summaries);
        },
        Err(e) if e.is_recoverable() => {
          warn!(path = %rel.display(), "Skipping file in overview: {}", e);
        },
        Err(e) => return Err(e),
      }
    }
    Ok(overview)
  }

  /// Hover contents at a position
  pub async fn request_hover(
    &self,
    path: impl AsRef<Path>,
    line: u32,
    character: u32,
  ) -> Result<Option<Hover>> {
    self.ensure_ready()?;
    let rel = self.checked_path(path.as_ref())?;
    self.sync_document(&rel)?;

    let uri = self.uri_for(&rel)?;
    let result = self
      .rpc
      .request(
        "textDocument/hover",
        json!({
          "textDocument": {"uri": uri.as_str()},
          "position": {"line": line, "character": character},
        }),
      )
      .await?;
    Ok(serde_json::from_value(result)?)
  }

  /// Workspace-wide symbol search
  pub async fn request_workspace_symbols(&self, query: &str) -> Result<Vec<WorkspaceSymbolHit>> {
    self.ensure_ready()?;
    let result = self
      .rpc
      .request("workspace/symbol", json!({"query": query}))
      .await?;

    let response: Option<WorkspaceSymbolResponse> = serde_json::from_value(result)?;
    let mut hits = Vec::new();
    match response {
      Some(WorkspaceSymbolResponse::Flat(symbols)) => {
        for symbol in symbols {
          hits.push(WorkspaceSymbolHit {
            name: symbol.name,
            kind: symbol.kind,
            location: self.to_file_location(symbol.location),
          });
        }
      },
      Some(WorkspaceSymbolResponse::Nested(symbols)) => {
        for symbol in symbols {
          let location = match symbol.location {
            lsp_types::OneOf::Left(location) => location,
            lsp_types::OneOf::Right(workspace_location) => Location {
              uri: workspace_location.uri,
              range: lsp_types::Range::default(),
            },
          };
          hits.push(WorkspaceSymbolHit {
            name: symbol.name,
            kind: symbol.kind,
            location: self.to_file_location(location),
          });
        }
      },
      None => {},
    }

    Ok(
      hits
        .into_iter()
        .filter(|hit| !is_ignored_path(&hit.location.relative_path, &self.ignored_dirs))
        .collect(),
    )
  }

  /// Normalize and admission-check a caller path: workspace-relative, and
  /// not under an ignored directory (ignored paths read as nonexistent).
  fn checked_path(&self, path: &Path) -> Result<PathBuf> {
    let rel = self.cache.relativize(path)?;
    if is_ignored_path(&rel, &self.ignored_dirs) {
      return Err(Error::PathIgnored { path: rel });
    }
    Ok(rel)
  }

  /// Source files this session's server handles, workspace-relative, sorted
  fn workspace_source_files(&self, under: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut scan = SourceScan::workspace(self.root())
      .extensions(self.adapter.file_extensions().iter().copied())
      .ignored_dirs(self.ignored_dirs.iter().cloned());
    if let Some(dir) = under {
      scan = scan.under(dir);
    }
    scan.files()
  }

  /// Drop locations under ignored directories, converting the rest to
  /// workspace-relative form
  fn admit_locations(&self, locations: Vec<Location>) -> Vec<FileLocation> {
    locations
      .into_iter()
      .filter_map(|location| {
        let relative_path = match uri_to_workspace_relative(&location.uri, self.root()) {
          Some(rel) => rel,
          // Outside the workspace (stdlib, installed gems): keep as-is
          None => match crate::uri::uri_to_path(&location.uri) {
            Ok(abs) => abs,
            Err(_) => return None,
          },
        };
        if is_ignored_path(&relative_path, &self.ignored_dirs) {
          return None;
        }
        Some(FileLocation {
          relative_path,
          uri: location.uri,
          range: location.range,
        })
      })
      .collect()
  }

  fn to_file_location(&self, location: Location) -> FileLocation {
    let relative_path = uri_to_workspace_relative(&location.uri, self.root())
      .or_else(|| crate::uri::uri_to_path(&location.uri).ok())
      .unwrap_or_default();
    FileLocation {
      relative_path,
      uri: location.uri,
      range: location.range,
    }
  }
}
