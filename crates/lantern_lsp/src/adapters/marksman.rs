//! Markdown adapter backed by Marksman
//!
//! Marksman reports headings with kind `String(15)`, which downstream
//! consumers filter out as low-level. They are remapped to `Namespace(3)`
//! at ingest so document structure survives overview queries.

use lantern_core::prelude::*;
use lantern_settings::LanguageSettings;
use lsp_types::SymbolKind;
use serde_json::{json, Value};
use std::path::Path;

use crate::launch::{find_in_path, LaunchDescriptor, Platform};
use crate::uri::path_to_uri;

use super::LanguageAdapter;

/// Adapter for the Marksman markdown server
pub struct MarksmanAdapter;

impl LanguageAdapter for MarksmanAdapter {
  fn language_id(&self) -> &'static str {
    "markdown"
  }

  fn file_extensions(&self) -> &'static [&'static str] {
    &["md", "markdown"]
  }

  fn resolve_launch(
    &self,
    root: &Path,
    _platform: Platform,
    _settings: &LanguageSettings,
  ) -> Result<LaunchDescriptor> {
    let executable = find_in_path("marksman").ok_or_else(|| Error::DependencyMissing {
      language: "markdown".to_string(),
      reason: "marksman not found on PATH".to_string(),
    })?;
    Ok(LaunchDescriptor::new(executable, root).arg("server"))
  }

  fn initialize_params(&self, root: &Path) -> Result<Value> {
    let root_uri = path_to_uri(root)?;
    let root_name = root
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "workspace".to_string());

    Ok(json!({
      "processId": std::process::id(),
      "rootUri": root_uri.as_str(),
      "capabilities": {
        "workspace": {
          "didChangeConfiguration": {"dynamicRegistration": true},
          "didChangeWatchedFiles": {"dynamicRegistration": true},
          "configuration": true,
          "workspaceFolders": true,
        },
        "textDocument": {
          "synchronization": {"dynamicRegistration": true, "didSave": true},
          "documentSymbol": {
            "dynamicRegistration": true,
            "symbolKind": {"valueSet": (1..=26).collect::<Vec<i32>>()},
            "hierarchicalDocumentSymbolSupport": true,
          },
          "definition": {"dynamicRegistration": true, "linkSupport": true},
          "references": {"dynamicRegistration": true},
          "hover": {"dynamicRegistration": true, "contentFormat": ["markdown", "plaintext"]},
        },
        "window": {"workDoneProgress": true},
        "general": {"positionEncodings": ["utf-16"]},
      },
      "trace": "off",
      "workspaceFolders": [{"uri": root_uri.as_str(), "name": root_name}],
    }))
  }

  fn required_capabilities(&self) -> &'static [&'static str] {
    &["documentSymbolProvider"]
  }

  fn remap_symbol_kind(&self, kind: SymbolKind) -> SymbolKind {
    if kind == SymbolKind::STRING {
      SymbolKind::NAMESPACE
    } else {
      kind
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_heading_kind_remap() {
    let adapter = MarksmanAdapter;
    assert_eq!(
      adapter.remap_symbol_kind(SymbolKind::STRING),
      SymbolKind::NAMESPACE
    );
    assert_eq!(adapter.remap_symbol_kind(SymbolKind::CLASS), SymbolKind::CLASS);
  }
}
