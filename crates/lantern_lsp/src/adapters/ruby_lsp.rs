//! Ruby adapter backed by Shopify's ruby-lsp
//!
//! Prefers a `ruby-lsp` executable on PATH. Rails projects get extra
//! indexing exclude patterns. ruby-lsp indexes quickly after `initialized`
//! and announces completion either with a `$/progress` end or a
//! `language/status` notification of type `ready`.

use lantern_core::prelude::*;
use lantern_settings::LanguageSettings;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

use crate::launch::{find_in_path, LaunchDescriptor, Platform};
use crate::uri::path_to_uri;

use super::{LanguageAdapter, ReadinessSignal};

/// Adapter for ruby-lsp
pub struct RubyLspAdapter;

impl RubyLspAdapter {
  fn rails_project(root: &Path) -> bool {
    let markers = [
      "config/application.rb",
      "config/environment.rb",
      "app/controllers/application_controller.rb",
    ];
    if markers.iter().any(|m| root.join(m).exists()) {
      return true;
    }

    // A Rakefile alone is common outside Rails; pair it with a Gemfile scan
    if let Ok(gemfile) = std::fs::read_to_string(root.join("Gemfile")) {
      let gemfile = gemfile.to_lowercase();
      if gemfile.contains("gem 'rails'") || gemfile.contains("gem \"rails\"") {
        return true;
      }
    }
    false
  }

  fn exclude_patterns(root: &Path) -> Vec<String> {
    let mut patterns: Vec<String> = [
      "**/vendor/**",
      "**/.bundle/**",
      "**/tmp/**",
      "**/log/**",
      "**/coverage/**",
      "**/.yardoc/**",
      "**/doc/**",
      "**/.git/**",
      "**/node_modules/**",
      "**/public/assets/**",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect();

    if Self::rails_project(root) {
      patterns.extend(
        [
          "**/public/packs/**",
          "**/public/webpack/**",
          "**/storage/**",
          "**/tmp/cache/**",
          "**/db/*.sqlite3",
        ]
        .iter()
        .map(|p| p.to_string()),
      );
    }
    patterns
  }
}

impl LanguageAdapter for RubyLspAdapter {
  fn language_id(&self) -> &'static str {
    "ruby"
  }

  fn file_extensions(&self) -> &'static [&'static str] {
    &["rb", "rake", "ru", "erb"]
  }

  fn resolve_launch(
    &self,
    root: &Path,
    _platform: Platform,
    _settings: &LanguageSettings,
  ) -> Result<LaunchDescriptor> {
    let executable = find_in_path("ruby-lsp").ok_or_else(|| Error::DependencyMissing {
      language: "ruby".to_string(),
      reason: "ruby-lsp not found on PATH; install it with `gem install ruby-lsp`".to_string(),
    })?;
    Ok(LaunchDescriptor::new(executable, root))
  }

  fn initialize_params(&self, root: &Path) -> Result<Value> {
    let root_uri = path_to_uri(root)?;
    let root_name = root
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "workspace".to_string());

    Ok(json!({
      "processId": std::process::id(),
      "rootPath": root.to_string_lossy(),
      "rootUri": root_uri.as_str(),
      "initializationOptions": {
        "enabledFeatures": {
          "codeActions": true,
          "diagnostics": true,
          "documentHighlights": true,
          "documentLink": true,
          "documentSymbols": true,
          "foldingRanges": true,
          "formatting": true,
          "hover": true,
          "inlayHint": true,
          "onTypeFormatting": true,
          "selectionRanges": true,
          "semanticHighlighting": true,
          "completion": true,
          "definition": true,
          "workspaceSymbol": true,
          "signatureHelp": true,
        },
        "experimentalFeaturesEnabled": false,
        "featuresConfiguration": {},
        "indexing": {
          "includedPatterns": ["**/*.rb", "**/*.rake", "**/*.ru", "**/*.erb"],
          "excludedPatterns": Self::exclude_patterns(root),
        },
      },
      "capabilities": {
        "workspace": {
          "workspaceEdit": {"documentChanges": true},
          "didChangeConfiguration": {"dynamicRegistration": true},
          "didChangeWatchedFiles": {"dynamicRegistration": true},
          "configuration": true,
          "workspaceFolders": true,
        },
        "textDocument": {
          "documentSymbol": {
            "hierarchicalDocumentSymbolSupport": true,
            "symbolKind": {"valueSet": (1..=26).collect::<Vec<i32>>()},
          },
          "formatting": {"dynamicRegistration": true},
          "codeAction": {"dynamicRegistration": true},
          "semanticTokens": {"dynamicRegistration": true},
          "completion": {
            "completionItem": {"snippetSupport": true, "commitCharactersSupport": true},
          },
        },
        "window": {"workDoneProgress": true},
        "general": {"positionEncodings": ["utf-16"]},
      },
      "trace": "verbose",
      "workspaceFolders": [{"uri": root_uri.as_str(), "name": root_name}],
    }))
  }

  fn required_capabilities(&self) -> &'static [&'static str] {
    &["textDocumentSync", "completionProvider"]
  }

  fn ignored_dirnames(&self) -> Vec<String> {
    let mut dirs: Vec<String> = lantern_core::constants::COMMON_IGNORED_DIRS
      .iter()
      .map(|d| d.to_string())
      .collect();
    dirs.extend(
      [
        "vendor", ".bundle", "tmp", "log", "coverage", ".yardoc", "doc", "storage",
      ]
      .iter()
      .map(|d| d.to_string()),
    );
    dirs
  }

  // ruby-lsp is fast
  fn request_timeout(&self) -> Duration {
    Duration::from_secs(30)
  }

  fn indexing_timeout(&self) -> Duration {
    Duration::from_secs(30)
  }

  fn awaits_service_ready(&self) -> bool {
    true
  }

  fn readiness_signal(&self, method: &str, params: &Value) -> Option<ReadinessSignal> {
    match method {
      "$/progress" => {
        let kind = params.get("value").and_then(|v| v.get("kind")).and_then(Value::as_str);
        if kind == Some("end") {
          return Some(ReadinessSignal::ServiceReady);
        }
        None
      },
      "language/status" => {
        if params.get("type").and_then(Value::as_str) == Some("ready") {
          return Some(ReadinessSignal::ServiceReady);
        }
        None
      },
      _ => None,
    }
  }
}
