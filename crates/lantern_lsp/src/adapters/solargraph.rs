//! Ruby adapter backed by Solargraph
//!
//! In Bundler projects whose `Gemfile.lock` carries the gem, the server is
//! launched through `bundle exec solargraph`; otherwise a PATH install is
//! used. Bundler environments can be slow to boot, so requests get the long
//! timeout.
//!
//! Readiness is announced outside the progress protocol, on either signal:
//! a `language/status` notification with type `ProjectStatus` and message
//! `OK`, or a `window/logMessage` whose text contains "Solargraph is
//! ready". The string match mirrors what the server actually emits.

use lantern_core::prelude::*;
use lantern_settings::LanguageSettings;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

use crate::launch::{find_in_path, LaunchDescriptor, Platform};
use crate::uri::path_to_uri;

use super::{LanguageAdapter, ReadinessSignal};

/// Adapter for Solargraph
pub struct SolargraphAdapter;

impl SolargraphAdapter {
  fn gemfile_lock_has_solargraph(root: &Path) -> bool {
    std::fs::read_to_string(root.join("Gemfile.lock"))
      .map(|lock| lock.to_lowercase().contains("solargraph"))
      .unwrap_or(false)
  }
}

impl LanguageAdapter for SolargraphAdapter {
  fn language_id(&self) -> &'static str {
    "ruby-solargraph"
  }

  fn file_extensions(&self) -> &'static [&'static str] {
    &["rb"]
  }

  fn document_language_id(&self) -> &'static str {
    "ruby"
  }

  fn resolve_launch(
    &self,
    root: &Path,
    _platform: Platform,
    _settings: &LanguageSettings,
  ) -> Result<LaunchDescriptor> {
    let is_bundler_project = root.join("Gemfile").exists();

    if is_bundler_project && Self::gemfile_lock_has_solargraph(root) {
      let bundle = find_in_path("bundle").ok_or_else(|| Error::DependencyMissing {
        language: "ruby-solargraph".to_string(),
        reason: "Bundler project detected but `bundle` is not on PATH".to_string(),
      })?;
      return Ok(
        LaunchDescriptor::new(bundle, root)
          .arg("exec")
          .arg("solargraph")
          .arg("stdio"),
      );
    }

    if let Some(executable) = find_in_path("solargraph") {
      return Ok(LaunchDescriptor::new(executable, root).arg("stdio"));
    }

    let reason = if is_bundler_project {
      "solargraph is neither in Gemfile.lock nor on PATH; add `gem \"solargraph\"` and run `bundle install`"
    } else {
      "solargraph not found on PATH; install it with `gem install solargraph`"
    };
    Err(Error::DependencyMissing {
      language: "ruby-solargraph".to_string(),
      reason: reason.to_string(),
    })
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
      "capabilities": {
        "workspace": {
          "workspaceEdit": {"documentChanges": true},
          "didChangeConfiguration": {"dynamicRegistration": true},
          "didChangeWatchedFiles": {"dynamicRegistration": true},
          "symbol": {
            "dynamicRegistration": true,
            "symbolKind": {"valueSet": (1..=26).collect::<Vec<i32>>()},
          },
          "executeCommand": {"dynamicRegistration": true},
          "configuration": true,
          "workspaceFolders": true,
        },
        "textDocument": {
          "synchronization": {
            "dynamicRegistration": true,
            "willSave": true,
            "willSaveWaitUntil": true,
            "didSave": true,
          },
          "hover": {"dynamicRegistration": true, "contentFormat": ["markdown", "plaintext"]},
          "signatureHelp": {
            "dynamicRegistration": true,
            "signatureInformation": {
              "documentationFormat": ["markdown", "plaintext"],
              "parameterInformation": {"labelOffsetSupport": true},
            },
          },
          "definition": {"dynamicRegistration": true},
          "references": {"dynamicRegistration": true},
          "documentSymbol": {
            "dynamicRegistration": true,
            "symbolKind": {"valueSet": (1..=26).collect::<Vec<i32>>()},
            "hierarchicalDocumentSymbolSupport": true,
          },
          "publishDiagnostics": {"relatedInformation": true},
        },
        "window": {"workDoneProgress": true},
        "general": {"positionEncodings": ["utf-16"]},
      },
      "trace": "verbose",
      "workspaceFolders": [{"uri": root_uri.as_str(), "name": root_name}],
    }))
  }

  fn assert_capabilities(&self, capabilities: &Value) -> Result<()> {
    // Solargraph advertises full-document sync and a fixed completion record
    if capabilities.get("textDocumentSync") != Some(&json!(2)) {
      return Err(Error::CapabilityMissing {
        language: self.language_id().to_string(),
        capability: "textDocumentSync (full)".to_string(),
      });
    }
    let completion = capabilities.get("completionProvider");
    if completion
      != Some(&json!({
        "resolveProvider": true,
        "triggerCharacters": [".", ":", "@"],
      }))
    {
      return Err(Error::CapabilityMissing {
        language: self.language_id().to_string(),
        capability: "completionProvider".to_string(),
      });
    }
    Ok(())
  }

  fn ignored_dirnames(&self) -> Vec<String> {
    let mut dirs: Vec<String> = lantern_core::constants::COMMON_IGNORED_DIRS
      .iter()
      .map(|d| d.to_string())
      .collect();
    dirs.push("vendor".to_string());
    dirs
  }

  // Bundler environments may need more time
  fn request_timeout(&self) -> Duration {
    Duration::from_secs_f64(lantern_core::constants::BUNDLER_REQUEST_TIMEOUT_SECS)
  }

  fn awaits_service_ready(&self) -> bool {
    true
  }

  fn readiness_signal(&self, method: &str, params: &Value) -> Option<ReadinessSignal> {
    match method {
      "language/status" => {
        let kind = params.get("type").and_then(Value::as_str);
        let message = params.get("message").and_then(Value::as_str);
        if kind == Some("ProjectStatus") && message == Some("OK") {
          return Some(ReadinessSignal::ServiceReady);
        }
        None
      },
      "window/logMessage" => {
        let message = params.get("message").and_then(Value::as_str).unwrap_or("");
        if message.contains("Solargraph is ready") {
          return Some(ReadinessSignal::ServiceReady);
        }
        None
      },
      // Solargraph's progress traffic does not gate readiness
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use tempfile::TempDir;

  #[test]
  fn test_bundler_lookup_reads_gemfile_lock() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("Gemfile"), "gem \"solargraph\"").unwrap();
    std::fs::write(
      dir.path().join("Gemfile.lock"),
      "GEM\n  specs:\n    solargraph (0.51.1)\n",
    )
    .unwrap();
    assert!(SolargraphAdapter::gemfile_lock_has_solargraph(dir.path()));

    std::fs::write(dir.path().join("Gemfile.lock"), "GEM\n  specs:\n    rake (13.0)\n").unwrap();
    assert!(!SolargraphAdapter::gemfile_lock_has_solargraph(dir.path()));
  }

  #[test]
  fn test_capability_assertions() {
    let adapter = SolargraphAdapter;
    let good = json!({
      "textDocumentSync": 2,
      "completionProvider": {"resolveProvider": true, "triggerCharacters": [".", ":", "@"]},
    });
    assert!(adapter.assert_capabilities(&good).is_ok());

    let incremental_sync = json!({
      "textDocumentSync": 1,
      "completionProvider": {"resolveProvider": true, "triggerCharacters": [".", ":", "@"]},
    });
    assert!(matches!(
      adapter.assert_capabilities(&incremental_sync),
      Err(Error::CapabilityMissing { .. })
    ));
  }

  #[test]
  fn test_ready_on_project_status() {
    let adapter = SolargraphAdapter;
    let signal = adapter.readiness_signal(
      "language/status",
      &json!({"type": "ProjectStatus", "message": "OK"}),
    );
    assert_eq!(signal, Some(ReadinessSignal::ServiceReady));

    let signal = adapter.readiness_signal(
      "language/status",
      &json!({"type": "ServiceReady", "message": "ServiceReady"}),
    );
    assert_eq!(signal, None);
  }

  #[test]
  fn test_ready_on_log_message() {
    let adapter = SolargraphAdapter;
    let signal = adapter.readiness_signal(
      "window/logMessage",
      &json!({"type": 3, "message": "Solargraph is ready (0.51.1)"}),
    );
    assert_eq!(signal, Some(ReadinessSignal::ServiceReady));

    let signal = adapter.readiness_signal(
      "window/logMessage",
      &json!({"type": 3, "message": "indexing workspace"}),
    );
    assert_eq!(signal, None);
  }

  #[test]
  fn test_progress_does_not_gate_readiness() {
    let adapter = SolargraphAdapter;
    let signal = adapter.readiness_signal(
      "$/progress",
      &json!({"token": "t", "value": {"kind": "begin"}}),
    );
    assert_eq!(signal, None);
  }
}
