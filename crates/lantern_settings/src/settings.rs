//! Settings management

use lantern_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Which subsystem services symbol queries for a session or project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguageBackend {
  /// The in-process LSP client core
  #[serde(rename = "LSP")]
  Lsp,
  /// An out-of-process editor-plugin backend
  JetBrains,
}

impl Default for LanguageBackend {
  fn default() -> Self {
    LanguageBackend::Lsp
  }
}

impl std::fmt::Display for LanguageBackend {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      LanguageBackend::Lsp => write!(f, "LSP"),
      LanguageBackend::JetBrains => write!(f, "JetBrains"),
    }
  }
}

/// Flat per-language settings map.
///
/// Keys are language-server specific (see the adapter docs). Lookup keeps
/// "absent" distinguishable from "present but empty": `get_str` returns
/// `None` only when the key is missing, never for an empty value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageSettings(pub HashMap<String, serde_json::Value>);

impl LanguageSettings {
  /// Raw value lookup
  pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
    self.0.get(key)
  }

  /// String value lookup; `Some("")` is a real value
  pub fn get_str(&self, key: &str) -> Option<&str> {
    self.0.get(key).and_then(|v| v.as_str())
  }

  /// Numeric value lookup
  pub fn get_f64(&self, key: &str) -> Option<f64> {
    self.0.get(key).and_then(|v| v.as_f64())
  }

  /// Insert a string value (test and builder convenience)
  pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
    self.0.insert(key.into(), value.into());
  }
}

/// Request and indexing ceilings.
///
/// `None` leaves each language adapter's default in place (30 s requests for
/// fast servers, 120 s for Bundler-based Ruby; 120 s indexing ceiling).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
  /// Per-request timeout override, in seconds
  pub request_timeout_seconds: Option<f64>,
  /// Ceiling on post-`initialized` indexing before a session is forced ready
  pub indexing_timeout_seconds: Option<f64>,
}

/// All Lantern settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
  /// Session-wide backend default; projects may override
  pub language_backend: LanguageBackend,
  /// Timeout ceilings
  pub timeouts: TimeoutSettings,
  /// Extra directory names to prune from symbol trees and reference lists,
  /// merged with each adapter's built-in list
  pub ignored_dirs: Vec<String>,
  /// Where single-path dependency providers keep downloaded servers
  pub resources_dir: Option<PathBuf>,
  /// Per-language settings maps, keyed by language id
  pub ls_specific: HashMap<String, LanguageSettings>,
}

impl Settings {
  /// Load settings from a file
  pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    let content = std::fs::read_to_string(&path).map_err(|_| Error::FileNotFound { path })?;

    serde_json::from_str(&content).map_err(|e| Error::ConfigParseError(e.to_string()))
  }

  /// Save settings to a file
  pub fn save(&self, path: impl Into<PathBuf>) -> Result<()> {
    let path = path.into();
    let content = serde_json::to_string_pretty(self)
      .map_err(|e| Error::ConfigParseError(e.to_string()))?;

    std::fs::write(&path, content)?;
    Ok(())
  }

  /// Settings map for one language (empty map when none are configured)
  pub fn language(&self, language_id: &str) -> LanguageSettings {
    self.ls_specific.get(language_id).cloned().unwrap_or_default()
  }

  /// Merge with partial overrides (other takes precedence)
  pub fn merge(&mut self, other: serde_json::Value) {
    if let Ok(merged) = serde_json::to_value(&self) {
      if let Ok(result) = merge_json(merged, other) {
        if let Ok(settings) = serde_json::from_value(result) {
          *self = settings;
        }
      }
    }
  }
}

/// Merge two JSON values
fn merge_json(base: serde_json::Value, overlay: serde_json::Value) -> Result<serde_json::Value> {
  use serde_json::Value;

  match (base, overlay) {
    (Value::Object(mut base_map), Value::Object(overlay_map)) => {
      for (key, value) in overlay_map {
        let merged = if let Some(base_value) = base_map.remove(&key) {
          merge_json(base_value, value)?
        } else {
          value
        };
        base_map.insert(key, merged);
      }
      Ok(Value::Object(base_map))
    },
    (_, overlay) => Ok(overlay),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.language_backend, LanguageBackend::Lsp);
    assert!(settings.timeouts.indexing_timeout_seconds.is_none());
    assert!(settings.timeouts.request_timeout_seconds.is_none());
  }

  #[test]
  fn test_settings_serialization() {
    let mut settings = Settings::default();
    settings.language_backend = LanguageBackend::JetBrains;
    let json = serde_json::to_string(&settings).unwrap();
    assert!(json.contains("JetBrains"));

    let parsed: Settings = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.language_backend, LanguageBackend::JetBrains);
  }

  #[test]
  fn test_backend_rename() {
    let settings: Settings = serde_json::from_value(json!({"language_backend": "LSP"})).unwrap();
    assert_eq!(settings.language_backend, LanguageBackend::Lsp);
  }

  #[test]
  fn test_empty_string_is_distinct_from_absent() {
    let mut lang = LanguageSettings::default();
    assert!(lang.get_str("jvm_options").is_none());

    lang.set("jvm_options", "");
    assert_eq!(lang.get_str("jvm_options"), Some(""));
  }

  #[test]
  fn test_save_and_load_roundtrip() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("lantern.json");

    let mut settings = Settings::default();
    settings.ignored_dirs.push("vendor".to_string());
    settings
      .ls_specific
      .entry("kotlin".to_string())
      .or_default()
      .set("kotlin_lsp_version", "261.13587.0");
    settings.save(&path).unwrap();

    let loaded = Settings::load(&path).unwrap();
    assert_eq!(loaded.ignored_dirs, vec!["vendor"]);
    assert_eq!(
      loaded.language("kotlin").get_str("kotlin_lsp_version"),
      Some("261.13587.0")
    );
  }

  #[test]
  fn test_merge_overrides_nested_field() {
    let mut settings = Settings::default();
    settings.merge(json!({
      "timeouts": {"indexing_timeout_seconds": 60.0},
      "ls_specific": {"kotlin": {"jvm_options": "-Xmx4G"}}
    }));

    assert_eq!(settings.timeouts.indexing_timeout_seconds, Some(60.0));
    assert_eq!(
      settings.language("kotlin").get_str("jvm_options"),
      Some("-Xmx4G")
    );
  }
}
