//! Per-language server adapters
//!
//! Every language server has its own startup quirks: how its launch command
//! is resolved, what `initializationOptions` it expects, which capabilities
//! it must advertise, which directories its projects want pruned, how it
//! signals that indexing finished, and how its symbol kinds are normalized.
//! One adapter per server captures all of that behind a single trait.

mod kotlin;
mod marksman;
mod ruby_lsp;
mod solargraph;

pub use kotlin::KotlinAdapter;
pub use marksman::MarksmanAdapter;
pub use ruby_lsp::RubyLspAdapter;
pub use solargraph::SolargraphAdapter;

use lantern_core::prelude::*;
use lantern_settings::LanguageSettings;
use lsp_types::SymbolKind;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::launch::{LaunchDescriptor, Platform};

/// How an inbound message bears on readiness
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessSignal {
  /// A progress token started tracking (create or begin)
  TokenStarted(String),
  /// A progress token finished (end is the only end signal)
  TokenEnded(String),
  /// The server announced readiness outside the progress protocol
  ServiceReady,
}

/// Strategy object describing one language server
pub trait LanguageAdapter: Send + Sync {
  /// Language id ("kotlin", "ruby", "markdown", ...)
  fn language_id(&self) -> &'static str;

  /// File extensions routed to this server
  fn file_extensions(&self) -> &'static [&'static str];

  /// The `languageId` sent in `textDocument/didOpen` (defaults to the
  /// language id; differs when several adapters serve one language)
  fn document_language_id(&self) -> &'static str {
    self.language_id()
  }

  /// Resolve the launch command and environment for this platform
  fn resolve_launch(
    &self,
    root: &Path,
    platform: Platform,
    settings: &LanguageSettings,
  ) -> Result<LaunchDescriptor>;

  /// The `initialize` request parameters for this server
  fn initialize_params(&self, root: &Path) -> Result<Value>;

  /// Capability fields the `initialize` response must carry
  fn required_capabilities(&self) -> &'static [&'static str] {
    &[]
  }

  /// Assert the advertised capability set; failures fail the session
  fn assert_capabilities(&self, capabilities: &Value) -> Result<()> {
    for field in self.required_capabilities() {
      if capabilities.get(*field).is_none() {
        return Err(Error::CapabilityMissing {
          language: self.language_id().to_string(),
          capability: field.to_string(),
        });
      }
    }
    Ok(())
  }

  /// Directory names pruned from symbol trees and reference lists
  fn ignored_dirnames(&self) -> Vec<String> {
    lantern_core::constants::COMMON_IGNORED_DIRS
      .iter()
      .map(|d| d.to_string())
      .collect()
  }

  /// Default per-request timeout for this server
  fn request_timeout(&self) -> Duration {
    Duration::from_secs_f64(lantern_core::constants::DEFAULT_REQUEST_TIMEOUT_SECS)
  }

  /// Ceiling on post-`initialized` indexing before the session is forced ready
  fn indexing_timeout(&self) -> Duration {
    Duration::from_secs_f64(lantern_core::constants::DEFAULT_INDEXING_TIMEOUT_SECS)
  }

  /// Normalize a reported symbol kind (applied at ingest)
  fn remap_symbol_kind(&self, kind: SymbolKind) -> SymbolKind {
    kind
  }

  /// Whether readiness arrives as a status message instead of progress
  /// tokens; such servers start the latch cleared after `initialized`.
  fn awaits_service_ready(&self) -> bool {
    false
  }

  /// Classify an inbound message's effect on readiness
  fn readiness_signal(&self, method: &str, params: &Value) -> Option<ReadinessSignal> {
    progress_readiness_signal(method, params)
  }
}

/// The default classification: create/begin start a token, end ends it.
pub fn progress_readiness_signal(method: &str, params: &Value) -> Option<ReadinessSignal> {
  match method {
    "window/workDoneProgress/create" => Some(ReadinessSignal::TokenStarted(token_text(
      params.get("token")?,
    ))),
    "$/progress" => {
      let token = token_text(params.get("token")?);
      match params.get("value").and_then(|v| v.get("kind")).and_then(Value::as_str)? {
        "begin" => Some(ReadinessSignal::TokenStarted(token)),
        "end" => Some(ReadinessSignal::TokenEnded(token)),
        _ => None,
      }
    },
    _ => None,
  }
}

/// Progress tokens are strings or numbers on the wire
fn token_text(token: &Value) -> String {
  match token {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// All adapters this build knows about
pub fn builtin_adapters() -> Vec<Arc<dyn LanguageAdapter>> {
  vec![
    Arc::new(KotlinAdapter::default()),
    Arc::new(RubyLspAdapter),
    Arc::new(SolargraphAdapter),
    Arc::new(MarksmanAdapter),
  ]
}

/// Look an adapter up by language id
pub fn adapter_for(language_id: &str) -> Option<Arc<dyn LanguageAdapter>> {
  builtin_adapters()
    .into_iter()
    .find(|adapter| adapter.language_id() == language_id)
}

/// Look an adapter up by file extension
pub fn adapter_for_extension(extension: &str) -> Option<Arc<dyn LanguageAdapter>> {
  builtin_adapters()
    .into_iter()
    .find(|adapter| adapter.file_extensions().contains(&extension))
}
