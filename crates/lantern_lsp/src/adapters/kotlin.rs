//! Kotlin language server adapter (JetBrains kotlin-lsp)
//!
//! Settings recognised under `ls_specific.kotlin`:
//!
//! - `ls_path`: override the executable path entirely
//! - `kotlin_lsp_version`: pin the server version used in the download URL
//! - `jvm_options`: value of `JAVA_TOOL_OPTIONS`; an explicit empty string
//!   means "no JVM options", which is distinct from leaving the key unset
//!   (default `-Xmx2G`)
//!
//! Newer server builds (261+) index asynchronously after `initialized` and
//! report progress tokens; older builds index inside `initialize` and never
//! send progress. Both flow through the default token-based readiness.

use lantern_core::prelude::*;
use lantern_settings::LanguageSettings;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::launch::{
  find_in_path, CoreDependencyInstaller, DependencyProvider, LaunchDescriptor, Platform,
  SinglePathProvider,
};
use crate::uri::path_to_uri;

use super::LanguageAdapter;

// 2GB heap is sufficient for most projects; override via jvm_options for
// large codebases
const DEFAULT_JVM_OPTIONS: &str = "-Xmx2G";

const DEFAULT_VERSION: &str = "261.13587.0";

fn platform_suffix(platform: Platform) -> &'static str {
  match platform {
    Platform::WinX64 => "win-x64",
    Platform::LinuxX64 => "linux-x64",
    Platform::LinuxArm64 => "linux-aarch64",
    Platform::MacX64 => "mac-x64",
    Platform::MacArm64 => "mac-aarch64",
  }
}

/// Single-path provider for the kotlin-lsp distribution
struct KotlinDependencyProvider {
  version: String,
}

impl SinglePathProvider for KotlinDependencyProvider {
  fn language_id(&self) -> &str {
    "kotlin"
  }

  fn executable_path(&self, resources_dir: &Path, platform: Platform) -> PathBuf {
    let script = if platform.is_windows() {
      "kotlin-lsp.cmd"
    } else {
      "kotlin-lsp.sh"
    };
    resources_dir.join("kotlin_language_server").join(script)
  }

  fn download_url(&self, platform: Platform) -> Result<String> {
    Ok(format!(
      "https://download-cdn.jetbrains.com/kotlin-lsp/{version}/kotlin-lsp-{version}-{suffix}.zip",
      version = self.version,
      suffix = platform_suffix(platform),
    ))
  }
}

/// Adapter for the Kotlin language server
#[derive(Default)]
pub struct KotlinAdapter {
  resources_dir: Option<PathBuf>,
  installer: Option<Arc<dyn CoreDependencyInstaller>>,
}

impl KotlinAdapter {
  /// Cache downloaded server builds under this directory
  pub fn with_resources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.resources_dir = Some(dir.into());
    self
  }

  /// Plug in the download/extract machinery
  pub fn with_installer(mut self, installer: Arc<dyn CoreDependencyInstaller>) -> Self {
    self.installer = Some(installer);
    self
  }

  fn executable(
    &self,
    platform: Platform,
    settings: &LanguageSettings,
  ) -> Result<PathBuf> {
    if let Some(ls_path) = settings.get_str("ls_path") {
      let path = PathBuf::from(ls_path);
      if !path.exists() {
        return Err(Error::DependencyMissing {
          language: "kotlin".to_string(),
          reason: format!("configured ls_path does not exist: {}", path.display()),
        });
      }
      return Ok(path);
    }

    if let Some(resources_dir) = &self.resources_dir {
      let provider = KotlinDependencyProvider {
        version: settings
          .get_str("kotlin_lsp_version")
          .unwrap_or(DEFAULT_VERSION)
          .to_string(),
      };
      return provider.get_or_install(resources_dir, platform, self.installer.as_deref());
    }

    find_in_path("kotlin-lsp").ok_or_else(|| Error::DependencyMissing {
      language: "kotlin".to_string(),
      reason: "kotlin-lsp not on PATH and no resources directory configured".to_string(),
    })
  }
}

impl DependencyProvider for KotlinAdapter {
  fn resolve(
    &self,
    root: &Path,
    platform: Platform,
    settings: &LanguageSettings,
  ) -> Result<LaunchDescriptor> {
    let executable = self.executable(platform, settings)?;

    // Unset vs explicitly empty matters here: absent means the default heap,
    // "" means launch with no JVM options at all
    let jvm_options = settings
      .get_str("jvm_options")
      .unwrap_or(DEFAULT_JVM_OPTIONS);

    Ok(
      LaunchDescriptor::new(executable, root)
        .arg("--stdio")
        .env_set("JAVA_TOOL_OPTIONS", jvm_options),
    )
  }
}

impl LanguageAdapter for KotlinAdapter {
  fn language_id(&self) -> &'static str {
    "kotlin"
  }

  fn file_extensions(&self) -> &'static [&'static str] {
    &["kt", "kts"]
  }

  fn resolve_launch(
    &self,
    root: &Path,
    platform: Platform,
    settings: &LanguageSettings,
  ) -> Result<LaunchDescriptor> {
    DependencyProvider::resolve(self, root, platform, settings)
  }

  fn initialize_params(&self, root: &Path) -> Result<Value> {
    let root_uri = path_to_uri(root)?;
    let root_name = root
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "workspace".to_string());

    Ok(json!({
      "clientInfo": {"name": "Lantern Kotlin Client", "version": env!("CARGO_PKG_VERSION")},
      "locale": "en",
      "processId": std::process::id(),
      "rootPath": root.to_string_lossy(),
      "rootUri": root_uri.as_str(),
      "capabilities": {
        "workspace": {
          "applyEdit": true,
          "workspaceEdit": {
            "documentChanges": true,
            "resourceOperations": ["create", "rename", "delete"],
            "failureHandling": "textOnlyTransactional",
            "normalizesLineEndings": true,
          },
          "didChangeConfiguration": {"dynamicRegistration": true},
          "didChangeWatchedFiles": {"dynamicRegistration": true, "relativePatternSupport": true},
          "symbol": {
            "dynamicRegistration": true,
            "symbolKind": {"valueSet": (1..=26).collect::<Vec<i32>>()},
          },
          "executeCommand": {"dynamicRegistration": true},
          "configuration": true,
          "workspaceFolders": true,
        },
        "textDocument": {
          "publishDiagnostics": {"relatedInformation": true, "versionSupport": false},
          "synchronization": {
            "dynamicRegistration": true,
            "willSave": true,
            "willSaveWaitUntil": true,
            "didSave": true,
          },
          "completion": {
            "dynamicRegistration": true,
            "contextSupport": true,
            "completionItem": {
              "snippetSupport": false,
              "commitCharactersSupport": true,
              "documentationFormat": ["markdown", "plaintext"],
              "deprecatedSupport": true,
              "preselectSupport": true,
            },
            "completionItemKind": {"valueSet": (1..=25).collect::<Vec<i32>>()},
          },
          "hover": {"dynamicRegistration": true, "contentFormat": ["markdown", "plaintext"]},
          "signatureHelp": {
            "dynamicRegistration": true,
            "signatureInformation": {
              "documentationFormat": ["markdown", "plaintext"],
              "parameterInformation": {"labelOffsetSupport": true},
            },
          },
          "definition": {"dynamicRegistration": true, "linkSupport": true},
          "references": {"dynamicRegistration": true},
          "documentHighlight": {"dynamicRegistration": true},
          "documentSymbol": {
            "dynamicRegistration": true,
            "symbolKind": {"valueSet": (1..=26).collect::<Vec<i32>>()},
            "hierarchicalDocumentSymbolSupport": true,
            "labelSupport": true,
          },
          "semanticTokens": {
            "dynamicRegistration": true,
            "formats": ["relative"],
            "requests": {"range": true, "full": {"delta": true}},
            "multilineTokenSupport": false,
            "overlappingTokenSupport": false,
          },
        },
        "window": {
          "showMessage": {"messageActionItem": {"additionalPropertiesSupport": true}},
          "showDocument": {"support": true},
          "workDoneProgress": true,
        },
        "general": {
          "regularExpressions": {"engine": "ECMAScript", "version": "ES2020"},
          "markdown": {"parser": "marked", "version": "1.1.0"},
          "positionEncodings": ["utf-16"],
        },
      },
      "initializationOptions": {
        "workspaceFolders": [root_uri.as_str()],
        "storagePath": null,
        "codegen": {"enabled": false},
        "compiler": {"jvm": {"target": "default"}},
        "completion": {"snippets": {"enabled": true}},
        "diagnostics": {"enabled": true, "level": 4, "debounceTime": 250},
        "scripts": {"enabled": true, "buildScriptsEnabled": true},
        "indexing": {"enabled": true},
        "externalSources": {"useKlsScheme": false, "autoConvertToKotlin": false},
        "inlayHints": {"typeHints": false, "parameterHints": false, "chainedHints": false},
      },
      "trace": "off",
      "workspaceFolders": [{"uri": root_uri.as_str(), "name": root_name}],
    }))
  }

  fn required_capabilities(&self) -> &'static [&'static str] {
    &[
      "textDocumentSync",
      "hoverProvider",
      "completionProvider",
      "signatureHelpProvider",
      "definitionProvider",
      "referencesProvider",
      "documentSymbolProvider",
      "workspaceSymbolProvider",
      "semanticTokensProvider",
    ]
  }
}
