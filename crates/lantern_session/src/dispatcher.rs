//! Symbol-query dispatch
//!
//! The dispatcher resolves each project activation to a backend and routes
//! symbol operations there. The LSP backend drives the in-process client
//! core; the JetBrains backend is an external editor plugin registered by
//! the embedder and only its contract lives here.

use async_trait::async_trait;
use indexmap::IndexMap;
use lantern_core::prelude::*;
use lantern_lsp::{FileLocation, ServerRegistry, SymbolInfo, SymbolSummary, SymbolTreeNode};
use lantern_settings::{LanguageBackend, Settings};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::BackendSelector;
use crate::project::{ProjectEntry, ProjectRegistry};

/// The symbol operations a backend must service
#[async_trait]
pub trait SymbolBackend: Send + Sync + std::fmt::Debug {
  async fn request_document_symbols(
    &self,
    project: &ProjectEntry,
    language: &str,
    path: &Path,
  ) -> Result<(Vec<SymbolInfo>, Vec<SymbolInfo>)>;

  async fn request_full_symbol_tree(
    &self,
    project: &ProjectEntry,
    language: &str,
  ) -> Result<Vec<SymbolTreeNode>>;

  async fn request_references(
    &self,
    project: &ProjectEntry,
    language: &str,
    path: &Path,
    line: u32,
    character: u32,
  ) -> Result<Vec<FileLocation>>;

  async fn request_definition(
    &self,
    project: &ProjectEntry,
    language: &str,
    path: &Path,
    line: u32,
    character: u32,
  ) -> Result<Vec<FileLocation>>;

  async fn request_containing_symbol(
    &self,
    project: &ProjectEntry,
    language: &str,
    path: &Path,
    line: u32,
    character: u32,
    include_body: bool,
  ) -> Result<Option<SymbolInfo>>;

  async fn request_defining_symbol(
    &self,
    project: &ProjectEntry,
    language: &str,
    path: &Path,
    line: u32,
    character: u32,
  ) -> Result<Option<SymbolInfo>>;

  async fn request_document_overview(
    &self,
    project: &ProjectEntry,
    language: &str,
    path: &Path,
  ) -> Result<Vec<SymbolSummary>>;

  async fn request_dir_overview(
    &self,
    project: &ProjectEntry,
    language: &str,
    dir: &Path,
  ) -> Result<IndexMap<PathBuf, Vec<SymbolSummary>>>;

  /// Tear down whatever the backend holds for shutdown
  async fn shutdown(&self);
}

/// The in-process LSP backend over the server registry
pub struct LspSymbolBackend {
  registry: ServerRegistry,
  settings: Settings,
}

impl std::fmt::Debug for LspSymbolBackend {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LspSymbolBackend").finish_non_exhaustive()
  }
}

impl LspSymbolBackend {
  pub fn new(settings: Settings) -> Self {
    Self {
      registry: ServerRegistry::new(),
      settings,
    }
  }

  async fn server(
    &self,
    project: &ProjectEntry,
    language: &str,
  ) -> Result<Arc<lantern_lsp::LspServer>> {
    self
      .registry
      .get_or_start(&project.name, language, &project.root, &self.settings)
      .await
  }
}

#[async_trait]
impl SymbolBackend for LspSymbolBackend {
  async fn request_document_symbols(
    &self,
    project: &ProjectEntry,
    language: &str,
    path: &Path,
  ) -> Result<(Vec<SymbolInfo>, Vec<SymbolInfo>)> {
    self.server(project, language).await?.request_document_symbols(path).await
  }

  async fn request_full_symbol_tree(
    &self,
    project: &ProjectEntry,
    language: &str,
  ) -> Result<Vec<SymbolTreeNode>> {
    self.server(project, language).await?.request_full_symbol_tree().await
  }

  async fn request_references(
    &self,
    project: &ProjectEntry,
    language: &str,
    path: &Path,
    line: u32,
    character: u32,
  ) -> Result<Vec<FileLocation>> {
    self
      .server(project, language)
      .await?
      .request_references(path, line, character)
      .await
  }

  async fn request_definition(
    &self,
    project: &ProjectEntry,
    language: &str,
    path: &Path,
    line: u32,
    character: u32,
  ) -> Result<Vec<FileLocation>> {
    self
      .server(project, language)
      .await?
      .request_definition(path, line, character)
      .await
  }

  async fn request_containing_symbol(
    &self,
    project: &ProjectEntry,
    language: &str,
    path: &Path,
    line: u32,
    character: u32,
    include_body: bool,
  ) -> Result<Option<SymbolInfo>> {
    self
      .server(project, language)
      .await?
      .request_containing_symbol(path, line, character, include_body)
      .await
  }

  async fn request_defining_symbol(
    &self,
    project: &ProjectEntry,
    language: &str,
    path: &Path,
    line: u32,
    character: u32,
  ) -> Result<Option<SymbolInfo>> {
    self
      .server(project, language)
      .await?
      .request_defining_symbol(path, line, character)
      .await
  }

  async fn request_document_overview(
    &self,
    project: &ProjectEntry,
    language: &str,
    path: &Path,
  ) -> Result<Vec<SymbolSummary>> {
    self
      .server(project, language)
      .await?
      .request_document_overview(path)
      .await
  }

  async fn request_dir_overview(
    &self,
    project: &ProjectEntry,
    language: &str,
    dir: &Path,
  ) -> Result<IndexMap<PathBuf, Vec<SymbolSummary>>> {
    self.server(project, language).await?.request_dir_overview(dir).await
  }

  async fn shutdown(&self) {
    self.registry.stop_all().await;
  }
}

/// Routes each project's symbol queries to the effective backend
pub struct Dispatcher {
  selector: BackendSelector,
  projects: ProjectRegistry,
  lsp: Arc<dyn SymbolBackend>,
  external: RwLock<Option<Arc<dyn SymbolBackend>>>,
}

impl Dispatcher {
  /// Build a dispatcher; `startup_project`, when given, latches the
  /// session backend immediately.
  pub fn new(settings: Settings, startup_project: Option<&ProjectEntry>) -> Result<Self> {
    let selector = BackendSelector::new(settings.language_backend);
    if let Some(project) = startup_project {
      selector.activate(&project.name, project.backend_override)?;
    }
    Ok(Self {
      selector,
      projects: ProjectRegistry::new(),
      lsp: Arc::new(LspSymbolBackend::new(settings)),
      external: RwLock::new(None),
    })
  }

  /// Register the out-of-process editor-plugin backend
  pub fn set_external_backend(&self, backend: Arc<dyn SymbolBackend>) {
    *self.external.write() = Some(backend);
  }

  /// Project registry for this session
  pub fn projects(&self) -> &ProjectRegistry {
    &self.projects
  }

  /// The backend currently in effect
  pub fn effective_backend(&self) -> LanguageBackend {
    self.selector.effective()
  }

  /// Activate a project and return the backend servicing its queries.
  ///
  /// Fails with `BackendMismatch` when the project demands a different
  /// backend than the one latched for this session.
  pub fn activate(&self, project_name: &str) -> Result<(Arc<ProjectEntry>, Arc<dyn SymbolBackend>)> {
    let project = self.projects.get(project_name)?;
    let backend = self.selector.activate(&project.name, project.backend_override)?;
    let routed = match backend {
      LanguageBackend::Lsp => Arc::clone(&self.lsp),
      LanguageBackend::JetBrains => self
        .external
        .read()
        .clone()
        .ok_or_else(|| Error::BackendUnavailable("JetBrains".to_string()))?,
    };
    debug!(project = %project.name, backend = %backend, "Project activated");
    Ok((project, routed))
  }

  /// Tear everything down
  pub async fn shutdown(&self) {
    self.lsp.shutdown().await;
    if let Some(external) = self.external.read().clone() {
      external.shutdown().await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn settings_with(backend: LanguageBackend) -> Settings {
    Settings {
      language_backend: backend,
      ..Settings::default()
    }
  }

  #[test]
  fn test_activation_rules_match_session_latch() {
    let dispatcher = Dispatcher::new(settings_with(LanguageBackend::Lsp), None).unwrap();
    dispatcher.projects().register(ProjectEntry::new("plain", "/w/plain"));
    dispatcher.projects().register(
      ProjectEntry::new("jetbrains", "/w/jb").with_backend(LanguageBackend::JetBrains),
    );
    dispatcher
      .projects()
      .register(ProjectEntry::new("lsp", "/w/lsp").with_backend(LanguageBackend::Lsp));

    // First activation latches LSP (no override -> session default)
    dispatcher.activate("plain").unwrap();
    assert_eq!(dispatcher.effective_backend(), LanguageBackend::Lsp);

    // JetBrains override now mismatches
    let err = dispatcher.activate("jetbrains").unwrap_err();
    assert!(matches!(err, Error::BackendMismatch { .. }));

    // Explicit LSP override matches
    dispatcher.activate("lsp").unwrap();
  }

  #[test]
  fn test_startup_project_latches_backend() {
    let project = ProjectEntry::new("ide", "/w/ide").with_backend(LanguageBackend::JetBrains);
    let dispatcher =
      Dispatcher::new(settings_with(LanguageBackend::Lsp), Some(&project)).unwrap();
    assert_eq!(dispatcher.effective_backend(), LanguageBackend::JetBrains);
  }

  #[test]
  fn test_jetbrains_route_requires_registered_plugin() {
    let project = ProjectEntry::new("ide", "/w/ide").with_backend(LanguageBackend::JetBrains);
    let dispatcher =
      Dispatcher::new(settings_with(LanguageBackend::Lsp), Some(&project)).unwrap();
    dispatcher.projects().register(project);

    let err = dispatcher.activate("ide").unwrap_err();
    assert!(matches!(err, Error::BackendUnavailable(_)));
  }

  #[test]
  fn test_unknown_project() {
    let dispatcher = Dispatcher::new(Settings::default(), None).unwrap();
    assert!(matches!(
      dispatcher.activate("ghost"),
      Err(Error::ProjectNotFound(_))
    ));
  }
}
