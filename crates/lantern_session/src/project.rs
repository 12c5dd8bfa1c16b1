//! Registered projects

use dashmap::DashMap;
use lantern_core::prelude::*;
use lantern_settings::LanguageBackend;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// A project known to the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
  pub id: ProjectId,
  pub name: String,
  pub root: PathBuf,
  /// Language ids this project's queries route to
  pub languages: Vec<String>,
  /// Per-project backend override; `None` inherits the session default
  pub backend_override: Option<LanguageBackend>,
}

impl ProjectEntry {
  pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
    Self {
      id: ProjectId::new(),
      name: name.into(),
      root: root.into(),
      languages: Vec::new(),
      backend_override: None,
    }
  }

  pub fn with_languages(mut self, languages: impl IntoIterator<Item = String>) -> Self {
    self.languages = languages.into_iter().collect();
    self
  }

  pub fn with_backend(mut self, backend: LanguageBackend) -> Self {
    self.backend_override = Some(backend);
    self
  }
}

/// Registry of projects, keyed by name
#[derive(Default)]
pub struct ProjectRegistry {
  projects: DashMap<String, Arc<ProjectEntry>>,
}

impl ProjectRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&self, project: ProjectEntry) -> Arc<ProjectEntry> {
    let entry = Arc::new(project);
    self.projects.insert(entry.name.clone(), Arc::clone(&entry));
    entry
  }

  pub fn get(&self, name: &str) -> Result<Arc<ProjectEntry>> {
    self
      .projects
      .get(name)
      .map(|entry| Arc::clone(&entry))
      .ok_or_else(|| Error::ProjectNotFound(name.to_string()))
  }

  pub fn names(&self) -> Vec<String> {
    self.projects.iter().map(|entry| entry.key().clone()).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_register_and_lookup() {
    let registry = ProjectRegistry::new();
    registry.register(ProjectEntry::new("api", "/work/api").with_languages(["ruby".to_string()]));

    let entry = registry.get("api").unwrap();
    assert_eq!(entry.languages, vec!["ruby"]);
    assert!(entry.backend_override.is_none());

    assert!(matches!(
      registry.get("missing"),
      Err(Error::ProjectNotFound(_))
    ));
  }
}
