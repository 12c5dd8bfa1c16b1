//! Server session registry
//!
//! Exactly one live session per (project, language) pair. Sessions are
//! started lazily on first use and torn down together on shutdown.

use dashmap::DashMap;
use lantern_core::prelude::*;
use lantern_settings::Settings;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::adapter_for;
use crate::server::LspServer;

/// Registry of running language-server sessions
#[derive(Default)]
pub struct ServerRegistry {
  servers: DashMap<(String, String), Arc<LspServer>>,
}

impl ServerRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Get the running session for a (project, language) pair, if any
  pub fn get(&self, project: &str, language: &str) -> Option<Arc<LspServer>> {
    self
      .servers
      .get(&(project.to_string(), language.to_string()))
      .map(|entry| Arc::clone(&entry))
  }

  /// Get or start the session for a (project, language) pair
  pub async fn get_or_start(
    &self,
    project: &str,
    language: &str,
    root: impl Into<PathBuf>,
    settings: &Settings,
  ) -> Result<Arc<LspServer>> {
    let key = (project.to_string(), language.to_string());
    if let Some(server) = self.servers.get(&key) {
      if server.is_ready() {
        return Ok(Arc::clone(&server));
      }
      // A failed or stopped session is replaced below
      drop(server);
      self.servers.remove(&key);
    }

    let adapter = adapter_for(language).ok_or_else(|| Error::DependencyMissing {
      language: language.to_string(),
      reason: "no adapter registered for this language".to_string(),
    })?;

    info!(project, language, "Starting language server session");
    let server = LspServer::start(adapter, root, settings).await?;
    self.servers.insert(key, Arc::clone(&server));
    Ok(server)
  }

  /// Stop one session
  pub async fn stop(&self, project: &str, language: &str) -> Result<()> {
    if let Some((_, server)) = self
      .servers
      .remove(&(project.to_string(), language.to_string()))
    {
      server.stop().await?;
    }
    Ok(())
  }

  /// Stop every session
  pub async fn stop_all(&self) {
    let keys: Vec<_> = self
      .servers
      .iter()
      .map(|entry| entry.key().clone())
      .collect();
    for (project, language) in keys {
      if let Err(e) = self.stop(&project, &language).await {
        warn!(%project, %language, "Failed to stop language server: {}", e);
      }
    }
  }

  /// Running sessions as (project, language, state) triples
  pub fn status(&self) -> Vec<(String, String, crate::readiness::ServerState)> {
    self
      .servers
      .iter()
      .map(|entry| {
        let (project, language) = entry.key().clone();
        (project, language, entry.value().state())
      })
      .collect()
  }
}
