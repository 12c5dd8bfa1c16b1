//! Per-server readiness tracking
//!
//! Two families of servers exist in the wild. Synchronous-indexing servers
//! only return from `initialize` once the workspace is queryable; they never
//! send `$/progress` and the latch stays set. Asynchronous-indexing servers
//! return `initialize` quickly and then report work-done progress tokens;
//! the latch clears on the first token and sets again when the tracked set
//! drains. A third variant (Solargraph-style) signals readiness through a
//! status notification instead of tokens.
//!
//! One lock guards both the lifecycle state and the token set; the latch is
//! broadcast through a watch channel so any number of query threads can
//! wait on it.

use lantern_core::prelude::*;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::watch;

/// Lifecycle state of one language-server session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
  Spawning,
  Initializing,
  AwaitingInitialized,
  Indexing,
  Ready,
  Stopping,
  Stopped,
  Failed,
}

impl std::fmt::Display for ServerState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      ServerState::Spawning => "spawning",
      ServerState::Initializing => "initializing",
      ServerState::AwaitingInitialized => "awaiting-initialized",
      ServerState::Indexing => "indexing",
      ServerState::Ready => "ready",
      ServerState::Stopping => "stopping",
      ServerState::Stopped => "stopped",
      ServerState::Failed => "failed",
    };
    f.write_str(name)
  }
}

struct Inner {
  state: ServerState,
  tokens: HashSet<String>,
}

/// Tracks lifecycle state and the indexing-complete latch for one session
pub struct ReadinessCoordinator {
  language: String,
  inner: Mutex<Inner>,
  // true exactly when the tracked token set is empty (or readiness was forced)
  latch: watch::Sender<bool>,
}

impl ReadinessCoordinator {
  /// New coordinator in `Spawning` with the latch SET
  pub fn new(language: impl Into<String>) -> Self {
    let (latch, _) = watch::channel(true);
    Self {
      language: language.into(),
      inner: Mutex::new(Inner {
        state: ServerState::Spawning,
        tokens: HashSet::new(),
      }),
      latch,
    }
  }

  /// Current lifecycle state
  pub fn state(&self) -> ServerState {
    self.inner.lock().state
  }

  /// Move to a new lifecycle state
  pub fn advance(&self, to: ServerState) {
    let mut inner = self.inner.lock();
    if inner.state == to {
      return;
    }
    debug!(language = %self.language, from = %inner.state, to = %to, "Server state transition");
    inner.state = to;
  }

  /// Record an unrecoverable failure; all waiters are released so they can
  /// observe the failed state instead of blocking forever.
  pub fn fail(&self) {
    let mut inner = self.inner.lock();
    if matches!(inner.state, ServerState::Stopped | ServerState::Failed) {
      return;
    }
    warn!(language = %self.language, from = %inner.state, "Server session failed");
    inner.state = ServerState::Failed;
    inner.tokens.clear();
    self.latch.send_replace(true);
  }

  /// A progress token started (`window/workDoneProgress/create` or a
  /// `$/progress` begin). Duplicate starts for one token are collapsed.
  pub fn token_started(&self, token: &str) {
    let mut inner = self.inner.lock();
    if inner.tokens.insert(token.to_string()) {
      debug!(language = %self.language, token, "Progress token started");
    }
    self.latch.send_replace(false);
  }

  /// A progress token ended. Unknown tokens are ignored.
  pub fn token_ended(&self, token: &str) {
    let mut inner = self.inner.lock();
    if !inner.tokens.remove(token) {
      debug!(language = %self.language, token, "Ignoring end for unknown progress token");
      return;
    }
    debug!(language = %self.language, token, "Progress token ended");
    if inner.tokens.is_empty() {
      self.latch.send_replace(true);
    }
  }

  /// Clear the latch without a token, for servers that announce readiness
  /// through a status message rather than progress tokens.
  pub fn expect_service_ready(&self) {
    let _inner = self.inner.lock();
    self.latch.send_replace(false);
  }

  /// The service-ready signal arrived; indexing counts as complete.
  pub fn service_ready(&self) {
    let mut inner = self.inner.lock();
    inner.tokens.clear();
    self.latch.send_replace(true);
  }

  /// Force the latch set after a ceiling expired
  pub fn force_ready(&self) {
    let mut inner = self.inner.lock();
    inner.tokens.clear();
    self.latch.send_replace(true);
  }

  /// Whether indexing is currently complete
  pub fn is_indexing_complete(&self) -> bool {
    *self.latch.borrow()
  }

  /// Wait until the latch is SET, up to `timeout`. Returns whether the
  /// latch was observed set (false means the ceiling expired).
  pub async fn wait_indexing_complete(&self, timeout: Duration) -> bool {
    let mut rx = self.latch.subscribe();
    let result = tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await;
    matches!(result, Ok(Ok(_)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_latch_starts_set() {
    let readiness = ReadinessCoordinator::new("kotlin");
    assert!(readiness.is_indexing_complete());
    assert_eq!(readiness.state(), ServerState::Spawning);
  }

  #[test]
  fn test_token_lifecycle() {
    let readiness = ReadinessCoordinator::new("kotlin");
    readiness.token_started("t1");
    assert!(!readiness.is_indexing_complete());

    readiness.token_started("t2");
    readiness.token_ended("t1");
    assert!(!readiness.is_indexing_complete());

    readiness.token_ended("t2");
    assert!(readiness.is_indexing_complete());
  }

  #[test]
  fn test_duplicate_start_single_end() {
    let readiness = ReadinessCoordinator::new("kotlin");
    // create + begin for the same token count once
    readiness.token_started("t1");
    readiness.token_started("t1");
    readiness.token_ended("t1");
    assert!(readiness.is_indexing_complete());
  }

  #[test]
  fn test_unknown_end_ignored() {
    let readiness = ReadinessCoordinator::new("kotlin");
    readiness.token_started("t1");
    readiness.token_ended("bogus");
    assert!(!readiness.is_indexing_complete());
  }

  #[test]
  fn test_service_ready_flow() {
    let readiness = ReadinessCoordinator::new("ruby");
    readiness.expect_service_ready();
    assert!(!readiness.is_indexing_complete());
    readiness.service_ready();
    assert!(readiness.is_indexing_complete());
  }

  #[test]
  fn test_fail_releases_waiters() {
    let readiness = ReadinessCoordinator::new("ruby");
    readiness.token_started("t1");
    readiness.fail();
    assert_eq!(readiness.state(), ServerState::Failed);
    assert!(readiness.is_indexing_complete());
  }

  #[tokio::test]
  async fn test_wait_times_out() {
    let readiness = ReadinessCoordinator::new("kotlin");
    readiness.token_started("t1");
    let ready = readiness
      .wait_indexing_complete(Duration::from_millis(50))
      .await;
    assert!(!ready);
  }

  #[tokio::test]
  async fn test_wait_observes_set() {
    let readiness = std::sync::Arc::new(ReadinessCoordinator::new("kotlin"));
    readiness.token_started("t1");

    let waiter = std::sync::Arc::clone(&readiness);
    let task = tokio::spawn(async move {
      waiter.wait_indexing_complete(Duration::from_secs(5)).await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    readiness.token_ended("t1");
    assert!(task.await.unwrap());
  }
}
