//! Language server session lifecycle
//!
//! One [`LspServer`] owns one child process (or test transport), its RPC
//! client, the readiness coordinator, and the document-sync bookkeeping. The
//! startup handshake runs `initialize`/`initialized`, stores and asserts the
//! advertised capabilities, then waits out any asynchronous indexing before
//! queries are allowed through.

use lantern_core::prelude::*;
use lantern_fs::FileBufferCache;
use lantern_settings::Settings;
use lsp_types::Uri;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::{LanguageAdapter, ReadinessSignal};
use crate::launch::Platform;
use crate::process::ServerProcess;
use crate::readiness::{ReadinessCoordinator, ServerState};
use crate::rpc::RpcClient;
use crate::uri::path_to_uri;

struct OpenDoc {
  version: i32,
  generation: u64,
  handle: lantern_fs::FileHandle,
}

/// One running language-server session for a (project, language) pair
pub struct LspServer {
  language: String,
  root: PathBuf,
  pub(crate) adapter: Arc<dyn LanguageAdapter>,
  pub(crate) rpc: Arc<RpcClient>,
  process: Mutex<Option<ServerProcess>>,
  readiness: Arc<ReadinessCoordinator>,
  pub(crate) cache: Arc<FileBufferCache>,
  capabilities: RwLock<Option<Value>>,
  open_docs: Mutex<HashMap<PathBuf, OpenDoc>>,
  pub(crate) ignored_dirs: Vec<String>,
  indexing_timeout: Duration,
}

impl std::fmt::Debug for LspServer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LspServer")
      .field("language", &self.language)
      .field("root", &self.root)
      .finish_non_exhaustive()
  }
}

impl LspServer {
  /// Spawn the language server for `root` and run the startup handshake
  pub async fn start(
    adapter: Arc<dyn LanguageAdapter>,
    root: impl Into<PathBuf>,
    settings: &Settings,
  ) -> Result<Arc<Self>> {
    let root = root.into();
    let language_settings = settings.language(adapter.language_id());
    let descriptor = adapter.resolve_launch(&root, Platform::current(), &language_settings)?;
    let (process, stdin, stdout) = ServerProcess::spawn(adapter.language_id(), &descriptor)?;

    Self::connect(
      adapter,
      root,
      settings,
      BufReader::new(stdout),
      stdin,
      Some(process),
    )
    .await
  }

  /// Run a session over caller-supplied streams instead of a subprocess.
  ///
  /// This is how tests drive the client against an in-process fake server.
  pub async fn start_with_transport(
    adapter: Arc<dyn LanguageAdapter>,
    root: impl Into<PathBuf>,
    settings: &Settings,
    reader: impl BufRead + Send + 'static,
    writer: impl Write + Send + 'static,
  ) -> Result<Arc<Self>> {
    Self::connect(adapter, root.into(), settings, reader, writer, None).await
  }

  async fn connect(
    adapter: Arc<dyn LanguageAdapter>,
    root: PathBuf,
    settings: &Settings,
    reader: impl BufRead + Send + 'static,
    writer: impl Write + Send + 'static,
    process: Option<ServerProcess>,
  ) -> Result<Arc<Self>> {
    let language = adapter.language_id().to_string();
    let readiness = Arc::new(ReadinessCoordinator::new(&language));
    // stdin/stdout are connected from here on
    readiness.advance(ServerState::Initializing);

    let rpc = RpcClient::new(reader, writer, &language);
    let request_timeout = settings
      .timeouts
      .request_timeout_seconds
      .map(Duration::from_secs_f64)
      .unwrap_or_else(|| adapter.request_timeout());
    rpc.set_request_timeout(request_timeout);

    let indexing_timeout = settings
      .timeouts
      .indexing_timeout_seconds
      .map(Duration::from_secs_f64)
      .unwrap_or_else(|| adapter.indexing_timeout());

    // Service-message servers (Solargraph, ruby-lsp) may announce readiness
    // at any point after `initialize`; clear the latch before any traffic
    // can race the indexing wait
    if adapter.awaits_service_ready() {
      readiness.expect_service_ready();
    }

    register_handlers(&rpc, &adapter, &readiness);

    // An unexpected transport close fails the session; a close during
    // shutdown is the normal course of `exit`
    {
      let readiness = Arc::clone(&readiness);
      let language = language.clone();
      rpc.on_close(move |reason| {
        let state = readiness.state();
        if !matches!(state, ServerState::Stopping | ServerState::Stopped) {
          error!(%language, %state, "Transport closed unexpectedly: {}", reason);
          readiness.fail();
        }
      });
    }

    let mut ignored_dirs = adapter.ignored_dirnames();
    for extra in &settings.ignored_dirs {
      if !ignored_dirs.contains(extra) {
        ignored_dirs.push(extra.clone());
      }
    }

    let server = Arc::new(Self {
      language,
      cache: Arc::new(FileBufferCache::new(&root)),
      root,
      adapter,
      rpc,
      process: Mutex::new(process),
      readiness,
      capabilities: RwLock::new(None),
      open_docs: Mutex::new(HashMap::new()),
      ignored_dirs,
      indexing_timeout,
    });

    server.handshake().await?;
    Ok(server)
  }

  /// `initialize` -> capability assertion -> `initialized` -> indexing wait
  async fn handshake(&self) -> Result<()> {
    info!(language = %self.language, root = %self.root.display(), "Starting LSP handshake");

    let params = self.adapter.initialize_params(&self.root)?;
    let init_result = match self.rpc.request("initialize", params).await {
      Ok(result) => result,
      Err(e) => {
        self.readiness.fail();
        return Err(e);
      },
    };

    let capabilities = init_result.get("capabilities").cloned().unwrap_or(Value::Null);
    if let Err(e) = self.adapter.assert_capabilities(&capabilities) {
      self.readiness.fail();
      return Err(e);
    }
    *self.capabilities.write() = Some(capabilities);
    self.readiness.advance(ServerState::AwaitingInitialized);

    self.rpc.notify("initialized", json!({}))?;
    self.readiness.advance(ServerState::Indexing);

    debug!(language = %self.language, "Waiting for indexing to complete (if async)");
    if !self
      .readiness
      .wait_indexing_complete(self.indexing_timeout)
      .await
    {
      warn!(
        language = %self.language,
        timeout_secs = self.indexing_timeout.as_secs(),
        "Server did not signal indexing completion in time; proceeding anyway"
      );
      self.readiness.force_ready();
    }

    if self.readiness.state() == ServerState::Failed {
      return Err(Error::StartupFailed {
        language: self.language.clone(),
        reason: "transport closed during startup".to_string(),
      });
    }

    self.readiness.advance(ServerState::Ready);
    info!(language = %self.language, "Language server ready");
    Ok(())
  }

  /// Graceful shutdown: `shutdown` request, `exit` notification, then reap
  /// the child with two grace periods.
  pub async fn stop(&self) -> Result<()> {
    if matches!(
      self.readiness.state(),
      ServerState::Stopping | ServerState::Stopped
    ) {
      return Ok(());
    }
    self.readiness.advance(ServerState::Stopping);

    let open: Vec<PathBuf> = self.open_docs.lock().drain().map(|(path, _)| path).collect();
    for path in open {
      if let Ok(uri) = self.uri_for(&path) {
        let _ = self.rpc.notify(
          "textDocument/didClose",
          json!({"textDocument": {"uri": uri.as_str()}}),
        );
      }
    }

    let grace = Duration::from_secs(lantern_core::constants::SHUTDOWN_GRACE_SECS);
    if let Err(e) = self.rpc.request_with_timeout("shutdown", Value::Null, grace).await {
      debug!(language = %self.language, "shutdown request failed: {}", e);
    }
    let _ = self.rpc.notify("exit", Value::Null);

    let process = self.process.lock().take();
    if let Some(mut process) = process {
      process.reap(grace).await?;
    }

    self.readiness.advance(ServerState::Stopped);
    info!(language = %self.language, "Language server stopped");
    Ok(())
  }

  /// Language id of this session
  pub fn language(&self) -> &str {
    &self.language
  }

  /// Workspace root of this session
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Current lifecycle state
  pub fn state(&self) -> ServerState {
    self.readiness.state()
  }

  /// Whether queries are being admitted
  pub fn is_ready(&self) -> bool {
    self.readiness.state() == ServerState::Ready
  }

  /// The capability record from the `initialize` response
  pub fn capabilities(&self) -> Option<Value> {
    self.capabilities.read().clone()
  }

  /// Buffer cache serving this session's workspace
  pub fn cache(&self) -> &Arc<FileBufferCache> {
    &self.cache
  }

  pub(crate) fn ensure_ready(&self) -> Result<()> {
    let state = self.readiness.state();
    if state == ServerState::Ready {
      Ok(())
    } else {
      Err(Error::ServerNotRunning {
        language: format!("{} (state: {})", self.language, state),
      })
    }
  }

  pub(crate) fn uri_for(&self, rel: &Path) -> Result<Uri> {
    path_to_uri(&self.root.join(rel))
  }

  /// Open or refresh a document with the server and return its contents.
  ///
  /// First touch sends `didOpen`; a buffer-cache generation bump (external
  /// edit) sends a full-text `didChange` with the next version.
  pub(crate) fn sync_document(&self, rel: &Path) -> Result<Arc<str>> {
    let mut docs = self.open_docs.lock();
    if let Some(doc) = docs.get_mut(rel) {
      let snapshot = doc.handle.snapshot()?;
      if snapshot.generation != doc.generation {
        doc.version += 1;
        doc.generation = snapshot.generation;
        let uri = self.uri_for(rel)?;
        debug!(language = %self.language, path = %rel.display(), version = doc.version, "Resyncing changed document");
        self.rpc.notify(
          "textDocument/didChange",
          json!({
            "textDocument": {"uri": uri.as_str(), "version": doc.version},
            "contentChanges": [{"text": &*snapshot.contents}],
          }),
        )?;
      }
      return Ok(snapshot.contents);
    }

    let handle = self.cache.open(rel)?;
    let snapshot = handle.snapshot()?;
    let uri = self.uri_for(rel)?;
    self.rpc.notify(
      "textDocument/didOpen",
      json!({
        "textDocument": {
          "uri": uri.as_str(),
          "languageId": self.adapter.document_language_id(),
          "version": 1,
          "text": &*snapshot.contents,
        },
      }),
    )?;
    docs.insert(
      rel.to_path_buf(),
      OpenDoc {
        version: 1,
        generation: snapshot.generation,
        handle,
      },
    );
    Ok(snapshot.contents)
  }
}

/// Wire the default inbound handlers for one session
fn register_handlers(
  rpc: &RpcClient,
  adapter: &Arc<dyn LanguageAdapter>,
  readiness: &Arc<ReadinessCoordinator>,
) {
  let apply = {
    let readiness = Arc::clone(readiness);
    move |signal: ReadinessSignal| match signal {
      ReadinessSignal::TokenStarted(token) => readiness.token_started(&token),
      ReadinessSignal::TokenEnded(token) => readiness.token_ended(&token),
      ReadinessSignal::ServiceReady => readiness.service_ready(),
    }
  };

  {
    let adapter = Arc::clone(adapter);
    let apply = apply.clone();
    rpc.on_request("window/workDoneProgress/create", move |params| {
      if let Some(signal) = adapter.readiness_signal("window/workDoneProgress/create", &params) {
        apply(signal);
      }
      Ok(Value::Null)
    });
  }

  {
    let adapter = Arc::clone(adapter);
    let apply = apply.clone();
    rpc.on_notification("$/progress", move |params| {
      if let Some(message) = params.get("value").and_then(|v| v.get("message")).and_then(Value::as_str) {
        debug!(progress = %message, "Server progress");
      }
      if let Some(signal) = adapter.readiness_signal("$/progress", &params) {
        apply(signal);
      }
    });
  }

  {
    let adapter = Arc::clone(adapter);
    let apply = apply.clone();
    let language = adapter.language_id();
    rpc.on_notification("window/logMessage", move |params| {
      let message = params.get("message").and_then(Value::as_str).unwrap_or("");
      info!(%language, "window/logMessage: {}", message);
      if let Some(signal) = adapter.readiness_signal("window/logMessage", &params) {
        apply(signal);
      }
    });
  }

  {
    let adapter = Arc::clone(adapter);
    rpc.on_notification("language/status", move |params| {
      if let Some(signal) = adapter.readiness_signal("language/status", &params) {
        apply(signal);
      }
    });
  }

  rpc.on_request("client/registerCapability", |params| {
    if let Some(registrations) = params.get("registrations").and_then(Value::as_array) {
      for registration in registrations {
        if let Some(method) = registration.get("method").and_then(Value::as_str) {
          debug!(method, "Accepted capability registration");
        }
      }
    }
    Ok(Value::Null)
  });

  rpc.on_request("workspace/executeClientCommand", |_params| Ok(json!([])));

  // Diagnostics and trace chatter are not consumed by the core
  rpc.on_notification("textDocument/publishDiagnostics", |_| {});
  rpc.on_notification("$/logTrace", |_| {});
}
