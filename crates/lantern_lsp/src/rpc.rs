//! JSON-RPC multiplexer
//!
//! Correlates outbound requests with inbound responses by id, dispatches
//! server-originated requests and notifications to registered handlers, and
//! enforces per-request timeouts. One read-loop thread per client drives the
//! inbound stream; outbound writes are serialized through a single framed
//! writer, so requests hit the wire in submission order.

use lantern_core::prelude::*;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::transport::{FrameReader, FrameWriter};

/// Handler for a server-originated request; must produce a reply
pub type RequestHandler = Box<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Handler for a server-originated notification; fire-and-forget
pub type NotificationHandler = Box<dyn Fn(Value) + Send + Sync>;

/// Dispatch entry for one inbound method.
///
/// Handlers run on the read-loop thread and must not issue blocking
/// outbound requests of their own; the response they would wait on can only
/// be delivered by the thread they are blocking.
pub enum InboundHandler {
  Request(RequestHandler),
  Notification(NotificationHandler),
}

struct Shared {
  name: String,
  writer: Mutex<FrameWriter<Box<dyn Write + Send>>>,
  pending: Mutex<HashMap<i64, oneshot::Sender<Result<Value>>>>,
  handlers: Mutex<HashMap<String, InboundHandler>>,
  closed: AtomicBool,
  on_close: Mutex<Option<Box<dyn FnOnce(&Error) + Send>>>,
}

impl Shared {
  fn write(&self, message: &Value) -> Result<()> {
    self.writer.lock().write_frame(message)
  }

  /// Fail every pending request and run the close hook once
  fn close(&self, reason: Error) {
    self.closed.store(true, Ordering::SeqCst);
    let slots: Vec<_> = {
      let mut pending = self.pending.lock();
      pending.drain().collect()
    };
    for (id, tx) in slots {
      let _ = tx.send(Err(Error::TransportClosed {
        context: format!("request {} abandoned: {}", id, reason),
      }));
    }
    if let Some(hook) = self.on_close.lock().take() {
      hook(&reason);
    }
  }
}

/// JSON-RPC client over one language server's stdio streams
pub struct RpcClient {
  next_id: AtomicI64,
  shared: Arc<Shared>,
  default_timeout: Mutex<Duration>,
}

impl RpcClient {
  /// Create a client and start its read loop on a dedicated thread.
  ///
  /// `name` tags log lines (typically the language id).
  pub fn new(
    reader: impl BufRead + Send + 'static,
    writer: impl Write + Send + 'static,
    name: impl Into<String>,
  ) -> Arc<Self> {
    let name = name.into();
    let shared = Arc::new(Shared {
      name: name.clone(),
      writer: Mutex::new(FrameWriter::new(Box::new(writer) as Box<dyn Write + Send>)),
      pending: Mutex::new(HashMap::new()),
      handlers: Mutex::new(HashMap::new()),
      closed: AtomicBool::new(false),
      on_close: Mutex::new(None),
    });

    let loop_shared = Arc::clone(&shared);
    std::thread::Builder::new()
      .name(format!("lsp-read-{}", name))
      .spawn(move || read_loop(loop_shared, FrameReader::new(reader)))
      .expect("failed to spawn transport read thread");

    Arc::new(Self {
      next_id: AtomicI64::new(1),
      shared,
      default_timeout: Mutex::new(Duration::from_secs_f64(
        lantern_core::constants::DEFAULT_REQUEST_TIMEOUT_SECS,
      )),
    })
  }

  /// Set the default per-request timeout
  pub fn set_request_timeout(&self, timeout: Duration) {
    *self.default_timeout.lock() = timeout;
  }

  /// Whether the transport has closed
  pub fn is_closed(&self) -> bool {
    self.shared.closed.load(Ordering::SeqCst)
  }

  /// Run a hook when the read loop ends (normal EOF or failure)
  pub fn on_close(&self, hook: impl FnOnce(&Error) + Send + 'static) {
    *self.shared.on_close.lock() = Some(Box::new(hook));
  }

  /// Register a handler for a server-originated request
  pub fn on_request(
    &self,
    method: impl Into<String>,
    handler: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
  ) {
    self
      .shared
      .handlers
      .lock()
      .insert(method.into(), InboundHandler::Request(Box::new(handler)));
  }

  /// Register a handler for a server-originated notification
  pub fn on_notification(
    &self,
    method: impl Into<String>,
    handler: impl Fn(Value) + Send + Sync + 'static,
  ) {
    self
      .shared
      .handlers
      .lock()
      .insert(method.into(), InboundHandler::Notification(Box::new(handler)));
  }

  /// Send a request and wait for its response with the default timeout
  pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
    let timeout = *self.default_timeout.lock();
    self.request_with_timeout(method, params, timeout).await
  }

  /// Send a request and wait for its response with an explicit timeout.
  ///
  /// A timed-out request has its slot removed and a `$/cancelRequest` sent;
  /// a response arriving later is dropped by the read loop.
  pub async fn request_with_timeout(
    &self,
    method: &str,
    params: Value,
    timeout: Duration,
  ) -> Result<Value> {
    if self.is_closed() {
      return Err(Error::TransportClosed {
        context: format!("{}: transport already closed", self.shared.name),
      });
    }

    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    let (tx, rx) = oneshot::channel();
    self.shared.pending.lock().insert(id, tx);

    let message = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    });
    trace!(name = %self.shared.name, id, method, "Sending request");

    if let Err(e) = self.shared.write(&message) {
      self.shared.pending.lock().remove(&id);
      return Err(e);
    }

    match tokio::time::timeout(timeout, rx).await {
      Ok(Ok(result)) => result,
      Ok(Err(_)) => Err(Error::TransportClosed {
        context: format!("{}: response channel dropped", self.shared.name),
      }),
      Err(_) => {
        self.cancel(id);
        Err(Error::Timeout {
          method: method.to_string(),
          seconds: timeout.as_secs_f64(),
        })
      },
    }
  }

  /// Send a notification (no response expected)
  pub fn notify(&self, method: &str, params: Value) -> Result<()> {
    trace!(name = %self.shared.name, method, "Sending notification");
    self.shared.write(&json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    }))
  }

  /// Send a typed request
  pub async fn request_typed<R>(&self, params: R::Params) -> Result<R::Result>
  where
    R: lsp_types::request::Request,
    R::Params: Serialize,
    R::Result: DeserializeOwned,
  {
    let result = self.request(R::METHOD, serde_json::to_value(params)?).await?;
    Ok(serde_json::from_value(result)?)
  }

  /// Send a typed notification
  pub fn notify_typed<N>(&self, params: N::Params) -> Result<()>
  where
    N: lsp_types::notification::Notification,
    N::Params: Serialize,
  {
    self.notify(N::METHOD, serde_json::to_value(params)?)
  }

  /// Cancel an in-flight request: remove its slot and tell the server
  fn cancel(&self, id: i64) {
    self.shared.pending.lock().remove(&id);
    let _ = self.notify("$/cancelRequest", json!({ "id": id }));
  }
}

/// Inbound loop: classify each frame and dispatch it.
///
/// id + method   -> server request (reply with result or an error object)
/// id, no method -> response (fulfil the pending slot; drop unknown ids)
/// method, no id -> notification
fn read_loop<R: BufRead>(shared: Arc<Shared>, mut reader: FrameReader<R>) {
  let reason = loop {
    let message = match reader.read_frame() {
      Ok(message) => message,
      Err(e) => break e,
    };

    let id = message.get("id").cloned();
    let method = message
      .get("method")
      .and_then(Value::as_str)
      .map(str::to_string);

    match (id, method) {
      // Server requests may carry string ids; echo whatever we got
      (Some(id), Some(method)) => dispatch_server_request(&shared, id, &method, &message),
      (Some(id), None) => match id.as_i64() {
        // Our own outbound ids are always numeric
        Some(id) => dispatch_response(&shared, id, message),
        None => debug!(name = %shared.name, ?id, "Dropping response with non-numeric id"),
      },
      (None, Some(method)) => dispatch_notification(&shared, &method, &message),
      (None, None) => {
        warn!(name = %shared.name, "Dropping frame with neither id nor method");
      },
    }
  };

  match &reason {
    Error::TransportClosed { .. } => {
      debug!(name = %shared.name, "Transport closed: {}", reason);
    },
    _ => {
      error!(name = %shared.name, "Transport failed: {}", reason);
    },
  }
  shared.close(reason);
}

fn dispatch_server_request(shared: &Arc<Shared>, id: Value, method: &str, message: &Value) {
  let params = message.get("params").cloned().unwrap_or(Value::Null);
  let handlers = shared.handlers.lock();

  let reply = match handlers.get(method) {
    Some(InboundHandler::Request(handler)) => match handler(params) {
      Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
      Err(e) => json!({
          "jsonrpc": "2.0",
          "id": id,
          "error": {"code": -32603, "message": e.to_string()},
      }),
    },
    Some(InboundHandler::Notification(_)) | None => {
      debug!(name = %shared.name, method, "No request handler; replying MethodNotFound");
      json!({
          "jsonrpc": "2.0",
          "id": id,
          "error": {"code": -32601, "message": format!("Method not found: {}", method)},
      })
    },
  };
  drop(handlers);

  if let Err(e) = shared.write(&reply) {
    warn!(name = %shared.name, method, "Failed to reply to server request: {}", e);
  }
}

fn dispatch_response(shared: &Arc<Shared>, id: i64, message: Value) {
  let Some(tx) = shared.pending.lock().remove(&id) else {
    debug!(name = %shared.name, id, "Dropping response with unknown id");
    return;
  };

  let outcome = if let Some(error) = message.get("error") {
    Err(Error::Remote {
      code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
      message: error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string(),
    })
  } else {
    Ok(message.get("result").cloned().unwrap_or(Value::Null))
  };

  // Receiver may have timed out and gone away; that is fine
  let _ = tx.send(outcome);
}

fn dispatch_notification(shared: &Arc<Shared>, method: &str, message: &Value) {
  let params = message.get("params").cloned().unwrap_or(Value::Null);
  let handlers = shared.handlers.lock();
  match handlers.get(method) {
    Some(InboundHandler::Notification(handler)) => handler(params),
    Some(InboundHandler::Request(_)) => {
      warn!(name = %shared.name, method, "Notification arrived for a request handler; ignoring");
    },
    None => {
      trace!(name = %shared.name, method, "Unhandled notification");
    },
  }
}
