//! Scripted fake language server for integration tests.
//!
//! Runs on a plain thread speaking framed JSON-RPC over in-memory pipes, so
//! a whole client session (handshake, readiness, queries, shutdown) can be
//! exercised without any real server binary.
#![allow(dead_code)]

use lantern_lsp::testing::{byte_pipe, PipeReader, PipeWriter};
use lantern_lsp::transport::{FrameReader, FrameWriter};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::BufReader;

pub struct FakeServer {
  /// `capabilities` object returned from `initialize`
  pub capabilities: Value,
  /// Complete JSON-RPC messages pushed right after `initialized` arrives
  /// (server requests carry their own ids; the client's replies are read
  /// and discarded)
  pub after_initialized: Vec<Value>,
  /// documentSymbol results keyed by URI suffix (usually the file name)
  pub document_symbols: HashMap<String, Value>,
  /// Result for `textDocument/references`
  pub references: Value,
  /// Result for `textDocument/definition`
  pub definition: Value,
}

impl Default for FakeServer {
  fn default() -> Self {
    Self {
      capabilities: json!({
        "textDocumentSync": 1,
        "documentSymbolProvider": true,
        "referencesProvider": true,
        "definitionProvider": true,
        "completionProvider": {},
      }),
      after_initialized: Vec::new(),
      document_symbols: HashMap::new(),
      references: Value::Null,
      definition: Value::Null,
    }
  }
}

impl FakeServer {
  /// Start the fake server thread; returns the client-side streams
  pub fn launch(self) -> (BufReader<PipeReader>, PipeWriter) {
    let (client_writer, server_reader) = byte_pipe();
    let (server_writer, client_reader) = byte_pipe();

    std::thread::spawn(move || {
      self.run(
        FrameReader::new(BufReader::new(server_reader)),
        FrameWriter::new(server_writer),
      )
    });

    (BufReader::new(client_reader), client_writer)
  }

  fn run(self, mut reader: FrameReader<BufReader<PipeReader>>, mut writer: FrameWriter<PipeWriter>) {
    let respond = |writer: &mut FrameWriter<PipeWriter>, id: &Value, result: Value| {
      let _ = writer.write_frame(&json!({"jsonrpc": "2.0", "id": id, "result": result}));
    };

    while let Ok(message) = reader.read_frame() {
      let id = message.get("id").cloned();
      let method = message.get("method").and_then(Value::as_str).map(str::to_string);

      match (method.as_deref(), &id) {
        (Some("initialize"), Some(id)) => {
          respond(&mut writer, id, json!({"capabilities": self.capabilities}));
        },
        (Some("initialized"), _) => {
          for push in &self.after_initialized {
            if writer.write_frame(push).is_err() {
              return;
            }
          }
        },
        (Some("textDocument/documentSymbol"), Some(id)) => {
          let uri = message["params"]["textDocument"]["uri"]
            .as_str()
            .unwrap_or_default()
            .to_string();
          let result = self
            .document_symbols
            .iter()
            .find(|(suffix, _)| uri.ends_with(suffix.as_str()))
            .map(|(_, symbols)| symbols.clone())
            .unwrap_or(Value::Null);
          respond(&mut writer, id, result);
        },
        (Some("textDocument/references"), Some(id)) => {
          respond(&mut writer, id, self.references.clone());
        },
        (Some("textDocument/definition"), Some(id)) => {
          respond(&mut writer, id, self.definition.clone());
        },
        (Some("shutdown"), Some(id)) => {
          respond(&mut writer, id, Value::Null);
        },
        (Some("exit"), _) => return,
        (Some(_), Some(id)) => {
          // Anything else request-shaped gets an empty result
          respond(&mut writer, id, Value::Null);
        },
        // Client notifications and replies to our own requests
        _ => {},
      }
    }
  }
}

/// A server request announcing a work-done progress token
pub fn progress_create(id: i64, token: &str) -> Value {
  json!({
    "jsonrpc": "2.0",
    "id": id,
    "method": "window/workDoneProgress/create",
    "params": {"token": token},
  })
}

/// A `$/progress` notification
pub fn progress(token: &str, kind: &str) -> Value {
  json!({
    "jsonrpc": "2.0",
    "method": "$/progress",
    "params": {"token": token, "value": {"kind": kind}},
  })
}
