//! Workspace path <-> file URI conversion
//!
//! Paths at the public API boundary are workspace-relative; everything on
//! the wire is a `file://` URI. Only the `file` scheme is supported.

use lantern_core::prelude::*;
use lsp_types::Uri;
use std::path::{Path, PathBuf};

// RFC 3986 pchar minus the percent-escape machinery; enough for file paths
fn is_unreserved(byte: u8) -> bool {
  byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'/' | b':' | b'+' | b'@')
}

/// Convert an absolute filesystem path to a `file://` URI
pub fn path_to_uri(path: &Path) -> Result<Uri> {
  let raw = path.to_string_lossy();
  let normalized = if cfg!(windows) {
    format!("/{}", raw.replace('\\', "/"))
  } else {
    raw.to_string()
  };

  let mut encoded = String::with_capacity(normalized.len() + 8);
  encoded.push_str("file://");
  for byte in normalized.bytes() {
    if is_unreserved(byte) {
      encoded.push(byte as char);
    } else {
      encoded.push_str(&format!("%{:02X}", byte));
    }
  }

  encoded
    .parse::<Uri>()
    .map_err(|e| Error::Protocol(format!("cannot build file URI for {:?}: {}", path, e)))
}

/// Convert a `file://` URI back to an absolute filesystem path
pub fn uri_to_path(uri: &Uri) -> Result<PathBuf> {
  let text = uri.as_str();
  let rest = text
    .strip_prefix("file://")
    .ok_or_else(|| Error::Protocol(format!("unsupported URI scheme: {}", text)))?;
  // Drop an authority component if present (usually empty)
  let path_part = match rest.find('/') {
    Some(0) => rest,
    Some(idx) => &rest[idx..],
    None => rest,
  };

  let decoded = percent_decode(path_part)?;
  if cfg!(windows) {
    // "/C:/..." -> "C:/..."
    let trimmed = decoded.strip_prefix('/').unwrap_or(&decoded);
    Ok(PathBuf::from(trimmed))
  } else {
    Ok(PathBuf::from(decoded))
  }
}

/// Workspace-relative path for a URI, or `None` when it points outside the root
pub fn uri_to_workspace_relative(uri: &Uri, root: &Path) -> Option<PathBuf> {
  let abs = uri_to_path(uri).ok()?;
  abs.strip_prefix(root).ok().map(Path::to_path_buf)
}

fn percent_decode(text: &str) -> Result<String> {
  let bytes = text.as_bytes();
  let mut out = Vec::with_capacity(bytes.len());
  let mut i = 0;
  while i < bytes.len() {
    if bytes[i] == b'%' {
      let hex = bytes
        .get(i + 1..i + 3)
        .and_then(|h| std::str::from_utf8(h).ok())
        .and_then(|h| u8::from_str_radix(h, 16).ok())
        .ok_or_else(|| Error::Protocol(format!("invalid percent escape in URI: {}", text)))?;
      out.push(hex);
      i += 3;
    } else {
      out.push(bytes[i]);
      i += 1;
    }
  }
  String::from_utf8(out).map_err(|_| Error::Protocol(format!("URI decodes to non-UTF-8: {}", text)))
}
