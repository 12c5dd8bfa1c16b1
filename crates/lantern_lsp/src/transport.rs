//! LSP wire framing
//!
//! A frame is `Content-Length: N\r\n\r\n` followed by N bytes of UTF-8 JSON.
//! Header names are matched case-insensitively and unknown headers (such as
//! `Content-Type`) are ignored. No other transports are supported.

use lantern_core::prelude::*;
use serde_json::Value;
use std::io::{BufRead, Write};

/// Reads LSP frames off an arbitrary byte stream
pub struct FrameReader<R> {
  reader: R,
}

impl<R: BufRead> FrameReader<R> {
  pub fn new(reader: R) -> Self {
    Self { reader }
  }

  /// Read the next complete frame.
  ///
  /// Returns `TransportClosed` on EOF at a frame boundary and `Protocol` for
  /// malformed headers, short reads, non-UTF-8 bodies, or invalid JSON.
  pub fn read_frame(&mut self) -> Result<Value> {
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;

    loop {
      let mut line = String::new();
      let n = self
        .reader
        .read_line(&mut line)
        .map_err(|e| Error::TransportClosed {
          context: format!("read error: {}", e),
        })?;
      if n == 0 {
        if saw_header {
          return Err(Error::Protocol("EOF inside frame header".to_string()));
        }
        return Err(Error::TransportClosed {
          context: "EOF at frame boundary".to_string(),
        });
      }

      let line = line.trim_end_matches(['\r', '\n']);
      if line.is_empty() {
        break;
      }
      saw_header = true;

      let Some((name, value)) = line.split_once(':') else {
        return Err(Error::Protocol(format!("malformed header line: {:?}", line)));
      };
      if name.trim().eq_ignore_ascii_case("content-length") {
        let parsed = value
          .trim()
          .parse::<usize>()
          .map_err(|_| Error::Protocol(format!("invalid Content-Length: {:?}", value.trim())))?;
        content_length = Some(parsed);
      }
      // Content-Type and anything else: ignored
    }

    let len = content_length
      .ok_or_else(|| Error::Protocol("frame header missing Content-Length".to_string()))?;

    let mut body = vec![0u8; len];
    self
      .reader
      .read_exact(&mut body)
      .map_err(|_| Error::Protocol(format!("short read: expected {} body bytes", len)))?;

    let text = std::str::from_utf8(&body)
      .map_err(|_| Error::Protocol("frame body is not valid UTF-8".to_string()))?;
    serde_json::from_str(text).map_err(|e| Error::Protocol(format!("invalid JSON body: {}", e)))
  }
}

/// Writes LSP frames onto an arbitrary byte stream
pub struct FrameWriter<W> {
  writer: W,
}

impl<W: Write> FrameWriter<W> {
  pub fn new(writer: W) -> Self {
    Self { writer }
  }

  /// Serialize one JSON value as a framed message
  pub fn write_frame(&mut self, message: &Value) -> Result<()> {
    let body = serde_json::to_string(message)?;
    let closed = |e: std::io::Error| Error::TransportClosed {
      context: format!("write failed: {}", e),
    };

    self
      .writer
      .write_all(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes())
      .map_err(closed)?;
    self.writer.write_all(body.as_bytes()).map_err(closed)?;
    self.writer.flush().map_err(closed)?;
    Ok(())
  }
}
