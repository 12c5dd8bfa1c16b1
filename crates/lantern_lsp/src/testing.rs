//! In-memory byte pipes for exercising the client against scripted peers.
//!
//! Tests wire a client to a fake server thread with two of these pipes, one
//! per direction, instead of a real subprocess. Dropping either end closes
//! the stream: the reader sees EOF, the writer sees `BrokenPipe`.

use std::io::{Read, Write};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

/// Create a unidirectional in-memory byte stream
pub fn byte_pipe() -> (PipeWriter, PipeReader) {
  let (tx, rx) = channel();
  (
    PipeWriter { tx },
    PipeReader {
      rx,
      buffer: Vec::new(),
      pos: 0,
      eof: false,
    },
  )
}

/// Write half of an in-memory pipe
pub struct PipeWriter {
  tx: Sender<Vec<u8>>,
}

impl Write for PipeWriter {
  fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
    self
      .tx
      .send(buf.to_vec())
      .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe reader dropped"))?;
    Ok(buf.len())
  }

  fn flush(&mut self) -> std::io::Result<()> {
    Ok(())
  }
}

/// Read half of an in-memory pipe
pub struct PipeReader {
  rx: Receiver<Vec<u8>>,
  buffer: Vec<u8>,
  pos: usize,
  eof: bool,
}

impl Read for PipeReader {
  fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
    if self.pos >= self.buffer.len() {
      if self.eof {
        return Ok(0);
      }
      // Block for the next chunk; a dropped writer means EOF
      match self.rx.recv() {
        Ok(chunk) => {
          self.buffer = chunk;
          self.pos = 0;
        },
        Err(_) => {
          self.eof = true;
          return Ok(0);
        },
      }
      // Coalesce whatever else is already queued
      loop {
        match self.rx.try_recv() {
          Ok(chunk) => self.buffer.extend(chunk),
          Err(TryRecvError::Empty) => break,
          Err(TryRecvError::Disconnected) => {
            self.eof = true;
            break;
          },
        }
      }
    }

    let n = buf.len().min(self.buffer.len() - self.pos);
    buf[..n].copy_from_slice(&self.buffer[self.pos..self.pos + n]);
    self.pos += n;
    Ok(n)
  }
}
