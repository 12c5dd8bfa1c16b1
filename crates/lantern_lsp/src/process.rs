//! Subprocess host for language servers
//!
//! Spawns the server with the launch descriptor's command, cwd, and env
//! overlay, wires stdin/stdout into the transport, drains stderr into the
//! log, and reaps the child on shutdown with two grace periods before
//! escalating to a kill.

use lantern_core::prelude::*;
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::launch::LaunchDescriptor;

/// A running language server child process
#[derive(Debug)]
pub struct ServerProcess {
  child: Child,
  language: String,
}

impl ServerProcess {
  /// Spawn the server and hand back its stdio streams.
  ///
  /// The inherited environment is kept and the descriptor's overlay applied
  /// on top; `None` entries unset inherited variables.
  pub fn spawn(
    language: &str,
    descriptor: &LaunchDescriptor,
  ) -> Result<(Self, ChildStdin, ChildStdout)> {
    let mut command = Command::new(&descriptor.command);
    command
      .args(&descriptor.args)
      .current_dir(&descriptor.cwd)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());

    for (key, value) in &descriptor.env {
      match value {
        Some(value) => {
          command.env(key, value);
        },
        None => {
          command.env_remove(key);
        },
      }
    }

    let mut child = command.spawn().map_err(|e| Error::StartupFailed {
      language: language.to_string(),
      reason: format!("failed to spawn {}: {}", descriptor.command.display(), e),
    })?;

    info!(
      language,
      pid = child.id(),
      command = %descriptor.command.display(),
      "Language server process started"
    );

    let stdin = child.stdin.take().ok_or_else(|| Error::StartupFailed {
      language: language.to_string(),
      reason: "child stdin not captured".to_string(),
    })?;
    let stdout = child.stdout.take().ok_or_else(|| Error::StartupFailed {
      language: language.to_string(),
      reason: "child stdout not captured".to_string(),
    })?;

    if let Some(stderr) = child.stderr.take() {
      let tag = language.to_string();
      std::thread::Builder::new()
        .name(format!("lsp-stderr-{}", language))
        .spawn(move || {
          for line in BufReader::new(stderr).lines() {
            match line {
              Ok(line) => debug!(language = %tag, "stderr: {}", line),
              Err(_) => break,
            }
          }
        })
        .ok();
    }

    Ok((
      Self {
        child,
        language: language.to_string(),
      },
      stdin,
      stdout,
    ))
  }

  /// Process id of the child
  pub fn pid(&self) -> u32 {
    self.child.id()
  }

  /// Non-blocking exit check
  pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
    Ok(self.child.try_wait()?)
  }

  /// Wait up to `grace` for the child to exit on its own, then terminate,
  /// wait a second grace period, and finally kill. Returns the exit status
  /// when one was observed.
  pub async fn reap(&mut self, grace: Duration) -> Result<Option<ExitStatus>> {
    if let Some(status) = self.wait_with_deadline(grace).await? {
      self.log_exit(&status);
      return Ok(Some(status));
    }

    warn!(language = %self.language, "Server did not exit in time; terminating");
    let _ = self.child.kill();
    if let Some(status) = self.wait_with_deadline(grace).await? {
      self.log_exit(&status);
      return Ok(Some(status));
    }

    error!(language = %self.language, "Server unresponsive to kill");
    Ok(None)
  }

  async fn wait_with_deadline(&mut self, grace: Duration) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + grace;
    loop {
      if let Some(status) = self.child.try_wait()? {
        return Ok(Some(status));
      }
      if Instant::now() >= deadline {
        return Ok(None);
      }
      tokio::time::sleep(Duration::from_millis(50)).await;
    }
  }

  fn log_exit(&self, status: &ExitStatus) {
    if status.success() {
      info!(language = %self.language, "Language server exited cleanly");
    } else {
      warn!(language = %self.language, %status, "Language server exited abnormally");
    }
  }
}

impl Drop for ServerProcess {
  fn drop(&mut self) {
    // Last-resort reap if shutdown never ran
    if let Ok(None) = self.child.try_wait() {
      let _ = self.child.kill();
      let _ = self.child.wait();
    }
  }
}
