//! Backend selection and latching
//!
//! A session services symbol queries through exactly one backend family:
//! the in-process LSP core or an external editor plugin. The choice is
//! resolved when the first project activates (project override, else the
//! session default) and is then latched: switching mid-session would mean
//! tearing down live server sessions, which is disallowed. Later
//! activations must be compatible with the latched value.

use lantern_core::prelude::*;
use lantern_settings::LanguageBackend;
use parking_lot::Mutex;

/// Resolves and latches the effective backend for one session
pub struct BackendSelector {
  session_default: LanguageBackend,
  latched: Mutex<Option<LanguageBackend>>,
}

impl BackendSelector {
  pub fn new(session_default: LanguageBackend) -> Self {
    Self {
      session_default,
      latched: Mutex::new(None),
    }
  }

  /// The backend currently in effect: the latched value, or the session
  /// default when no project has activated yet.
  pub fn effective(&self) -> LanguageBackend {
    self.latched.lock().unwrap_or(self.session_default)
  }

  /// Resolve the backend for a project activation.
  ///
  /// The first activation latches `override ∥ session default`. Subsequent
  /// activations succeed iff the project's override is unset or equal to
  /// the latched backend; otherwise `BackendMismatch`.
  pub fn activate(
    &self,
    project: &str,
    backend_override: Option<LanguageBackend>,
  ) -> Result<LanguageBackend> {
    let mut latched = self.latched.lock();
    match *latched {
      None => {
        let chosen = backend_override.unwrap_or(self.session_default);
        info!(project, backend = %chosen, "Latching session backend");
        *latched = Some(chosen);
        Ok(chosen)
      },
      Some(active) => match backend_override {
        None => Ok(active),
        Some(requested) if requested == active => Ok(active),
        Some(requested) => Err(Error::BackendMismatch {
          project: project.to_string(),
          requested: requested.to_string(),
          active: active.to_string(),
        }),
      },
    }
  }
}
