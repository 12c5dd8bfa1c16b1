//! Error types for Lantern
//!
//! This module provides a unified error handling strategy using `thiserror`
//! for defining error types and `anyhow` for error propagation with context.

use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for Lantern operations
#[derive(Error, Debug)]
pub enum Error {
    // ===== Transport Errors =====
    #[error("Language server transport closed: {context}")]
    TransportClosed { context: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Request timed out after {seconds}s: {method}")]
    Timeout { method: String, seconds: f64 },

    #[error("Language server returned error {code}: {message}")]
    Remote { code: i64, message: String },

    // ===== Lifecycle Errors =====
    #[error("Server for {language} is missing required capability: {capability}")]
    CapabilityMissing { language: String, capability: String },

    #[error("Cannot resolve launch command for {language}: {reason}")]
    DependencyMissing { language: String, reason: String },

    #[error("Language server not running: {language}")]
    ServerNotRunning { language: String },

    #[error("Language server failed to start for {language}: {reason}")]
    StartupFailed { language: String, reason: String },

    // ===== File System Errors =====
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Path is under an ignored directory: {path}")]
    PathIgnored { path: PathBuf },

    #[error("Invalid file encoding in {path}: expected UTF-8")]
    InvalidEncoding { path: PathBuf },

    #[error("Path escapes the workspace root: {path}")]
    PathOutsideWorkspace { path: PathBuf },

    // ===== Session Errors =====
    #[error("Project '{project}' requires backend {requested}, but the session is locked to {active}")]
    BackendMismatch {
        project: String,
        requested: String,
        active: String,
    },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("No backend connected for {0}")]
    BackendUnavailable(String),

    // ===== Configuration Errors =====
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Configuration file parse error: {0}")]
    ConfigParseError(String),

    // ===== Generic Errors =====
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Lifecycle,
    FileSystem,
    Session,
    Config,
    Internal,
}

impl Error {
    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TransportClosed { .. }
            | Error::Protocol(_)
            | Error::Timeout { .. }
            | Error::Remote { .. } => ErrorKind::Transport,

            Error::CapabilityMissing { .. }
            | Error::DependencyMissing { .. }
            | Error::ServerNotRunning { .. }
            | Error::StartupFailed { .. } => ErrorKind::Lifecycle,

            Error::FileNotFound { .. }
            | Error::PathIgnored { .. }
            | Error::InvalidEncoding { .. }
            | Error::PathOutsideWorkspace { .. }
            | Error::Io(_) => ErrorKind::FileSystem,

            Error::BackendMismatch { .. }
            | Error::ProjectNotFound(_)
            | Error::BackendUnavailable(_) => ErrorKind::Session,

            Error::InvalidConfig { .. } | Error::ConfigParseError(_) => ErrorKind::Config,

            Error::Json(_) | Error::Internal(_) | Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error leaves the session usable.
    ///
    /// Per-request failures (timeouts, remote errors, missing files) do not
    /// tear down a server session; transport and lifecycle failures do.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. }
                | Error::Remote { .. }
                | Error::FileNotFound { .. }
                | Error::PathIgnored { .. }
                | Error::BackendMismatch { .. }
                | Error::ProjectNotFound(_)
        )
    }
}

/// Extension trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context<C>(self, context: C) -> crate::Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    /// Add context lazily
    fn with_context<C, F>(self, f: F) -> crate::Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> crate::Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Other(anyhow::Error::from(e).context(context)))
    }

    fn with_context<C, F>(self, f: F) -> crate::Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Other(anyhow::Error::from(e).context(f())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        let err = Error::TransportClosed {
            context: "stdout EOF".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err = Error::FileNotFound {
            path: PathBuf::from("/test"),
        };
        assert_eq!(err.kind(), ErrorKind::FileSystem);
    }

    #[test]
    fn test_error_recoverable() {
        let recoverable = Error::Timeout {
            method: "textDocument/references".to_string(),
            seconds: 30.0,
        };
        assert!(recoverable.is_recoverable());

        let not_recoverable = Error::Protocol("bad frame".to_string());
        assert!(!not_recoverable.is_recoverable());
    }

    #[test]
    fn test_backend_mismatch_message() {
        let err = Error::BackendMismatch {
            project: "api".to_string(),
            requested: "JetBrains".to_string(),
            active: "LSP".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("api"));
        assert!(msg.contains("JetBrains"));
    }
}
