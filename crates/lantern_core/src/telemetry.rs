//! Telemetry and observability infrastructure
//!
//! Structured logging setup for the Lantern core and everything that embeds
//! it. Language-server stderr and wire-level traces all flow through
//! `tracing`, so one subscriber covers the whole stack.

use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Guards that must be kept alive for logging to work
static LOG_GUARDS: OnceLock<Vec<WorkerGuard>> = OnceLock::new();

/// Configuration for telemetry initialization
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "lantern=trace")
    pub log_filter: String,
    /// Directory for log files (None for stdout only)
    pub log_dir: Option<std::path::PathBuf>,
    /// Enable JSON format for file logs
    pub json_logs: bool,
    /// Enable span events (enter/exit)
    pub span_events: bool,
    /// Application name for log prefix
    pub app_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info,lantern=debug".to_string(),
            log_dir: None,
            json_logs: false,
            span_events: false,
            app_name: "lantern".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create a development configuration with verbose logging
    pub fn development() -> Self {
        Self {
            log_filter: "debug,lantern=trace".to_string(),
            ..Self::default()
        }
    }

    /// Create a production configuration writing rotated JSON logs
    pub fn production(log_dir: impl AsRef<Path>) -> Self {
        Self {
            log_dir: Some(log_dir.as_ref().to_path_buf()),
            json_logs: true,
            ..Self::default()
        }
    }
}

/// Initialize the telemetry system
///
/// This should be called once at startup by whatever embeds the core. The
/// appender guards are stored globally and must outlive the process.
pub fn init(config: TelemetryConfig) -> crate::Result<()> {
    let env_filter =
        EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let span_events = if config.span_events {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_span_events(span_events);

    let mut guards = Vec::new();

    if let Some(log_dir) = config.log_dir {
        let file_appender = tracing_appender::rolling::daily(&log_dir, &config.app_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);

        if config.json_logs {
            let file_layer = fmt::layer().json().with_writer(non_blocking);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .with(file_layer)
                .try_init()
                .map_err(|e| crate::Error::Internal(format!("Failed to init logging: {}", e)))?;
        } else {
            let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .with(file_layer)
                .try_init()
                .map_err(|e| crate::Error::Internal(format!("Failed to init logging: {}", e)))?;
        }
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| crate::Error::Internal(format!("Failed to init logging: {}", e)))?;
    }

    LOG_GUARDS
        .set(guards)
        .map_err(|_| crate::Error::Internal("Telemetry already initialized".to_string()))?;

    tracing::info!(
        app = %config.app_name,
        filter = %config.log_filter,
        "Telemetry initialized"
    );

    Ok(())
}

/// Timing guard for measuring operation duration
pub struct TimingGuard {
    name: &'static str,
    start: std::time::Instant,
    threshold_ms: Option<u64>,
}

impl TimingGuard {
    /// Create a new timing guard
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: std::time::Instant::now(),
            threshold_ms: None,
        }
    }

    /// Only log if duration exceeds threshold
    pub fn with_threshold(mut self, ms: u64) -> Self {
        self.threshold_ms = Some(ms);
        self
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;

        if let Some(threshold) = self.threshold_ms {
            if elapsed_ms < threshold {
                return;
            }
        }

        if elapsed_ms > 1000 {
            tracing::warn!(
                operation = %self.name,
                duration_ms = %elapsed_ms,
                "Slow operation detected"
            );
        } else {
            tracing::debug!(
                operation = %self.name,
                duration_ms = %elapsed_ms,
                "Operation completed"
            );
        }
    }
}

/// Macro for timing a block of code
#[macro_export]
macro_rules! time_operation {
    ($name:expr) => {
        let _guard = $crate::telemetry::TimingGuard::new($name);
    };
    ($name:expr, threshold = $ms:expr) => {
        let _guard = $crate::telemetry::TimingGuard::new($name).with_threshold($ms);
    };
}
