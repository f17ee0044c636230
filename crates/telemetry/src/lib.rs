//! Logging and in-process counters for tamperguard
//!
//! Log output is an observability side channel; nothing parses it. Counters
//! and timings live in a process-wide [`MetricsRegistry`] and are dumped at
//! debug level when the CLI exits.

mod event;
mod metrics;

pub use event::Event;
pub use metrics::{metrics, MetricsRegistry, Summary, Timer};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tamperguard_core::config::TelemetrySettings;
use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Counter names shared by the guard and the verifier
pub mod names {
    pub const DEBUGGER_CHECKS: &str = "debugger.checks";
    pub const DEBUGGER_DETECTIONS: &str = "debugger.detections";
    pub const DEBUGGER_PROBE_ERRORS: &str = "debugger.probe_errors";
    pub const INTEGRITY_CHECKS: &str = "integrity.checks";
    pub const INTEGRITY_FAILURES: &str = "integrity.failures";
    pub const INTEGRITY_EVALUATE_MS: &str = "integrity.evaluate_ms";
}

static SESSION_ID: Lazy<Uuid> = Lazy::new(Uuid::new_v4);

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Identifier stamped on logs, events and reports of this process
pub fn session_id() -> String {
    SESSION_ID.to_string()
}

/// Install the global subscriber. `RUST_LOG` wins over `config.log_level`.
///
/// Everything is written to stderr so stdout stays clean for digests and
/// JSON reports.
pub fn init_with_config(config: TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let installed = if config.json {
        let layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(config.show_target);
        tracing_subscriber::registry().with(filter).with(layer).try_init()
    } else {
        let layer = fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_ansi(config.ansi)
            .with_target(config.show_target)
            .with_thread_names(config.show_threads);
        tracing_subscriber::registry().with(filter).with(layer).try_init()
    };
    installed.map_err(|e| TelemetryError::AlreadyInstalled(e.to_string()))?;

    tracing::debug!(
        session_id = %session_id(),
        version = env!("CARGO_PKG_VERSION"),
        "Logging ready"
    );
    Ok(())
}

/// How logs are filtered and rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub json: bool,
    pub show_target: bool,
    /// Include thread names, useful to tell the check thread from the main loop
    pub show_threads: bool,
    /// Color escapes in the compact format
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from(&TelemetrySettings::default())
    }
}

impl From<&TelemetrySettings> for TelemetryConfig {
    fn from(settings: &TelemetrySettings) -> Self {
        Self {
            log_level: settings.log_level.clone(),
            json: settings.json,
            show_target: settings.show_target,
            show_threads: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    #[must_use]
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Apply `-v` (debug) and `-vv` (trace plus thread names)
    #[must_use]
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        let level = match verbose {
            0 => return self,
            1 => "debug",
            _ => {
                self.show_threads = true;
                "trace"
            }
        };
        self.log_level = level.to_string();
        self
    }
}
