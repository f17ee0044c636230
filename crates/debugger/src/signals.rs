use serde::{Deserialize, Serialize};
use std::fmt;
use tamperguard_core::config::DebuggerSettings;
use thiserror::Error;

/// Independent debugger detection techniques
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Kernel-maintained trace flag of the current process
    TraceState,
    /// Parent pid compared with the expected launcher
    ParentProcess,
    /// Debugger-break frames in a captured backtrace
    StackUnwind,
}

impl SignalKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::TraceState => "trace_state",
            Self::ParentProcess => "parent_process",
            Self::StackUnwind => "stack_unwind",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A probe that could not produce a reading.
///
/// Never counts as a detection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("{probe} probe is not supported on this platform")]
    Unsupported { probe: &'static str },

    #[error("{probe} probe failed: {detail}")]
    Failed { probe: &'static str, detail: String },
}

impl ProbeError {
    pub fn failed(probe: &'static str, detail: impl fmt::Display) -> Self {
        Self::Failed {
            probe,
            detail: detail.to_string(),
        }
    }
}

/// Result of one probe: `Ok(true)` is a positive signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalReading {
    pub kind: SignalKind,
    pub outcome: Result<bool, ProbeError>,
}

impl SignalReading {
    pub fn is_positive(&self) -> bool {
        matches!(self.outcome, Ok(true))
    }
}

/// Readings of every enabled probe for one detection pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebuggerObservation {
    pub readings: Vec<SignalReading>,
}

impl DebuggerObservation {
    /// OR of all readings; failed probes contribute `false`.
    pub fn detected(&self) -> bool {
        self.readings.iter().any(SignalReading::is_positive)
    }

    pub fn positive_signals(&self) -> Vec<SignalKind> {
        self.readings
            .iter()
            .filter(|reading| reading.is_positive())
            .map(|reading| reading.kind)
            .collect()
    }

    pub fn probe_errors(&self) -> Vec<&ProbeError> {
        self.readings
            .iter()
            .filter_map(|reading| reading.outcome.as_ref().err())
            .collect()
    }

    pub fn signal_codes(&self) -> Vec<&'static str> {
        self.positive_signals().iter().map(SignalKind::code).collect()
    }
}

/// Which probes run and what they compare against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerCheckConfig {
    pub enable_trace_state_probe: bool,
    pub enable_parent_probe: bool,
    pub enable_stack_probe: bool,
    pub expected_parent_pids: Vec<u32>,
    pub stack_markers: Vec<String>,
}

impl Default for DebuggerCheckConfig {
    fn default() -> Self {
        Self::from(&DebuggerSettings::default())
    }
}

impl From<&DebuggerSettings> for DebuggerCheckConfig {
    fn from(settings: &DebuggerSettings) -> Self {
        Self {
            enable_trace_state_probe: settings.trace_state_probe,
            enable_parent_probe: settings.parent_probe,
            enable_stack_probe: settings.stack_probe,
            expected_parent_pids: settings.expected_parent_pids.clone(),
            stack_markers: settings.stack_markers.clone(),
        }
    }
}
