//! Configuration schema definitions
//!
//! Every section is optional; an empty file yields the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub debugger: DebuggerSettings,

    #[serde(default)]
    pub integrity: IntegritySettings,

    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

/// Debugger guard configuration
///
/// Defaults enable the trace-state and parent-process probes on Apple
/// targets. Elsewhere the parent probe is off by default, since a shell or
/// service manager is the usual parent, which leaves trace state as the
/// only default signal. Set `parent_probe = true` with the launcher pids of
/// the deployment to get two signals there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebuggerSettings {
    /// Query the kernel trace flag of the current process
    #[serde(default = "default_true")]
    pub trace_state_probe: bool,

    /// Compare the parent pid against `expected_parent_pids`.
    /// Defaults to on for Apple targets only.
    #[serde(default = "default_parent_probe")]
    pub parent_probe: bool,

    /// Search a captured backtrace for debugger-break frames
    #[serde(default)]
    pub stack_probe: bool,

    /// Parent pids of a normally launched process.
    ///
    /// Platform and version dependent; a mismatch is reported as a debugger.
    #[serde(default = "default_expected_parent_pids")]
    pub expected_parent_pids: Vec<u32>,

    /// Symbol fragments that mark a debugger break in a backtrace
    #[serde(default = "default_stack_markers")]
    pub stack_markers: Vec<String>,

    /// Interval between continuous checks, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for DebuggerSettings {
    fn default() -> Self {
        Self {
            trace_state_probe: true,
            parent_probe: default_parent_probe(),
            stack_probe: false,
            expected_parent_pids: default_expected_parent_pids(),
            stack_markers: default_stack_markers(),
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

// Only launchd-spawned apps have a stable parent pid.
fn default_parent_probe() -> bool {
    cfg!(target_vendor = "apple")
}

fn default_expected_parent_pids() -> Vec<u32> {
    vec![1]
}

fn default_stack_markers() -> Vec<String> {
    vec![
        "core::intrinsics::breakpoint".to_string(),
        "debugger_break".to_string(),
    ]
}

fn default_interval_ms() -> u64 {
    1000
}

/// Kind of an integrity check entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckEntryKind {
    /// Installed package (bundle) identifier
    BundleId,
    /// SHA-256 of the embedded provisioning profile
    MobileProvision,
}

/// One configured integrity check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckEntry {
    pub kind: CheckEntryKind,
    pub expected: String,
}

/// Integrity verifier configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IntegritySettings {
    /// Root of the installed application bundle
    #[serde(default)]
    pub bundle_path: Option<PathBuf>,

    /// Identifier reported by the platform, overriding `Info.plist`
    #[serde(default)]
    pub bundle_id_override: Option<String>,

    /// Checks to run, in order
    #[serde(default)]
    pub checks: Vec<CheckEntry>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON lines instead of compact text
    #[serde(default)]
    pub json: bool,

    /// Include the event target in each line
    #[serde(default)]
    pub show_target: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
            show_target: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
