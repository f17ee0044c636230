//! Debugger attachment prevention and detection.
//!
//! [`DebuggerGuard`] combines independent probes with OR semantics:
//!
//! - **trace state**: the kernel's "process is traced" flag
//! - **parent process**: parent pid compared with the expected launcher
//! - **stack unwind**: debugger-break frames in a captured backtrace (opt-in)
//!
//! [`DebuggerCheckConfig::default`] enables trace state everywhere and the
//! parent probe only on Apple targets, where apps are spawned by `launchd`.
//! On other targets enable the parent probe explicitly, with the expected
//! launcher pids, to combine two signals.
//!
//! A probe that fails counts as "no signal"; it never reports a debugger on
//! its own and never panics. The OS primitives sit behind
//! [`TraceController`] and [`ProcessInfoProvider`] so the detection logic can
//! run against fakes.
//!
//! ```rust,no_run
//! use tamperguard_debugger::{DebuggerCheckConfig, DebuggerGuard};
//!
//! let guard = DebuggerGuard::platform(DebuggerCheckConfig::default());
//! guard.prevent_attachment();
//! if guard.is_being_debugged() {
//!     eprintln!("debugger attached");
//! }
//! ```

mod environment;
mod guard;
mod monitor;
mod platform;
mod signals;

pub use environment::ExecutionEnvironment;
pub use guard::{DebuggerGuard, PreventionOutcome};
pub use monitor::{ContinuousChecks, MonitorState};
pub use platform::{
    parse_tracer_pid, PlatformProcessInfo, PlatformTraceController, PreventionError,
    ProcessInfoProvider, TraceController,
};
pub use signals::{
    DebuggerCheckConfig, DebuggerObservation, ProbeError, SignalKind, SignalReading,
};
