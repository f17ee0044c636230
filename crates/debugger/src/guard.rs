use std::fmt;
use std::sync::OnceLock;

use tamperguard_telemetry::{metrics, names};
use tracing::{debug, info, warn};

use crate::environment::ExecutionEnvironment;
use crate::platform::{
    PlatformProcessInfo, PlatformTraceController, PreventionError, ProcessInfoProvider,
    TraceController,
};
use crate::signals::{DebuggerCheckConfig, DebuggerObservation, ProbeError, SignalKind, SignalReading};

/// What happened when attachment prevention was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreventionOutcome {
    /// The kernel accepted the request
    Applied,
    /// Not attempted because the process runs in a simulator
    Skipped(ExecutionEnvironment),
    /// The primitive was unavailable or refused; protection is not applied
    Failed(PreventionError),
}

impl PreventionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

impl fmt::Display for PreventionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => f.write_str("applied"),
            Self::Skipped(environment) => write!(f, "skipped ({})", environment),
            Self::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Prevents and detects debugger attachment.
///
/// Detection is recomputed from live process state on every call. The only
/// thing remembered is the outcome of the first prevention attempt, so that
/// repeated calls are no-ops.
pub struct DebuggerGuard<T = PlatformTraceController, P = PlatformProcessInfo> {
    environment: ExecutionEnvironment,
    config: DebuggerCheckConfig,
    controller: T,
    process: P,
    prevention: OnceLock<PreventionOutcome>,
}

impl DebuggerGuard {
    /// Guard over the real kernel primitives, with the environment detected
    /// from the running process.
    pub fn platform(config: DebuggerCheckConfig) -> Self {
        Self::new(
            ExecutionEnvironment::detect(),
            config,
            PlatformTraceController,
            PlatformProcessInfo,
        )
    }
}

impl<T, P> DebuggerGuard<T, P>
where
    T: TraceController,
    P: ProcessInfoProvider,
{
    pub fn new(
        environment: ExecutionEnvironment,
        config: DebuggerCheckConfig,
        controller: T,
        process: P,
    ) -> Self {
        Self {
            environment,
            config,
            controller,
            process,
            prevention: OnceLock::new(),
        }
    }

    pub fn environment(&self) -> ExecutionEnvironment {
        self.environment
    }

    pub fn config(&self) -> &DebuggerCheckConfig {
        &self.config
    }

    /// Ask the kernel to refuse future debugger attachment.
    ///
    /// Best effort and idempotent: the primitive is invoked at most once per
    /// guard, later calls return the first outcome. Never panics.
    pub fn prevent_attachment(&self) -> PreventionOutcome {
        self.prevention
            .get_or_init(|| self.attempt_prevention())
            .clone()
    }

    fn attempt_prevention(&self) -> PreventionOutcome {
        if !self.environment.is_device() {
            info!(environment = %self.environment, "Not running on device, skipping attachment prevention");
            return PreventionOutcome::Skipped(self.environment);
        }

        debug!("Running on device, attempting to prevent debugger attachment");
        match self.controller.deny_attachment() {
            Ok(()) => {
                info!("Debugger attachment prevention applied");
                PreventionOutcome::Applied
            }
            Err(err) => {
                warn!(error = %err, "Debugger attachment prevention not applied");
                PreventionOutcome::Failed(err)
            }
        }
    }

    /// Whether any enabled probe reports a debugger.
    pub fn is_being_debugged(&self) -> bool {
        self.observe().detected()
    }

    /// Run every enabled probe and report each reading.
    pub fn observe(&self) -> DebuggerObservation {
        let mut readings = Vec::with_capacity(3);

        if self.config.enable_trace_state_probe {
            readings.push(SignalReading {
                kind: SignalKind::TraceState,
                outcome: self.process.trace_state(),
            });
        }

        if self.config.enable_parent_probe {
            readings.push(SignalReading {
                kind: SignalKind::ParentProcess,
                outcome: self.parent_mismatch(),
            });
        }

        if self.config.enable_stack_probe {
            readings.push(SignalReading {
                kind: SignalKind::StackUnwind,
                outcome: self.stack_has_marker(),
            });
        }

        let observation = DebuggerObservation { readings };
        record(&observation);
        observation
    }

    fn parent_mismatch(&self) -> Result<bool, ProbeError> {
        if self.config.expected_parent_pids.is_empty() {
            return Err(ProbeError::failed(
                "parent_process",
                "no expected parent pid configured",
            ));
        }
        let parent = self.process.parent_pid()?;
        let mismatch = !self.config.expected_parent_pids.contains(&parent);
        if mismatch {
            debug!(parent_pid = parent, expected = ?self.config.expected_parent_pids, "Unexpected parent process");
        }
        Ok(mismatch)
    }

    fn stack_has_marker(&self) -> Result<bool, ProbeError> {
        let trace = self.process.stack_trace()?;
        Ok(self
            .config
            .stack_markers
            .iter()
            .any(|marker| !marker.is_empty() && trace.contains(marker.as_str())))
    }
}

fn record(observation: &DebuggerObservation) {
    let registry = metrics();
    registry.increment(names::DEBUGGER_CHECKS);

    for reading in &observation.readings {
        match &reading.outcome {
            Ok(positive) => debug!(signal = %reading.kind, positive, "Debugger probe completed"),
            Err(err) => {
                registry.increment(names::DEBUGGER_PROBE_ERRORS);
                debug!(signal = %reading.kind, error = %err, "Debugger probe unavailable");
            }
        }
    }

    if observation.detected() {
        registry.increment(names::DEBUGGER_DETECTIONS);
        warn!(signals = ?observation.signal_codes(), "Debugger detected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingController {
        calls: AtomicUsize,
        result: Result<(), PreventionError>,
    }

    impl TraceController for CountingController {
        fn deny_attachment(&self) -> Result<(), PreventionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct Quiet;

    impl ProcessInfoProvider for Quiet {
        fn trace_state(&self) -> Result<bool, ProbeError> {
            Ok(false)
        }
        fn parent_pid(&self) -> Result<u32, ProbeError> {
            Ok(1)
        }
        fn stack_trace(&self) -> Result<String, ProbeError> {
            Ok("main\nstart".to_string())
        }
    }

    fn counting(result: Result<(), PreventionError>) -> CountingController {
        CountingController {
            calls: AtomicUsize::new(0),
            result,
        }
    }

    #[test]
    fn test_simulator_skips_primitive() {
        let guard = DebuggerGuard::new(
            ExecutionEnvironment::Simulator,
            DebuggerCheckConfig::default(),
            counting(Ok(())),
            Quiet,
        );
        assert_eq!(
            guard.prevent_attachment(),
            PreventionOutcome::Skipped(ExecutionEnvironment::Simulator)
        );
        assert_eq!(guard.controller.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_is_reported_not_raised() {
        let err = PreventionError::Denied {
            primitive: "ptrace(PT_DENY_ATTACH)",
            detail: "Operation not permitted".to_string(),
        };
        let guard = DebuggerGuard::new(
            ExecutionEnvironment::Device,
            DebuggerCheckConfig::default(),
            counting(Err(err.clone())),
            Quiet,
        );
        assert_eq!(guard.prevent_attachment(), PreventionOutcome::Failed(err));
    }

    #[test]
    fn test_empty_parent_baseline_is_a_probe_error() {
        let config = DebuggerCheckConfig {
            enable_trace_state_probe: false,
            enable_parent_probe: true,
            expected_parent_pids: Vec::new(),
            ..DebuggerCheckConfig::default()
        };
        let guard = DebuggerGuard::new(ExecutionEnvironment::Device, config, counting(Ok(())), Quiet);
        let observation = guard.observe();
        assert!(!observation.detected());
        assert_eq!(observation.probe_errors().len(), 1);
    }

    #[test]
    fn test_empty_stack_marker_never_matches() {
        let config = DebuggerCheckConfig {
            enable_trace_state_probe: false,
            enable_parent_probe: false,
            enable_stack_probe: true,
            stack_markers: vec![String::new()],
            ..DebuggerCheckConfig::default()
        };
        let guard = DebuggerGuard::new(ExecutionEnvironment::Device, config, counting(Ok(())), Quiet);
        assert!(!guard.is_being_debugged());
    }
}
