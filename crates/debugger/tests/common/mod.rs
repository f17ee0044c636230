#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use tamperguard_debugger::{
    DebuggerCheckConfig, DebuggerGuard, ExecutionEnvironment, PreventionError, ProbeError,
    ProcessInfoProvider, TraceController,
};

pub const LAUNCHER_PID: u32 = 1;

#[derive(Default)]
pub struct FakeState {
    pub traced: AtomicBool,
    pub trace_fails: AtomicBool,
    pub parent_pid: AtomicU32,
    pub parent_fails: AtomicBool,
    pub stack: Mutex<String>,
    pub trace_gate: Mutex<Option<TraceGate>>,
}

/// Holds the next trace probe until the test releases it
pub struct TraceGate {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// Process introspection driven by test-controlled flags
#[derive(Clone)]
pub struct FakeProcess {
    pub state: Arc<FakeState>,
}

impl FakeProcess {
    /// Unattached process launched by the expected launcher
    pub fn normal() -> Self {
        let state = FakeState::default();
        state.parent_pid.store(LAUNCHER_PID, Ordering::SeqCst);
        *state.stack.lock().unwrap() = "0: app::main\n1: start".to_string();
        Self {
            state: Arc::new(state),
        }
    }

    pub fn set_traced(&self, traced: bool) {
        self.state.traced.store(traced, Ordering::SeqCst);
    }

    pub fn set_parent(&self, pid: u32) {
        self.state.parent_pid.store(pid, Ordering::SeqCst);
    }

    pub fn break_trace_probe(&self) {
        self.state.trace_fails.store(true, Ordering::SeqCst);
    }

    pub fn break_parent_probe(&self) {
        self.state.parent_fails.store(true, Ordering::SeqCst);
    }

    /// Block the next `trace_state` call. Returns a receiver signalled when
    /// the probe is entered and a sender that lets it complete.
    pub fn hold_trace_query(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.state.trace_gate.lock().unwrap() = Some(TraceGate {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    pub fn set_stack(&self, stack: &str) {
        *self.state.stack.lock().unwrap() = stack.to_string();
    }
}

impl ProcessInfoProvider for FakeProcess {
    fn trace_state(&self) -> Result<bool, ProbeError> {
        let gate = self.state.trace_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }
        if self.state.trace_fails.load(Ordering::SeqCst) {
            return Err(ProbeError::failed("trace_state", "sysctl returned -1"));
        }
        Ok(self.state.traced.load(Ordering::SeqCst))
    }

    fn parent_pid(&self) -> Result<u32, ProbeError> {
        if self.state.parent_fails.load(Ordering::SeqCst) {
            return Err(ProbeError::Unsupported {
                probe: "parent_process",
            });
        }
        Ok(self.state.parent_pid.load(Ordering::SeqCst))
    }

    fn stack_trace(&self) -> Result<String, ProbeError> {
        Ok(self.state.stack.lock().unwrap().clone())
    }
}

/// Trace controller that counts invocations
#[derive(Clone, Default)]
pub struct FakeController {
    pub calls: Arc<AtomicUsize>,
    pub refuse: bool,
}

impl FakeController {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TraceController for FakeController {
    fn deny_attachment(&self) -> Result<(), PreventionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            Err(PreventionError::Denied {
                primitive: "ptrace(PT_DENY_ATTACH)",
                detail: "Operation not permitted".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// All probes enabled, launcher pid as the only expected parent
pub fn all_probes() -> DebuggerCheckConfig {
    DebuggerCheckConfig {
        enable_trace_state_probe: true,
        enable_parent_probe: true,
        enable_stack_probe: true,
        expected_parent_pids: vec![LAUNCHER_PID],
        stack_markers: vec!["debugger_break".to_string()],
    }
}

pub fn device_guard(
    process: &FakeProcess,
    controller: &FakeController,
) -> DebuggerGuard<FakeController, FakeProcess> {
    DebuggerGuard::new(
        ExecutionEnvironment::Device,
        all_probes(),
        controller.clone(),
        process.clone(),
    )
}
