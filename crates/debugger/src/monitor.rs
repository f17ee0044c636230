//! Repeating background detection with a one-shot trigger.
//!
//! The probe runs on a tokio task: on the caller's runtime when there is one,
//! otherwise on a dedicated thread driving a current-thread runtime. The
//! first positive observation is handed to the callback, which runs once,
//! and the monitor then moves to [`MonitorState::Triggered`] and ends the
//! task. A stop request that lands while a probe is in flight wins over
//! whatever that probe reports.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tamperguard_debugger::{DebuggerCheckConfig, DebuggerGuard};
//!
//! let guard = Arc::new(DebuggerGuard::platform(DebuggerCheckConfig::default()));
//! let checks = guard.start_continuous_checks(Duration::from_secs(1), |observation| {
//!     eprintln!("debugger attached: {:?}", observation.signal_codes());
//! });
//!
//! // on shutdown
//! checks.stop();
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::guard::DebuggerGuard;
use crate::platform::{ProcessInfoProvider, TraceController};
use crate::signals::DebuggerObservation;

/// Lifecycle of a continuous check run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Idle,
    Running,
    /// A debugger was detected and the callback invoked
    Triggered,
    /// Stopped before any detection
    Stopped,
}

impl MonitorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Triggered | Self::Stopped)
    }
}

/// Handle to a running continuous check.
///
/// Dropping the handle detaches the checks: they keep running until a
/// detection. Call [`ContinuousChecks::stop`] to tear them down.
pub struct ContinuousChecks {
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<MonitorState>,
}

impl ContinuousChecks {
    /// Request the loop to end. A probe already running is allowed to finish
    /// but its result is discarded.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn state(&self) -> MonitorState {
        *self.state_rx.borrow()
    }

    /// Wait until the run is triggered or stopped.
    pub async fn finished(&mut self) -> MonitorState {
        let outcome = self
            .state_rx
            .wait_for(|state| state.is_terminal())
            .await
            .map(|state| *state);
        // An error means the task is gone (runtime shut down); report what it left.
        outcome.unwrap_or_else(|_| *self.state_rx.borrow())
    }
}

impl<T, P> DebuggerGuard<T, P>
where
    T: TraceController + 'static,
    P: ProcessInfoProvider + 'static,
{
    /// Probe every `interval` in the background until the first detection.
    ///
    /// `on_detected` runs at most once, on the background context, with the
    /// observation that triggered it. Hosts that
    /// need to touch UI state should forward it through a
    /// `tamperguard_core::dispatch::MainQueueHandle`.
    pub fn start_continuous_checks<F>(self: &Arc<Self>, interval: Duration, on_detected: F) -> ContinuousChecks
    where
        F: FnOnce(DebuggerObservation) + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(MonitorState::Idle);

        info!(interval_ms = interval.as_millis() as u64, "Starting continuous debugger checks");
        let task = run_checks(Arc::clone(self), interval, on_detected, stop_rx, state_tx.clone());

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => {
                let spawned = std::thread::Builder::new()
                    .name("tamperguard-checks".to_string())
                    .spawn(move || {
                        match tokio::runtime::Builder::new_current_thread().enable_time().build() {
                            Ok(runtime) => runtime.block_on(task),
                            Err(err) => {
                                error!(error = %err, "Failed to build runtime for continuous checks");
                                state_tx.send_replace(MonitorState::Stopped);
                            }
                        }
                    });
                if let Err(err) = spawned {
                    error!(error = %err, "Failed to spawn continuous check thread");
                }
            }
        }

        ContinuousChecks { stop_tx, state_rx }
    }
}

async fn run_checks<T, P, F>(
    guard: Arc<DebuggerGuard<T, P>>,
    interval: Duration,
    on_detected: F,
    mut stop_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<MonitorState>,
) where
    T: TraceController,
    P: ProcessInfoProvider,
    F: FnOnce(DebuggerObservation),
{
    let mut on_detected = Some(on_detected);
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stop_open = true;
    let mut check_count: u64 = 0;

    state_tx.send_replace(MonitorState::Running);

    loop {
        tokio::select! {
            biased;

            changed = stop_rx.changed(), if stop_open => {
                match changed {
                    Ok(()) if *stop_rx.borrow() => {
                        debug!(checks = check_count, "Continuous debugger checks stopped");
                        state_tx.send_replace(MonitorState::Stopped);
                        return;
                    }
                    Ok(()) => {}
                    Err(_) => stop_open = false,
                }
            }

            _ = ticker.tick() => {
                if *stop_rx.borrow() {
                    state_tx.send_replace(MonitorState::Stopped);
                    return;
                }

                check_count += 1;
                debug!(check = check_count, "Performing continuous debugger check");

                let observation = guard.observe();
                if observation.detected() {
                    if *stop_rx.borrow() {
                        debug!(check = check_count, "Stop requested during check, discarding detection");
                        state_tx.send_replace(MonitorState::Stopped);
                        return;
                    }

                    info!(check = check_count, "Debugger detected in continuous check");
                    if let Some(callback) = on_detected.take() {
                        callback(observation);
                    }
                    state_tx.send_replace(MonitorState::Triggered);
                    return;
                }
            }
        }
    }
}
