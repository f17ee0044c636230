use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of hardware the process runs on.
///
/// Attachment prevention is only attempted on [`ExecutionEnvironment::Device`];
/// inside a simulator the primitive is unavailable or meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionEnvironment {
    Device,
    Simulator,
}

impl ExecutionEnvironment {
    /// Determine the environment of the current process.
    ///
    /// Simulator targets are recognised at compile time; the runtime
    /// variables cover binaries built for the host architecture but launched
    /// by the simulator.
    pub fn detect() -> Self {
        if compiled_for_simulator() || simulator_variables_present() {
            Self::Simulator
        } else {
            Self::Device
        }
    }

    pub fn is_device(self) -> bool {
        matches!(self, Self::Device)
    }
}

impl fmt::Display for ExecutionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device => write!(f, "device"),
            Self::Simulator => write!(f, "simulator"),
        }
    }
}

fn compiled_for_simulator() -> bool {
    cfg!(any(
        target_abi = "sim",
        all(target_os = "ios", any(target_arch = "x86_64", target_arch = "x86"))
    ))
}

fn simulator_variables_present() -> bool {
    ["SIMULATOR_DEVICE_NAME", "SIMULATOR_UDID"]
        .iter()
        .any(|name| std::env::var_os(name).is_some())
}
