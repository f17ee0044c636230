//! Combined verdict of one protection pass

use serde::Serialize;
use tamperguard_core::{Error, ErrorReport};
use tamperguard_debugger::{DebuggerObservation, ExecutionEnvironment, PreventionOutcome};
use tamperguard_integrity::IntegrityVerdict;

#[derive(Debug, Clone, Serialize)]
pub struct DebuggerSummary {
    pub detected: bool,
    pub signals: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub probe_errors: Vec<String>,
}

impl From<&DebuggerObservation> for DebuggerSummary {
    fn from(observation: &DebuggerObservation) -> Self {
        Self {
            detected: observation.detected(),
            signals: observation.signal_codes(),
            probe_errors: observation
                .probe_errors()
                .iter()
                .map(|err| err.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    pub session_id: String,
    pub environment: ExecutionEnvironment,
    pub prevention: String,
    #[serde(skip)]
    pub prevention_applied: bool,
    pub debugger: DebuggerSummary,
    pub checks_evaluated: usize,
    pub integrity: IntegrityVerdict,
    /// One coded entry per compromised component
    pub findings: Vec<ErrorReport>,
}

impl SecurityReport {
    pub fn new(
        environment: ExecutionEnvironment,
        prevention: &PreventionOutcome,
        observation: &DebuggerObservation,
        checks_evaluated: usize,
        integrity: IntegrityVerdict,
    ) -> Self {
        let debugger = DebuggerSummary::from(observation);
        let findings = findings(&debugger, &integrity);
        Self {
            session_id: tamperguard_telemetry::session_id(),
            environment,
            prevention: prevention.to_string(),
            prevention_applied: prevention.is_applied(),
            debugger,
            checks_evaluated,
            integrity,
            findings,
        }
    }

    pub fn compromised(&self) -> bool {
        self.debugger.detected || self.integrity.tampered
    }

    /// Alert text listing every reason, or `None` when nothing was found.
    pub fn alert_message(&self) -> Option<String> {
        alert_message(self.debugger.detected, &self.integrity)
    }
}

fn findings(debugger: &DebuggerSummary, integrity: &IntegrityVerdict) -> Vec<ErrorReport> {
    let mut findings = Vec::new();
    if debugger.detected {
        findings.push(Error::debugger_detected(&debugger.signals).to_report());
    }
    if integrity.tampered {
        findings.push(Error::tampering_detected(integrity.failed_checks.len()).to_report());
    }
    findings
}

pub fn alert_message(debugger_detected: bool, integrity: &IntegrityVerdict) -> Option<String> {
    if !debugger_detected && !integrity.tampered {
        return None;
    }

    let mut message = String::from("Security Alert!\n");
    if debugger_detected {
        message.push_str("- Debugger Detected!\n");
    }
    if integrity.tampered {
        let kinds: Vec<&str> = integrity
            .failed_kinds()
            .iter()
            .map(|kind| kind.label())
            .collect();
        message.push_str("- Integrity Check Failed:\n");
        message.push_str(&format!("  ({})\n", kinds.join(", ")));
    }
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tamperguard_integrity::{CheckOutcome, CheckSpec};

    fn tampered() -> IntegrityVerdict {
        IntegrityVerdict::from_outcomes(vec![
            CheckOutcome::failed(CheckSpec::package_identifier("com.example.App"), "mismatch"),
            CheckOutcome::passed(CheckSpec::provisioning_digest("00".repeat(32))),
            CheckOutcome::failed(CheckSpec::provisioning_digest("11".repeat(32)), "mismatch"),
        ])
    }

    #[test]
    fn test_clean_run_has_no_alert() {
        assert_eq!(alert_message(false, &IntegrityVerdict::default()), None);
    }

    #[test]
    fn test_alert_lists_every_reason() {
        let message = alert_message(true, &tampered()).unwrap();
        assert_eq!(
            message,
            "Security Alert!\n- Debugger Detected!\n- Integrity Check Failed:\n  (BundleId, MobileProvision)\n"
        );
    }

    #[test]
    fn test_report_is_compromised_by_either_component() {
        let observation = DebuggerObservation::default();
        let report = SecurityReport::new(
            ExecutionEnvironment::Device,
            &PreventionOutcome::Applied,
            &observation,
            3,
            tampered(),
        );
        assert!(report.compromised());
        assert!(report.prevention_applied);
        assert_eq!(report.prevention, "applied");
        assert!(!report.alert_message().unwrap().contains("Debugger"));
    }

    #[test]
    fn test_findings_carry_codes() {
        let report = SecurityReport::new(
            ExecutionEnvironment::Device,
            &PreventionOutcome::Applied,
            &DebuggerObservation::default(),
            3,
            tampered(),
        );
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].code_str, "E7002");
        assert_eq!(report.findings[0].message, "2 integrity check(s) failed");

        let clean = SecurityReport::new(
            ExecutionEnvironment::Device,
            &PreventionOutcome::Applied,
            &DebuggerObservation::default(),
            0,
            IntegrityVerdict::default(),
        );
        assert!(clean.findings.is_empty());
    }
}
