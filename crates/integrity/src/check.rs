use serde::Serialize;
use std::fmt;
use tamperguard_core::config::{CheckEntry, CheckEntryKind};

/// One integrity assertion supplied by the host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "expected", rename_all = "snake_case")]
pub enum CheckSpec {
    /// Installed package identifier, compared case-sensitively
    PackageIdentifier(String),
    /// SHA-256 of the provisioning artifact as hex, compared case-insensitively
    ProvisioningArtifactDigest(String),
}

impl CheckSpec {
    pub fn package_identifier(expected: impl Into<String>) -> Self {
        Self::PackageIdentifier(expected.into())
    }

    pub fn provisioning_digest(expected: impl Into<String>) -> Self {
        Self::ProvisioningArtifactDigest(expected.into())
    }

    pub fn kind(&self) -> CheckKind {
        match self {
            Self::PackageIdentifier(_) => CheckKind::PackageIdentifier,
            Self::ProvisioningArtifactDigest(_) => CheckKind::ProvisioningArtifactDigest,
        }
    }

    pub fn expected(&self) -> &str {
        match self {
            Self::PackageIdentifier(expected) | Self::ProvisioningArtifactDigest(expected) => {
                expected
            }
        }
    }
}

impl fmt::Display for CheckSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PackageIdentifier(expected) => write!(f, "Expected Bundle ID: {}", expected),
            Self::ProvisioningArtifactDigest(expected) => {
                write!(f, "Expected Mobile Provision SHA256 Hash: {}", expected)
            }
        }
    }
}

impl From<&CheckEntry> for CheckSpec {
    fn from(entry: &CheckEntry) -> Self {
        match entry.kind {
            CheckEntryKind::BundleId => Self::PackageIdentifier(entry.expected.clone()),
            CheckEntryKind::MobileProvision => {
                Self::ProvisioningArtifactDigest(entry.expected.clone())
            }
        }
    }
}

/// Discriminant of a [`CheckSpec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    PackageIdentifier,
    ProvisioningArtifactDigest,
}

impl CheckKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PackageIdentifier => "BundleId",
            Self::ProvisioningArtifactDigest => "MobileProvision",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of evaluating one [`CheckSpec`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub check: CheckSpec,
    pub failed: bool,
    /// Why the check failed, for diagnostics only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CheckOutcome {
    pub fn passed(check: CheckSpec) -> Self {
        Self {
            check,
            failed: false,
            reason: None,
        }
    }

    pub fn failed(check: CheckSpec, reason: impl Into<String>) -> Self {
        Self {
            check,
            failed: true,
            reason: Some(reason.into()),
        }
    }
}

/// Aggregate of one verification run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityVerdict {
    /// True iff at least one check failed
    pub tampered: bool,
    /// Failed checks in input order
    pub failed_checks: Vec<CheckOutcome>,
}

impl IntegrityVerdict {
    /// Fold outcomes, keeping only the failures.
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = CheckOutcome>) -> Self {
        let failed_checks: Vec<CheckOutcome> =
            outcomes.into_iter().filter(|outcome| outcome.failed).collect();
        Self {
            tampered: !failed_checks.is_empty(),
            failed_checks,
        }
    }

    pub fn failed_kinds(&self) -> Vec<CheckKind> {
        self.failed_checks
            .iter()
            .map(|outcome| outcome.check.kind())
            .collect()
    }
}
