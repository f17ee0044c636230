//! Evaluation of integrity checks against installed package metadata.

use std::path::Path;

use tamperguard_crypto::{digest_matches, sha256_file, CryptoError};
use tamperguard_telemetry::{metrics, names, Timer};
use tracing::{debug, warn};

use crate::check::{CheckOutcome, CheckSpec, IntegrityVerdict};
use crate::metadata::{InstalledBundle, MetadataError, PackageMetadata};

/// Computes the lowercase hex SHA-256 of a file.
pub type DigestFn = fn(&Path) -> Result<String, CryptoError>;

/// Runs [`CheckSpec`]s against a [`PackageMetadata`] source.
///
/// Every check is evaluated independently. A metadata or read error fails
/// that check only; the others still run.
pub struct IntegrityVerifier<M = InstalledBundle> {
    metadata: M,
    digest: DigestFn,
}

impl<M: PackageMetadata> IntegrityVerifier<M> {
    pub fn new(metadata: M) -> Self {
        Self {
            metadata,
            digest: sha256_file,
        }
    }

    /// Replace the file digest function.
    pub fn with_digest(mut self, digest: DigestFn) -> Self {
        self.digest = digest;
        self
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    /// Evaluate `checks` in order and aggregate the failures.
    pub fn evaluate(&self, checks: &[CheckSpec]) -> IntegrityVerdict {
        let _timer = Timer::start(names::INTEGRITY_EVALUATE_MS);

        let verdict =
            IntegrityVerdict::from_outcomes(checks.iter().map(|check| self.evaluate_one(check)));

        let registry = metrics();
        registry.increment_by(names::INTEGRITY_CHECKS, checks.len() as u64);
        registry.increment_by(names::INTEGRITY_FAILURES, verdict.failed_checks.len() as u64);

        if verdict.tampered {
            warn!(
                failed = verdict.failed_checks.len(),
                total = checks.len(),
                "Integrity verification failed"
            );
        } else {
            debug!(total = checks.len(), "Integrity verification passed");
        }
        verdict
    }

    /// Evaluate a single check.
    pub fn evaluate_one(&self, check: &CheckSpec) -> CheckOutcome {
        let result = match check {
            CheckSpec::PackageIdentifier(expected) => self.identifier_matches(expected),
            CheckSpec::ProvisioningArtifactDigest(expected) => self.artifact_matches(expected),
        };

        match result {
            Ok(true) => CheckOutcome::passed(check.clone()),
            Ok(false) => {
                debug!(kind = %check.kind(), "Integrity check mismatch");
                CheckOutcome::failed(check.clone(), "value does not match")
            }
            Err(err) => {
                warn!(kind = %check.kind(), error = %err, "Integrity check could not be evaluated");
                CheckOutcome::failed(check.clone(), err.to_string())
            }
        }
    }

    fn identifier_matches(&self, expected: &str) -> Result<bool, CheckError> {
        let actual = self.metadata.package_identifier()?;
        Ok(actual == expected)
    }

    fn artifact_matches(&self, expected: &str) -> Result<bool, CheckError> {
        let path = self.metadata.provisioning_artifact()?;
        let actual = (self.digest)(&path)?;
        Ok(digest_matches(&actual, expected))
    }
}

#[derive(thiserror::Error, Debug)]
enum CheckError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Digest(#[from] CryptoError),
}
