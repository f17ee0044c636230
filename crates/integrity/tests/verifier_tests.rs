use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tamperguard_crypto::sha256_hex;
use tamperguard_integrity::{
    CheckKind, CheckSpec, InstalledBundle, IntegrityVerifier, MetadataError, PackageMetadata,
    INFO_PLIST, PROVISIONING_ARTIFACT,
};
use tempfile::TempDir;

const BUNDLE_ID: &str = "com.example.App";
const PROFILE: &[u8] = b"<plist>provisioning profile</plist>";

fn bundle_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(INFO_PLIST),
        format!(
            "<plist version=\"1.0\"><dict><key>CFBundleIdentifier</key><string>{}</string></dict></plist>",
            BUNDLE_ID
        ),
    )
    .unwrap();
    fs::write(dir.path().join(PROVISIONING_ARTIFACT), PROFILE).unwrap();
    dir
}

#[test]
fn matching_bundle_is_not_tampered() {
    let dir = bundle_dir();
    let verifier = IntegrityVerifier::new(InstalledBundle::open(dir.path()));

    let verdict = verifier.evaluate(&[
        CheckSpec::package_identifier(BUNDLE_ID),
        CheckSpec::provisioning_digest(sha256_hex(PROFILE)),
    ]);

    assert!(!verdict.tampered);
    assert!(verdict.failed_checks.is_empty());
}

#[test]
fn empty_check_list_is_not_tampered() {
    let verifier = IntegrityVerifier::new(InstalledBundle::open("/nonexistent/bundle"));
    let verdict = verifier.evaluate(&[]);
    assert!(!verdict.tampered);
    assert!(verdict.failed_checks.is_empty());
}

#[test]
fn digest_comparison_ignores_case() {
    let dir = bundle_dir();
    let verifier = IntegrityVerifier::new(InstalledBundle::open(dir.path()));

    let upper = sha256_hex(PROFILE).to_uppercase();
    let verdict = verifier.evaluate(&[CheckSpec::provisioning_digest(upper)]);
    assert!(!verdict.tampered);
}

#[test]
fn identifier_differing_only_in_case_fails() {
    let dir = bundle_dir();
    let verifier = IntegrityVerifier::new(InstalledBundle::open(dir.path()));

    let check = CheckSpec::package_identifier("com.example.app");
    let verdict = verifier.evaluate(&[check.clone()]);
    assert!(verdict.tampered);
    assert_eq!(verdict.failed_checks[0].check, check);
}

#[test]
fn missing_artifact_fails_only_the_digest_check() {
    let dir = bundle_dir();
    fs::remove_file(dir.path().join(PROVISIONING_ARTIFACT)).unwrap();
    let verifier = IntegrityVerifier::new(InstalledBundle::open(dir.path()));

    let verdict = verifier.evaluate(&[
        CheckSpec::package_identifier(BUNDLE_ID),
        CheckSpec::provisioning_digest(sha256_hex(PROFILE)),
    ]);

    assert!(verdict.tampered);
    assert_eq!(verdict.failed_kinds(), vec![CheckKind::ProvisioningArtifactDigest]);
}

#[test]
fn unreadable_identifier_fails_closed() {
    let dir = TempDir::new().unwrap();
    let verifier = IntegrityVerifier::new(InstalledBundle::open(dir.path()));

    let verdict = verifier.evaluate(&[CheckSpec::package_identifier(BUNDLE_ID)]);
    assert!(verdict.tampered);
    assert!(verdict.failed_checks[0].reason.is_some());
}

#[test]
fn modified_artifact_is_detected() {
    let dir = bundle_dir();
    let expected = sha256_hex(PROFILE);
    fs::write(dir.path().join(PROVISIONING_ARTIFACT), b"resigned profile").unwrap();

    let verifier = IntegrityVerifier::new(InstalledBundle::open(dir.path()));
    let verdict = verifier.evaluate(&[CheckSpec::provisioning_digest(expected)]);
    assert!(verdict.tampered);
}

#[test]
fn verdict_serializes_for_reporting() {
    let dir = bundle_dir();
    let verifier = IntegrityVerifier::new(InstalledBundle::open(dir.path()));
    let verdict = verifier.evaluate(&[CheckSpec::package_identifier("com.other.App")]);

    let json = serde_json::to_value(&verdict).unwrap();
    assert_eq!(json["tampered"], true);
    assert_eq!(json["failed_checks"][0]["check"]["kind"], "package_identifier");
    assert_eq!(json["failed_checks"][0]["check"]["expected"], "com.other.App");
}

/// Metadata whose identifier is fixed and whose artifact is absent.
struct NoArtifact;

impl PackageMetadata for NoArtifact {
    fn package_identifier(&self) -> Result<String, MetadataError> {
        Ok(BUNDLE_ID.to_string())
    }

    fn provisioning_artifact(&self) -> Result<PathBuf, MetadataError> {
        Err(MetadataError::ArtifactMissing(PathBuf::from(PROVISIONING_ARTIFACT)))
    }
}

fn arb_check() -> impl Strategy<Value = (CheckSpec, bool)> {
    prop_oneof![
        Just((CheckSpec::package_identifier(BUNDLE_ID), false)),
        "[a-z]{1,8}\\.[a-z]{1,8}".prop_map(|id| (CheckSpec::package_identifier(id), true)),
        "[0-9a-f]{64}".prop_map(|digest| (CheckSpec::provisioning_digest(digest), true)),
    ]
}

proptest! {
    #[test]
    fn verdict_lists_exactly_the_failures_in_order(checks in prop::collection::vec(arb_check(), 0..12)) {
        let verifier = IntegrityVerifier::new(NoArtifact);
        let specs: Vec<CheckSpec> = checks.iter().map(|(spec, _)| spec.clone()).collect();
        let expected_failures: Vec<CheckSpec> = checks
            .iter()
            .filter(|(_, fails)| *fails)
            .map(|(spec, _)| spec.clone())
            .collect();

        let verdict = verifier.evaluate(&specs);
        let failed: Vec<CheckSpec> = verdict.failed_checks.iter().map(|o| o.check.clone()).collect();

        prop_assert_eq!(verdict.tampered, !expected_failures.is_empty());
        prop_assert_eq!(failed, expected_failures);
    }
}
