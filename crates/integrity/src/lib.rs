//! Integrity verification of the installed application package.
//!
//! Supported checks:
//! - **package identifier**: exact, case-sensitive match
//! - **provisioning artifact digest**: SHA-256 of `embedded.mobileprovision`,
//!   hex compared case-insensitively in constant time
//!
//! Verification fails closed: metadata that cannot be read fails the check
//! that needed it and nothing else.
//!
//! ```rust,no_run
//! use tamperguard_integrity::{CheckSpec, InstalledBundle, IntegrityVerifier};
//!
//! let verifier = IntegrityVerifier::new(InstalledBundle::open("Example.app"));
//! let verdict = verifier.evaluate(&[CheckSpec::package_identifier("com.example.App")]);
//! for outcome in &verdict.failed_checks {
//!     eprintln!("{}", outcome.check);
//! }
//! ```

mod check;
mod metadata;
mod verifier;

pub use check::{CheckKind, CheckOutcome, CheckSpec, IntegrityVerdict};
pub use metadata::{
    parse_bundle_identifier, InstalledBundle, MetadataError, PackageMetadata, INFO_PLIST,
    PROVISIONING_ARTIFACT,
};
pub use verifier::{DigestFn, IntegrityVerifier};

/// Convert the `[integrity] checks` config entries.
pub fn checks_from_settings(settings: &tamperguard_core::config::IntegritySettings) -> Vec<CheckSpec> {
    settings.checks.iter().map(CheckSpec::from).collect()
}
