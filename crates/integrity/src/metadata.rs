//! Read-only access to the installed package's identity.
//!
//! [`InstalledBundle`] reads an application bundle directory laid out the
//! iOS way: `Info.plist` and `embedded.mobileprovision` at the root.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tamperguard_core::config::IntegritySettings;
use tamperguard_core::ErrorCode;
use thiserror::Error;
use tracing::debug;

pub const INFO_PLIST: &str = "Info.plist";
pub const PROVISIONING_ARTIFACT: &str = "embedded.mobileprovision";

const BINARY_PLIST_MAGIC: &[u8] = b"bplist00";

static BUNDLE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<key>\s*CFBundleIdentifier\s*</key>\s*<string>\s*([^<]*?)\s*</string>")
        .expect("valid bundle identifier regex")
});

/// Failure to read package metadata
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is a binary property list; only XML property lists are supported")]
    BinaryPlist(PathBuf),

    #[error("no CFBundleIdentifier in {0}")]
    MissingIdentifier(PathBuf),

    #[error("package identifier is empty")]
    EmptyIdentifier,

    #[error("provisioning artifact not found at {0}")]
    ArtifactMissing(PathBuf),

    #[error("cannot locate bundle: {0}")]
    BundleNotFound(String),
}

impl From<MetadataError> for tamperguard_core::Error {
    fn from(err: MetadataError) -> Self {
        let code = match &err {
            MetadataError::ArtifactMissing(_) => ErrorCode::ArtifactMissing,
            _ => ErrorCode::MetadataUnavailable,
        };
        tamperguard_core::Error::new(code, err.to_string())
            .with_suggestion("Check --bundle or [integrity] bundle_path in .tamperguard.toml")
    }
}

/// Identity of the installed package.
pub trait PackageMetadata: Send + Sync {
    /// Identifier the package was installed with.
    fn package_identifier(&self) -> Result<String, MetadataError>;

    /// Location of the provisioning artifact. Errors when it is absent.
    fn provisioning_artifact(&self) -> Result<PathBuf, MetadataError>;
}

/// An application bundle on disk
#[derive(Debug, Clone)]
pub struct InstalledBundle {
    root: PathBuf,
    identifier_override: Option<String>,
}

impl InstalledBundle {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            identifier_override: None,
        }
    }

    /// The bundle holding the running executable.
    pub fn current() -> Result<Self, MetadataError> {
        let exe = std::env::current_exe()
            .map_err(|e| MetadataError::BundleNotFound(e.to_string()))?;
        let root = exe.parent().ok_or_else(|| {
            MetadataError::BundleNotFound(format!("{} has no parent directory", exe.display()))
        })?;
        Ok(Self::open(root))
    }

    /// Bundle described by the `[integrity]` config section.
    pub fn from_settings(settings: &IntegritySettings) -> Result<Self, MetadataError> {
        let bundle = match &settings.bundle_path {
            Some(path) => Self::open(path),
            None => Self::current()?,
        };
        Ok(match &settings.bundle_id_override {
            Some(id) => bundle.with_identifier_override(id.clone()),
            None => bundle,
        })
    }

    /// Report `identifier` instead of reading `Info.plist`.
    pub fn with_identifier_override(mut self, identifier: impl Into<String>) -> Self {
        self.identifier_override = Some(identifier.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_identifier(&self) -> Result<String, MetadataError> {
        let path = self.root.join(INFO_PLIST);
        let bytes = fs::read(&path).map_err(|source| MetadataError::Read {
            path: path.clone(),
            source,
        })?;

        if bytes.starts_with(BINARY_PLIST_MAGIC) {
            return Err(MetadataError::BinaryPlist(path));
        }

        let text = String::from_utf8_lossy(&bytes);
        let identifier = parse_bundle_identifier(&text)
            .ok_or_else(|| MetadataError::MissingIdentifier(path.clone()))?;
        debug!(path = %path.display(), identifier = %identifier, "Read bundle identifier");
        Ok(identifier)
    }
}

impl PackageMetadata for InstalledBundle {
    fn package_identifier(&self) -> Result<String, MetadataError> {
        let identifier = match &self.identifier_override {
            Some(id) => id.clone(),
            None => self.read_identifier()?,
        };
        if identifier.is_empty() {
            return Err(MetadataError::EmptyIdentifier);
        }
        Ok(identifier)
    }

    fn provisioning_artifact(&self) -> Result<PathBuf, MetadataError> {
        let path = self.root.join(PROVISIONING_ARTIFACT);
        if path.is_file() {
            Ok(path)
        } else {
            Err(MetadataError::ArtifactMissing(path))
        }
    }
}

/// Extract `CFBundleIdentifier` from an XML property list.
pub fn parse_bundle_identifier(plist: &str) -> Option<String> {
    BUNDLE_IDENTIFIER
        .captures(plist)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
