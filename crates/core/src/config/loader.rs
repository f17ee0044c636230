//! Configuration file loading

use super::schema::{CheckEntryKind, ConfigSchema};
use crate::error::{Error, Result, ResultExt};
use std::path::{Path, PathBuf};

/// Configuration wrapper
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub schema: ConfigSchema,
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file path or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) if !p.exists() => return Err(Error::config_not_found(p)),
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(),
        };

        let schema = if let Some(ref p) = config_path {
            load_config_file(p)?
        } else {
            ConfigSchema::default()
        };

        let config = Self {
            schema,
            path: config_path,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config = Self {
            schema: toml::from_str(content)?,
            path: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the guard and verifier cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.schema.debugger.interval_ms == 0 {
            return Err(Error::config_invalid(
                "debugger.interval_ms must be greater than zero",
            ));
        }

        for (index, check) in self.schema.integrity.checks.iter().enumerate() {
            let expected = check.expected.as_str();
            let valid = match check.kind {
                CheckEntryKind::BundleId => !expected.trim().is_empty(),
                CheckEntryKind::MobileProvision => {
                    expected.len() == 64 && expected.chars().all(|c| c.is_ascii_hexdigit())
                }
            };
            if !valid {
                return Err(Error::config_invalid(format!(
                    "integrity.checks[{}]: invalid expected value for {:?}",
                    index, check.kind
                ))
                .with_suggestion(
                    "Bundle ids must be non-empty; provisioning digests must be 64 hex characters",
                ));
            }
        }

        Ok(())
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = [
        ".tamperguard.toml",
        "tamperguard.toml",
        ".config/tamperguard.toml",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("tamperguard").join("config.toml"));
    }

    candidates.into_iter().find(|candidate| candidate.exists())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path)
        .context(format!("Failed to read config file {}", path.display()))?;

    toml::from_str(&content).context(format!("Failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.path.is_none());
        assert_eq!(config.schema.debugger.interval_ms, 1000);
        assert_eq!(config.schema.debugger.expected_parent_pids, vec![1]);
        assert!(config.schema.integrity.checks.is_empty());
    }

    #[test]
    fn test_config_load_explicit_missing_file() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
    }

    #[test]
    fn test_config_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[debugger]
interval_ms = 250
expected_parent_pids = [1, 42]

[integrity]
bundle_path = "/var/containers/Bundle/Application/App.app"

[[integrity.checks]]
kind = "bundle_id"
expected = "com.example.App"

[[integrity.checks]]
kind = "mobile_provision"
expected = "{}"
"#,
            "ab".repeat(32)
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.schema.debugger.interval_ms, 250);
        assert_eq!(config.schema.debugger.expected_parent_pids, vec![1, 42]);
        assert_eq!(config.schema.integrity.checks.len(), 2);
        assert_eq!(
            config.schema.integrity.checks[0].kind,
            CheckEntryKind::BundleId
        );
        assert_eq!(config.path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = Config::from_toml("[debugger]\ninterval_ms = 0\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
    }

    #[test]
    fn test_malformed_digest_rejected() {
        let err = Config::from_toml(
            "[[integrity.checks]]\nkind = \"mobile_provision\"\nexpected = \"not-a-digest\"\n",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
    }

    #[test]
    fn test_padded_digest_rejected() {
        let toml = format!(
            "[[integrity.checks]]\nkind = \"mobile_provision\"\nexpected = \" {} \"\n",
            "ab".repeat(32)
        );
        let err = Config::from_toml(&toml).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
    }

    #[test]
    fn test_parse_error_code() {
        let err = Config::from_toml("[debugger\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParse);
    }
}
