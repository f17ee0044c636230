//! Error type with stable codes, context and recovery suggestions
//!
//! Detection and verification never return these; their internal failures
//! are folded into booleans and outcomes at the component boundary. `Error`
//! covers what is left: configuration, dispatch, package metadata lookup and
//! the findings reported by the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable numeric codes, rendered `E####`; the thousands digit is the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Internal = 1000,

    Io = 2000,
    FileNotFound = 2001,
    PermissionDenied = 2002,

    ConfigNotFound = 3001,
    ConfigParse = 3002,
    ConfigInvalid = 3003,

    MetadataUnavailable = 5001,
    ArtifactMissing = 5002,

    DispatchClosed = 6001,
    ActionPanicked = 6002,

    DebuggerDetected = 7001,
    TamperingDetected = 7002,
}

/// Family an [`ErrorCode`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorFamily {
    General,
    Io,
    Configuration,
    Integrity,
    Dispatch,
    Security,
}

impl ErrorCode {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn family(self) -> ErrorFamily {
        match self {
            Self::Internal => ErrorFamily::General,
            Self::Io | Self::FileNotFound | Self::PermissionDenied => ErrorFamily::Io,
            Self::ConfigNotFound | Self::ConfigParse | Self::ConfigInvalid => {
                ErrorFamily::Configuration
            }
            Self::MetadataUnavailable | Self::ArtifactMissing => ErrorFamily::Integrity,
            Self::DispatchClosed | Self::ActionPanicked => ErrorFamily::Dispatch,
            Self::DebuggerDetected | Self::TamperingDetected => ErrorFamily::Security,
        }
    }

    /// Process exit status for an error of this code
    pub fn exit_code(self) -> i32 {
        match self.family() {
            ErrorFamily::Configuration => exit_codes::CONFIG_ERROR,
            ErrorFamily::Security => exit_codes::SECURITY_ERROR,
            _ => exit_codes::FAILURE,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Error with a code, optional context and a suggestion for the operator
#[derive(Error, Debug)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub context: Option<String>,
    pub suggestion: Option<String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(context) = &self.context {
            write!(f, "\n  Context: {}", context)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            suggestion: None,
            source: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Serializable form for JSON output and structured logs
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code,
            code_str: self.code.to_string(),
            family: self.code.family(),
            message: self.message.clone(),
            context: self.context.clone(),
            suggestion: self.suggestion.clone(),
            source: self.source.as_ref().map(|e| e.to_string()),
        }
    }

    pub fn config_not_found(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(
            ErrorCode::ConfigNotFound,
            format!("Configuration file not found: {}", path.as_ref().display()),
        )
        .with_suggestion("Create a .tamperguard.toml file or use --config to specify a path")
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    pub fn debugger_detected(signals: &[&str]) -> Self {
        Self::new(ErrorCode::DebuggerDetected, "Debugger attached to the process")
            .with_context(format!("signals: {}", signals.join(", ")))
    }

    pub fn tampering_detected(failed_checks: usize) -> Self {
        Self::new(
            ErrorCode::TamperingDetected,
            format!("{} integrity check(s) failed", failed_checks),
        )
        .with_suggestion("Reinstall the application from a trusted source")
    }
}

/// Serializable error report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub code_str: String,
    pub family: ErrorFamily,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Exit codes for the `tamperguard` binary
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const CONFIG_ERROR: i32 = 3;
    pub const SECURITY_ERROR: i32 = 5;
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            _ => ErrorCode::Io,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorCode::ConfigParse, format!("TOML parse error: {}", err)).with_source(err)
    }
}

impl From<crate::dispatch::DispatchError> for Error {
    fn from(err: crate::dispatch::DispatchError) -> Self {
        let code = match err {
            crate::dispatch::DispatchError::Closed => ErrorCode::DispatchClosed,
            crate::dispatch::DispatchError::Panicked(_) => ErrorCode::ActionPanicked,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

/// Attach context or a suggestion to the error of a `Result`
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Into::<Error>::into(e).with_context(context))
    }

    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T> {
        self.map_err(|e| Into::<Error>::into(e).with_suggestion(suggestion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_rendering_and_family() {
        assert_eq!(ErrorCode::ConfigInvalid.to_string(), "E3003");
        assert_eq!(ErrorCode::TamperingDetected.to_string(), "E7002");
        assert_eq!(ErrorCode::ArtifactMissing.family(), ErrorFamily::Integrity);
        assert_eq!(ErrorCode::PermissionDenied.family(), ErrorFamily::Io);
    }

    #[test]
    fn test_exit_code_by_family() {
        assert_eq!(ErrorCode::ConfigParse.exit_code(), exit_codes::CONFIG_ERROR);
        assert_eq!(ErrorCode::DebuggerDetected.exit_code(), exit_codes::SECURITY_ERROR);
        assert_eq!(ErrorCode::MetadataUnavailable.exit_code(), exit_codes::FAILURE);
    }

    #[test]
    fn test_io_error_mapping() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: Error = io.into();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert!(err.source.is_some());
    }

    #[test]
    fn test_result_ext_converts_and_annotates() {
        let failed: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = failed.context("reading Info.plist").unwrap_err();
        assert_eq!(err.code, ErrorCode::FileNotFound);
        assert_eq!(err.context.as_deref(), Some("reading Info.plist"));
    }

    #[test]
    fn test_dispatch_error_mapping() {
        let err: Error = crate::dispatch::DispatchError::Panicked("boom".into()).into();
        assert_eq!(err.code, ErrorCode::ActionPanicked);
        assert!(err.message.contains("boom"));
    }

    #[test]
    fn test_error_report_serialization() {
        let err = Error::tampering_detected(2).with_context("startup verification");
        let json = serde_json::to_value(err.to_report()).unwrap();

        assert_eq!(json["code_str"], "E7002");
        assert_eq!(json["family"], "Security");
        assert!(json["suggestion"].as_str().unwrap().contains("Reinstall"));
    }
}
