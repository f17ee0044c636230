//! Core primitives shared by the tamperguard components
//!
//! - **Error handling**: errors with codes, context and recovery suggestions
//! - **Configuration**: TOML-based configuration with validation
//! - **Dispatch**: hand-off of background results onto the host's primary thread
//!
//! # Example
//!
//! ```rust,no_run
//! use tamperguard_core::config::Config;
//!
//! let config = Config::load(None).expect("invalid configuration");
//! println!("checking every {}ms", config.schema.debugger.interval_ms);
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dispatch;
pub mod error;

pub use error::{Error, ErrorCode, ErrorFamily, ErrorReport, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{CheckEntry, CheckEntryKind, Config, ConfigSchema};
    pub use crate::dispatch::{Completion, DispatchError, MainQueue, MainQueueHandle};
    pub use crate::error::{exit_codes, Error, ErrorCode, ErrorFamily, Result, ResultExt};
}
