//! Configuration loading and schema definitions
//!
//! Shared configuration types for the guard, the verifier and the host.

mod loader;
mod schema;

pub use loader::Config;
pub use schema::*;
