//! omniexport Common Utilities
//!
//! Shared infrastructure for all omniexport crates:
//! - Error types and result aliases
//! - Configuration file loading with export defaults
//! - Tracing/logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
