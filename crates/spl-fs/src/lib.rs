//! Filesystem helpers for the Splunk management utility
//!
//! Provides format-agnostic config loading, atomic writes and checksums.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;

pub use checksum::file_digest;
pub use config::{ConfigFormat, ConfigStore};
pub use error::{Error, Result};
