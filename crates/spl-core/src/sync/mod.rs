//! Cross-instance reconciliation of knowledge objects
//!
//! This module provides:
//! - **engine**: diff a source and destination instance, then create,
//!   update and delete destination objects to match
//! - **report**: what a run did, skipped and failed on
//! - **conf**: stanza-level comparison of `.conf` files

mod conf;
mod engine;
mod report;

pub use conf::{ConfReport, StanzaReport, StanzaStatus};
pub use engine::{SyncEngine, SyncOptions};
pub use report::SyncReport;
