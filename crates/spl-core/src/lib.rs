//! Core layer of the Splunk management utility
//!
//! This crate sits between the CLI and the low-level crates and provides:
//!
//! - **Settings**: layered `settings.yaml` loading with environments,
//!   secrets and `SPL_*` overrides
//! - **Connections**: a named Splunk instance with namespace selection
//! - **Object sync**: diffing and synchronizing knowledge objects between
//!   two instances
//! - **Samples**: running configured searches and storing results as CSV
//! - **Apps**: local app discovery, packaging and AppInspect cloud vetting
//! - **Docker**: the local development container
//!
//! ```text
//!                       spl-cli
//!                          |
//!                       spl-core
//!                          |
//!          +---------------+---------------+
//!          |               |               |
//!       spl-fs        spl-client       spl-docker
//! ```

pub mod appinspect;
pub mod apps;
pub mod config;
pub mod connection;
pub mod diff;
pub mod docker;
pub mod error;
pub mod objects;
pub mod prompt;
pub mod samples;
pub mod sync;
pub mod table;

pub use appinspect::AppInspectClient;
pub use apps::{AppsManager, LocalApp, PackagingOutcome, ValidationOutcome};
pub use config::{ConnectionConfig, Settings, SettingsLoader};
pub use connection::{ConnectionAdapter, NamespaceRequest};
pub use diff::{ChangeKind, EntityDiff, PropertyChange};
pub use docker::{DockerManager, StartAction};
pub use error::{Error, Result};
pub use objects::{Inventory, ObjectKind, ObjectList};
pub use prompt::{AcceptDefaults, Prompter};
pub use samples::{DownloadReport, SamplesManager};
pub use sync::{ConfReport, StanzaStatus, SyncEngine, SyncOptions, SyncReport};
pub use table::Table;
