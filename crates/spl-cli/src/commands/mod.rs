//! Command implementations for spl-cli

pub mod apps;
pub mod connections;
pub mod docker;
pub mod manager;
pub mod samples;
pub mod sync;

pub use apps::{run_apps_list, run_apps_validate};
pub use connections::run_connections;
pub use docker::run_docker;
pub use manager::{parse_kind, run_info, run_list, run_restart};
pub use samples::{run_samples_download, run_samples_list};
pub use sync::{run_confs, run_sync};
