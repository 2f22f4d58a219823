//! Settings of the management utility
//!
//! `settings.yaml` describes connections, sample searches, the Splunkbase
//! catalog, docker images and app exclusions. See [`SettingsLoader`] for the
//! layering rules.

mod loader;
mod merge;
mod settings;

pub use loader::SettingsLoader;
pub use merge::{deep_merge_value, env_overrides};
pub use settings::{
    AppsConfig, ConnectionConfig, DEFAULT_USER_PASSWORD, DockerConfig, SampleConfig, Settings,
    SplunkbaseApp, SplunkbaseConfig, SyncConfig,
};
