//! Error types for spl-core

use std::path::PathBuf;

/// Result type for spl-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in spl-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No settings file found in the settings directory
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Settings are present but violate the schema
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Unknown connection '{name}', valid connections are: {valid}")]
    UnknownConnection { name: String, valid: String },

    #[error("Unknown app '{0}' for namespace context")]
    UnknownApp(String),

    #[error("Invalid sharing '{0}', expected one of global, system, app, user")]
    InvalidSharing(String),

    #[error("Unknown owner '{0}' for namespace context")]
    UnknownOwner(String),

    #[error("Restart is not allowed for connection '{0}' (set allow_restart)")]
    RestartNotAllowed(String),

    /// Neither an explicit nor a source connection was given
    #[error("No connection given, use --connection or --src")]
    NoConnection,

    #[error("A sample name is required in non-interactive mode")]
    SampleRequired,

    #[error("Unknown sample '{name}' for connection '{connection}'")]
    UnknownSample { name: String, connection: String },

    #[error("Path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Container '{0}' does not exist")]
    ContainerMissing(String),

    #[error("Container '{0}' is not running")]
    ContainerNotRunning(String),

    #[error("Docker image '{0}' not available")]
    ImageNotFound(String),

    /// AppInspect API returned something unexpected
    #[error("AppInspect error: {0}")]
    AppInspect(String),

    /// Interactive prompt failed (closed terminal, ...)
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// The user aborted a prompt with Ctrl-C
    #[error("Interrupted")]
    Interrupted,

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from spl-fs
    #[error(transparent)]
    Fs(#[from] spl_fs::Error),

    /// REST error from spl-client
    #[error(transparent)]
    Client(#[from] spl_client::ClientError),

    /// Engine error from spl-docker
    #[error(transparent)]
    Docker(#[from] spl_docker::DockerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}
