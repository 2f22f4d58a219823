//! Error types for spl-docker

/// Result type for spl-docker operations
pub type Result<T> = std::result::Result<T, DockerError>;

/// Errors that can occur while talking to the docker engine
#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    /// The docker binary could not be spawned
    #[error("Failed to run docker: {0}")]
    Io(#[from] std::io::Error),

    /// docker exited with a non-zero status
    #[error("docker {command} failed ({code}): {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// docker output could not be parsed
    #[error("Unexpected docker output for {command}: {message}")]
    Decode { command: String, message: String },

    /// No container/image/volume with that name
    #[error("Docker object not found: {0}")]
    NotFound(String),
}
