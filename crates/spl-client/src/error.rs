//! Error types for spl-client

/// Result type for spl-client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised while talking to a Splunk instance
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure (connect, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Splunk answered with a non-success status
    #[error("Splunk returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Login was rejected or no credentials were configured
    #[error("Authentication failed for {authority}: {message}")]
    Auth { authority: String, message: String },

    /// Response body did not have the expected shape
    #[error("Unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// Entity does not exist on the instance
    #[error("{endpoint} entity '{name}' not found")]
    NotFound { endpoint: String, name: String },

    /// Malformed base URL or path
    #[error("Invalid URL: {0}")]
    Url(String),
}

impl ClientError {
    pub fn decode(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Whether the error is a 404 from the server.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Status { status: 404, .. })
    }
}
