//! Error types for the NocoDB MCP server

use thiserror::Error;

/// Errors raised while configuring the server or talking to NocoDB
#[derive(Error, Debug)]
pub enum NocoMcpError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// A required value was neither passed as a tool argument nor set in the environment
    #[error("{message}")]
    MissingParameter { message: String },

    #[error("{message}")]
    TableNotFound { message: String },

    #[error("{message}")]
    InvalidFilter { message: String },

    /// NocoDB answered with a non-success status; `body` is the raw response text
    #[error("NocoDB returned status {status}: {body}")]
    NocoDbError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("HTTP server error: {message}")]
    HttpServerError { message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl NocoMcpError {
    pub fn missing(message: impl Into<String>) -> Self {
        Self::MissingParameter {
            message: message.into(),
        }
    }

    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
        }
    }
}

/// Convenient Result type for server operations
pub type NocoMcpResult<T> = Result<T, NocoMcpError>;
