//! Error types for swt-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use thiserror::Error;

/// Result type alias for swt-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for swt-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error, including encode/copy failures of a streaming upload
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Malformed or unsupported URL
    #[error("Invalid URL {0}")]
    InvalidUrl(String),

    /// Remote file does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport-level failure: connection refused, timeout, TLS
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status other than 404
    #[error("{0}")]
    Status(String),

    /// Server reported an error message in its response body
    #[error("{0}")]
    Remote(String),

    /// Server response could not be interpreted
    #[error("{0}")]
    UnexpectedResponse(String),

    /// Background task was cancelled through its abort handle
    #[error("Task cancelled")]
    Cancelled,

    /// Background task never produced a value (panic or pool shutdown)
    #[error("Task aborted: {0}")]
    TaskAborted(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Whether this error reports a missing remote file.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::InvalidUrl(_) => 2, // UsageError
            Error::Network(_) | Error::Status(_) => 3,    // NetworkError
            Error::NotFound(_) => 5,                      // NotFound
            Error::Cancelled => 130,                      // Interrupted
            _ => 1,                                       // GeneralError
        }
    }
}
