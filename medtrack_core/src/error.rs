//! Error types for the medtrack_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medtrack_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or malformed request fields
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Referenced entry or dose does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Key-value store unavailable or returned unusable data
    #[error("Store failure: {0}")]
    Store(String),

    /// Transport failure talking to the remote API
    #[error("Network failure: {0}")]
    Network(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short message suitable for showing to the person using the tracker.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidInput(msg) => format!("That change was rejected: {}", msg),
            Error::NotFound(msg) => format!("Nothing to update: {}", msg),
            Error::Network(_) => {
                "Could not reach the tracker service. Your change was not saved.".to_string()
            }
            Error::Store(_) => "Saving failed. Your change was not saved.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}
