//! Error types for the staleguard library.

use thiserror::Error;

/// Errors that can occur during version reconciliation.
#[derive(Error, Debug)]
pub enum Error {
    /// A version string did not match the required `major.minor.patch` form.
    #[error("invalid version string: {0:?}")]
    Version(String),

    /// I/O error while persisting or reading the mismatch flag.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error while querying the version endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The version endpoint returned a body that could not be decoded.
    #[error("malformed version response: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for staleguard operations.
pub type Result<T> = std::result::Result<T, Error>;
