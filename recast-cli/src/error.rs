//! Application-wide error types.

use thiserror::Error;

use crate::acquire::AcquireError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquireError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
