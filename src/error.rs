// Error taxonomy for list operations.

use crate::api::RpcError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid input; raised before any network call.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("authentication failed: {0}")]
    Auth(#[source] RpcError),

    /// Any failure while paginating the list. No partial membership is kept.
    #[error("failed to fetch list membership: {0}")]
    Fetch(#[source] RpcError),

    /// A mutation that exhausted its retries or hit a non-retryable failure.
    #[error("final attempt failed after {attempts} tries: {source}")]
    Mutation {
        attempts: u32,
        #[source]
        source: RpcError,
    },

    #[error("prompt failed: {0}")]
    Prompt(String),
}

impl Error {
    /// Attempt count of a final mutation failure.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::Mutation { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
