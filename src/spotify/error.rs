//! Errors from the artist list and the collection endpoint, with their
//! retry classification.

use thiserror::Error;

use crate::error::TransportError;
use crate::retry::Retryable;

#[derive(Debug, Error)]
pub enum CollectionError {
    /// HTTP 401. The credential is no good; retrying cannot help.
    #[error("collection write unauthorized (status 401)")]
    Unauthorized,

    #[error("collection write failed (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Retryable for CollectionError {
    fn is_retryable(&self) -> bool {
        !matches!(self, CollectionError::Unauthorized)
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("artist list request failed (status {status})")]
    Status { status: u16 },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Retryable for SourceError {
    fn is_retryable(&self) -> bool {
        true
    }
}
