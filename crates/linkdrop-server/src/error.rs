//! Directory and server error types.

use linkdrop_core::{CodeError, PeerId};
use thiserror::Error;

use crate::store::StoreError;

/// Errors from directory operations.
///
/// Validation failures are surfaced to the caller and never retried
/// internally; code collisions during creation are resolved internally and
/// never reach this type.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Unknown peer identity.
    #[error("user not found: {0}")]
    PeerNotFound(PeerId),

    /// Unknown room id, or a code that was never issued.
    #[error("room not found")]
    RoomNotFound,

    /// Malformed input: bad id shape, bad code shape, bad payload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A peer tried to delete a room it does not own.
    #[error("peer {0} is not the room owner")]
    NotOwner(PeerId),

    /// Backing store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<CodeError> for DirectoryError {
    fn from(err: CodeError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Errors from the server runtime (bind, accept, serve).
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket-level failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_errors_become_validation() {
        let err: DirectoryError = CodeError::BadLength(3).into();
        assert!(matches!(err, DirectoryError::Validation(_)));
        assert!(err.to_string().contains("6 characters"));
    }

    #[test]
    fn not_found_display_matches_service_wording() {
        assert_eq!(
            DirectoryError::PeerNotFound(PeerId::from("abc")).to_string(),
            "user not found: abc"
        );
        assert_eq!(DirectoryError::RoomNotFound.to_string(), "room not found");
    }
}
