//! Client error types.

use linkdrop_core::PeerId;
use thiserror::Error;

/// Errors from client operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// A message or close event referenced a peer with no connection record.
    #[error("no connection record for peer {remote}")]
    UnknownConnection {
        /// The peer the transport named.
        remote: PeerId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_peer() {
        let err = ClientError::UnknownConnection { remote: PeerId::from("p-17") };
        assert_eq!(err.to_string(), "no connection record for peer p-17");
    }
}
