//! Events consumed and actions produced by the client state machine.
//!
//! The client is pure: the embedding driver translates transport
//! notifications into [`ClientEvent`]s and executes the returned
//! [`ClientAction`]s against real handles. Actions reference remote peers
//! by identity; the driver owns the identity-to-handle mapping.

use linkdrop_core::PeerId;

/// Inputs to [`Client::handle`].
///
/// Events for a single remote peer must be fed in arrival order; events for
/// different peers may be interleaved freely.
///
/// [`Client::handle`]: crate::client::Client::handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent<I> {
    /// The transport reports a remote peer connected to us.
    InboundConnected {
        /// Identity of the remote peer.
        remote: PeerId,
    },

    /// A local connect call produced a usable handle.
    OutboundConnected {
        /// Identity of the remote peer.
        remote: PeerId,
    },

    /// A message arrived on an established handle.
    MessageReceived {
        /// Identity of the remote peer.
        remote: PeerId,
        /// Opaque message contents.
        data: String,
    },

    /// The handle to a remote peer closed.
    ConnectionClosed {
        /// Identity of the remote peer.
        remote: PeerId,
    },

    /// The transport reported a connection- or peer-level error.
    TransportError {
        /// Identity of the remote peer.
        remote: PeerId,
        /// Transport-provided description.
        reason: String,
    },

    /// The application wants a payload fanned out to every confirmed
    /// connection.
    Broadcast {
        /// Payload to push, delivered unchanged.
        payload: String,
    },

    /// Periodic timer; drives handshake deadlines.
    Tick {
        /// Current time.
        now: I,
    },
}

/// Outputs of [`Client::handle`] for the driver to execute.
///
/// [`Client::handle`]: crate::client::Client::handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Push `data` on the handle for `remote`.
    Send {
        /// Identity of the remote peer.
        remote: PeerId,
        /// Message contents.
        data: String,
    },

    /// The connection to `remote` is confirmed; notify the application.
    /// Emitted at most once per record lifetime.
    ConnectionReady {
        /// Identity of the remote peer.
        remote: PeerId,
    },

    /// Hand an application payload up unchanged.
    Deliver {
        /// Identity of the remote peer.
        remote: PeerId,
        /// Payload contents.
        payload: String,
    },

    /// A pending handshake exceeded its deadline; the record was discarded.
    HandshakeFailed {
        /// Identity of the remote peer.
        remote: PeerId,
    },

    /// The transport reported an error for this peer; handshake state is
    /// unchanged (an erroring connection is expected to close eventually).
    PeerError {
        /// Identity of the remote peer.
        remote: PeerId,
        /// Transport-provided description.
        reason: String,
    },

    /// The record for `remote` was removed because its handle closed.
    ConnectionDropped {
        /// Identity of the remote peer.
        remote: PeerId,
    },
}
