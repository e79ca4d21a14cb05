//! Connection handshake protocol for Linkdrop peers.
//!
//! Given a raw transport notification - "a remote peer connected to me" or
//! "my connect call produced a handle" - this crate decides when that
//! connection is safe to treat as open for both reading and writing, and
//! routes the confirmed connection to the application exactly once per
//! remote peer. It also fans application payloads out to every confirmed
//! connection.
//!
//! Everything here is a pure state machine: feed [`ClientEvent`]s in, get
//! [`ClientAction`]s out, execute them against whatever transport issues
//! the peer identities. See [`connection`] for the handshake itself.

mod client;
pub mod connection;
mod error;
mod event;

pub use client::Client;
pub use connection::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionRole, ConnectionState, PILOT, READY,
};
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent};
