//! Shared foundation for the Linkdrop rendezvous system.
//!
//! This crate holds everything both sides of the wire agree on:
//!
//! - [`env::Environment`]: the time/randomness seam that keeps protocol
//!   logic deterministic and simulation-friendly
//! - [`model`]: peer and room records as stored and served by the directory
//! - [`code`]: the six-character room-code alphabet and validation rules
//!
//! No I/O lives here.

pub mod code;
pub mod env;
pub mod model;

pub use code::{CODE_ALPHABET, CODE_LEN, CodeError, RoomCode};
pub use env::Environment;
pub use model::{Peer, PeerId, Room, RoomId};
