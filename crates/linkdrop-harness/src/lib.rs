//! Deterministic simulation harness for Linkdrop.
//!
//! Everything here runs without real time or real sockets: [`SimEnv`]
//! implements the core `Environment` over a manual clock and a seeded RNG,
//! and [`World`] connects two client state machines through in-memory
//! pipes. Integration tests under `tests/` drive full rendezvous and
//! handshake scenarios through these pieces.

pub mod sim;
pub mod world;

pub use sim::{SimEnv, SimInstant};
pub use world::{Side, World};
