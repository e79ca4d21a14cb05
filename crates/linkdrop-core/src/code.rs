//! Room codes: short, human-shareable rendezvous handles.
//!
//! A code is exactly six characters from a fixed 36-symbol alphabet
//! (`0-9A-Z`). Comparison is case-insensitive; the canonical stored form is
//! uppercase, matching what the reference UI submits. Codes must stay easy
//! to read aloud and type, so the alphabet and length are a compatibility
//! surface, not a tuning knob.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::env::Environment;

/// Number of characters in a room code.
pub const CODE_LEN: usize = 6;

/// Symbols a room code may contain, in canonical (uppercase) form.
pub const CODE_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Rejection reasons for submitted codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    /// The code is not exactly [`CODE_LEN`] characters.
    #[error("room code must be exactly {CODE_LEN} characters, got {0}")]
    BadLength(usize),

    /// The code contains a character outside the alphabet.
    #[error("room code contains invalid character {0:?}")]
    BadCharacter(char),
}

/// A validated six-character room code in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Validate and normalize a submitted code.
    ///
    /// Lowercase input is accepted and uppercased; length and alphabet are
    /// enforced strictly.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError`] when the input is not a well-formed code.
    pub fn parse(input: &str) -> Result<Self, CodeError> {
        let normalized: String = input.trim().to_ascii_uppercase();
        if normalized.chars().count() != CODE_LEN {
            return Err(CodeError::BadLength(normalized.chars().count()));
        }
        let in_alphabet =
            |c: &char| u8::try_from(*c).is_ok_and(|b| CODE_ALPHABET.contains(&b));
        if let Some(bad) = normalized.chars().find(|c| !in_alphabet(c)) {
            return Err(CodeError::BadCharacter(bad));
        }
        Ok(Self(normalized))
    }

    /// Generate a uniformly random code from the environment's RNG.
    ///
    /// Uniqueness against live rooms is the directory's job; generation
    /// alone gives no such guarantee.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let mut bytes = [0u8; CODE_LEN];
        env.random_bytes(&mut bytes);
        let code = bytes
            .iter()
            .map(|b| CODE_ALPHABET[usize::from(*b) % CODE_ALPHABET.len()] as char)
            .collect();
        Self(code)
    }

    /// The canonical code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}
