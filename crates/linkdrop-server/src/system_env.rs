//! Production clock and entropy source.

use std::time::Duration;

use linkdrop_core::Environment;

/// `Environment` backed by the OS: monotonic instants from
/// `std::time::Instant`, async sleeping through tokio, and entropy from
/// `getrandom`.
///
/// Room ids and codes are minted from `random_bytes`, so the entropy here
/// must be cryptographic; `getrandom` draws from the OS CSPRNG.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Does not fail on supported platforms. Zero-fill keeps the
            // process alive; the conditional insert still guarantees code
            // uniqueness.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}
