use std::fmt::Debug;
use thiserror::Error;

/// Errors surfaced by the sensor driver and the acquisition loop.
#[derive(Debug, Error)]
pub enum Error<E: Debug> {
    /// The register transport reported a failure.
    #[error("register bus error: {0:?}")]
    Bus(E),

    /// The part-id register did not hold the expected value.
    #[error("unexpected part id 0x{found:02X} (expected 0x{expected:02X})")]
    IdentityMismatch { expected: u8, found: u8 },
}
