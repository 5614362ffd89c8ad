//! Canonical error types shared across the crate.
//!
//! Component errors live next to the code that raises them
//! ([`MalformedPacket`](crate::packet::MalformedPacket),
//! [`BuildError`](crate::heap::BuildError),
//! [`SendError`](crate::send::SendError) and friends). This module holds the
//! configuration error used by every builder.

use thiserror::Error;

/// Errors returned when validating stream configuration.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The heap address width is not a multiple of eight within `8..=56`.
    #[error("invalid heap address width {0} bits; must be a multiple of 8 between 8 and 56")]
    InvalidHeapAddressBits(u32),
    /// A size, count or capacity that must be positive was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    /// The maximum packet size cannot hold the fixed per-packet overhead.
    #[error("max packet size {size} is below the minimum of {minimum} bytes")]
    PacketSizeTooSmall {
        /// Configured packet size.
        size: usize,
        /// Smallest packet that can carry one payload byte.
        minimum: usize,
    },
    /// The rate limiter burst cannot admit a single full-size packet.
    #[error("burst size {burst} must be at least the max packet size {packet}")]
    BurstTooSmall {
        /// Configured burst size in bytes.
        burst: usize,
        /// Configured maximum packet size in bytes.
        packet: usize,
    },
    /// A send rate was given that is not a positive, finite number.
    #[error("invalid send rate {0}; must be a positive number of bytes per second")]
    InvalidRate(f64),
}
