//! Transmit-side configuration.

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, flavour::Flavour, packet::MIN_PACKET_SIZE};

/// Largest packet that fits a standard 1500-byte Ethernet frame after IPv4
/// and UDP headers.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1472;
/// Rate limiter burst in bytes.
pub const DEFAULT_BURST_SIZE: usize = 65536;
/// Heaps transmitted concurrently.
pub const DEFAULT_MAX_HEAPS: usize = 4;

/// How [`AsyncSendScheduler::flush`](super::AsyncSendScheduler::flush)
/// reports failed heaps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Report the first failure in submission order.
    #[default]
    Strict,
    /// Report every failure together.
    Lenient,
}

/// Validated settings for an [`AsyncSendScheduler`](super::AsyncSendScheduler).
///
/// # Examples
///
/// ```
/// use heapwire::send::{FlushPolicy, SendConfig};
///
/// let config = SendConfig::builder()
///     .max_packet_size(9000)
///     .rate(Some(1e9))
///     .burst_size(9000)
///     .flush_policy(FlushPolicy::Lenient)
///     .build()
///     .expect("valid configuration");
/// assert_eq!(config.max_packet_size(), 9000);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SendConfigBuilder", into = "SendConfigBuilder")]
pub struct SendConfig {
    flavour: Flavour,
    max_packet_size: usize,
    rate: Option<f64>,
    burst_size: usize,
    max_heaps: usize,
    flush_policy: FlushPolicy,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            flavour: Flavour::default(),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            rate: None,
            burst_size: DEFAULT_BURST_SIZE,
            max_heaps: DEFAULT_MAX_HEAPS,
            flush_policy: FlushPolicy::Strict,
        }
    }
}

impl SendConfig {
    /// Start from the defaults.
    #[must_use]
    pub fn builder() -> SendConfigBuilder { SendConfigBuilder::default() }

    /// Flavour of the emitted packets.
    #[must_use]
    pub const fn flavour(&self) -> Flavour { self.flavour }

    /// Upper bound on each packet's size in bytes.
    #[must_use]
    pub const fn max_packet_size(&self) -> usize { self.max_packet_size }

    /// Send rate in bytes per second; `None` sends as fast as possible.
    #[must_use]
    pub const fn rate(&self) -> Option<f64> { self.rate }

    /// Bytes that may be sent back to back before the rate applies.
    #[must_use]
    pub const fn burst_size(&self) -> usize { self.burst_size }

    /// Heaps transmitted concurrently.
    #[must_use]
    pub const fn max_heaps(&self) -> usize { self.max_heaps }

    /// How flush reports failures.
    #[must_use]
    pub const fn flush_policy(&self) -> FlushPolicy { self.flush_policy }
}

/// Builder for [`SendConfig`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SendConfigBuilder {
    flavour: Flavour,
    max_packet_size: usize,
    rate: Option<f64>,
    burst_size: usize,
    max_heaps: usize,
    flush_policy: FlushPolicy,
}

impl Default for SendConfigBuilder {
    fn default() -> Self { SendConfig::default().into() }
}

impl SendConfigBuilder {
    /// Set the packet flavour.
    #[must_use]
    pub fn flavour(mut self, flavour: Flavour) -> Self {
        self.flavour = flavour;
        self
    }

    /// Set the maximum packet size.
    #[must_use]
    pub fn max_packet_size(mut self, bytes: usize) -> Self {
        self.max_packet_size = bytes;
        self
    }

    /// Set the send rate in bytes per second. `None` disables limiting.
    #[must_use]
    pub fn rate(mut self, bytes_per_second: Option<f64>) -> Self {
        self.rate = bytes_per_second;
        self
    }

    /// Set the rate limiter burst.
    #[must_use]
    pub fn burst_size(mut self, bytes: usize) -> Self {
        self.burst_size = bytes;
        self
    }

    /// Set how many heaps transmit concurrently.
    #[must_use]
    pub fn max_heaps(mut self, heaps: usize) -> Self {
        self.max_heaps = heaps;
        self
    }

    /// Set the flush policy.
    #[must_use]
    pub fn flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PacketSizeTooSmall`] when packets cannot carry
    /// the fixed overhead, [`ConfigError::InvalidRate`] for a non-positive or
    /// non-finite rate, [`ConfigError::BurstTooSmall`] when a rate is set and
    /// the burst cannot admit a full packet, and [`ConfigError::Zero`] when
    /// `max_heaps` is zero.
    pub fn build(self) -> Result<SendConfig, ConfigError> {
        if self.max_packet_size < MIN_PACKET_SIZE {
            return Err(ConfigError::PacketSizeTooSmall {
                size: self.max_packet_size,
                minimum: MIN_PACKET_SIZE,
            });
        }
        if let Some(rate) = self.rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(ConfigError::InvalidRate(rate));
            }
            if self.burst_size < self.max_packet_size {
                return Err(ConfigError::BurstTooSmall {
                    burst: self.burst_size,
                    packet: self.max_packet_size,
                });
            }
        }
        if self.max_heaps == 0 {
            return Err(ConfigError::Zero("max heaps"));
        }
        Ok(SendConfig {
            flavour: self.flavour,
            max_packet_size: self.max_packet_size,
            rate: self.rate,
            burst_size: self.burst_size,
            max_heaps: self.max_heaps,
            flush_policy: self.flush_policy,
        })
    }
}

impl From<SendConfig> for SendConfigBuilder {
    fn from(config: SendConfig) -> Self {
        Self {
            flavour: config.flavour,
            max_packet_size: config.max_packet_size,
            rate: config.rate,
            burst_size: config.burst_size,
            max_heaps: config.max_heaps,
            flush_policy: config.flush_policy,
        }
    }
}

impl TryFrom<SendConfigBuilder> for SendConfig {
    type Error = ConfigError;

    fn try_from(builder: SendConfigBuilder) -> Result<Self, Self::Error> { builder.build() }
}
