//! Receive-side configuration.
//!
//! The limits bounding the assembler are policy rather than protocol. The
//! defaults below suit a single 10 GbE stream of heaps up to a few
//! megabytes; tune them per deployment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::QueuePolicy;
use crate::error::ConfigError;

/// Heaps buffered between the assembler and the consumer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;
/// Largest heap accepted by the assembler: 32 MiB.
pub const DEFAULT_MAX_HEAP_SIZE: u64 = 32 * 1024 * 1024;
/// Reassembly buffer bytes held across all partial heaps: 256 MiB.
pub const DEFAULT_MAX_IN_FLIGHT_BYTES: u64 = 256 * 1024 * 1024;
/// Partial heaps tracked at once before the oldest is evicted.
pub const DEFAULT_MAX_LIVE_HEAPS: usize = 16;
/// Packets for other heaps tolerated since a heap's last packet.
pub const DEFAULT_MAX_PACKET_GAP: u64 = 1024;
/// Age after which a partial heap is purged.
pub const DEFAULT_HEAP_TIMEOUT: Duration = Duration::from_secs(5);
/// Receive buffer size used by [`UdpReader`](super::UdpReader); fits jumbo
/// frames.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 9200;

/// Validated settings for a [`ReceiveStream`](super::ReceiveStream).
///
/// Construct through [`ReceiveConfig::builder`] or deserialize from any serde
/// format; both paths validate the values.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use heapwire::recv::{QueuePolicy, ReceiveConfig};
///
/// let config = ReceiveConfig::builder()
///     .queue_capacity(4)
///     .queue_policy(QueuePolicy::DropOldest)
///     .heap_timeout(Duration::from_millis(500))
///     .build()
///     .expect("valid configuration");
/// assert_eq!(config.queue_capacity(), 4);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ReceiveConfigBuilder", into = "ReceiveConfigBuilder")]
pub struct ReceiveConfig {
    queue_capacity: usize,
    queue_policy: QueuePolicy,
    max_heap_size: u64,
    max_in_flight_bytes: u64,
    max_live_heaps: usize,
    max_packet_gap: u64,
    heap_timeout: Duration,
    max_packet_size: usize,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_policy: QueuePolicy::Block,
            max_heap_size: DEFAULT_MAX_HEAP_SIZE,
            max_in_flight_bytes: DEFAULT_MAX_IN_FLIGHT_BYTES,
            max_live_heaps: DEFAULT_MAX_LIVE_HEAPS,
            max_packet_gap: DEFAULT_MAX_PACKET_GAP,
            heap_timeout: DEFAULT_HEAP_TIMEOUT,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

impl ReceiveConfig {
    /// Start from the defaults.
    #[must_use]
    pub fn builder() -> ReceiveConfigBuilder { ReceiveConfigBuilder::default() }

    /// Capacity of the heap queue.
    #[must_use]
    pub const fn queue_capacity(&self) -> usize { self.queue_capacity }

    /// Behaviour of the heap queue when full.
    #[must_use]
    pub const fn queue_policy(&self) -> QueuePolicy { self.queue_policy }

    /// Largest accepted heap length in bytes.
    #[must_use]
    pub const fn max_heap_size(&self) -> u64 { self.max_heap_size }

    /// Budget for reassembly buffer bytes across all partial heaps. A heap is
    /// charged up to the end of the furthest byte it has received.
    #[must_use]
    pub const fn max_in_flight_bytes(&self) -> u64 { self.max_in_flight_bytes }

    /// Maximum number of partial heaps.
    #[must_use]
    pub const fn max_live_heaps(&self) -> usize { self.max_live_heaps }

    /// Packets for other heaps tolerated since a heap's last packet.
    #[must_use]
    pub const fn max_packet_gap(&self) -> u64 { self.max_packet_gap }

    /// Age after which a partial heap is purged.
    #[must_use]
    pub const fn heap_timeout(&self) -> Duration { self.heap_timeout }

    /// Largest datagram the reader will accept.
    #[must_use]
    pub const fn max_packet_size(&self) -> usize { self.max_packet_size }
}

/// Builder for [`ReceiveConfig`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveConfigBuilder {
    queue_capacity: usize,
    queue_policy: QueuePolicy,
    max_heap_size: u64,
    max_in_flight_bytes: u64,
    max_live_heaps: usize,
    max_packet_gap: u64,
    heap_timeout: Duration,
    max_packet_size: usize,
}

impl Default for ReceiveConfigBuilder {
    fn default() -> Self { ReceiveConfig::default().into() }
}

impl ReceiveConfigBuilder {
    /// Set the capacity of the heap queue.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the full-queue policy.
    #[must_use]
    pub fn queue_policy(mut self, policy: QueuePolicy) -> Self {
        self.queue_policy = policy;
        self
    }

    /// Set the largest accepted heap length.
    #[must_use]
    pub fn max_heap_size(mut self, bytes: u64) -> Self {
        self.max_heap_size = bytes;
        self
    }

    /// Set the budget for bytes buffered across partial heaps.
    #[must_use]
    pub fn max_in_flight_bytes(mut self, bytes: u64) -> Self {
        self.max_in_flight_bytes = bytes;
        self
    }

    /// Set the maximum number of partial heaps.
    #[must_use]
    pub fn max_live_heaps(mut self, heaps: usize) -> Self {
        self.max_live_heaps = heaps;
        self
    }

    /// Set how many packets for other heaps a partial heap may wait through.
    #[must_use]
    pub fn max_packet_gap(mut self, packets: u64) -> Self {
        self.max_packet_gap = packets;
        self
    }

    /// Set the age after which a partial heap is purged.
    #[must_use]
    pub fn heap_timeout(mut self, timeout: Duration) -> Self {
        self.heap_timeout = timeout;
        self
    }

    /// Set the receive buffer size used by the UDP reader.
    #[must_use]
    pub fn max_packet_size(mut self, bytes: usize) -> Self {
        self.max_packet_size = bytes;
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Zero`] when any capacity, budget, gap or
    /// timeout is zero.
    pub fn build(self) -> Result<ReceiveConfig, ConfigError> {
        let checks = [
            ("queue capacity", self.queue_capacity as u64),
            ("max heap size", self.max_heap_size),
            ("max in-flight bytes", self.max_in_flight_bytes),
            ("max live heaps", self.max_live_heaps as u64),
            ("max packet gap", self.max_packet_gap),
            ("max packet size", self.max_packet_size as u64),
        ];
        if let Some((name, _)) = checks.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero(*name));
        }
        if self.heap_timeout.is_zero() {
            return Err(ConfigError::Zero("heap timeout"));
        }
        Ok(ReceiveConfig {
            queue_capacity: self.queue_capacity,
            queue_policy: self.queue_policy,
            max_heap_size: self.max_heap_size,
            max_in_flight_bytes: self.max_in_flight_bytes,
            max_live_heaps: self.max_live_heaps,
            max_packet_gap: self.max_packet_gap,
            heap_timeout: self.heap_timeout,
            max_packet_size: self.max_packet_size,
        })
    }
}

impl From<ReceiveConfig> for ReceiveConfigBuilder {
    fn from(config: ReceiveConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            queue_policy: config.queue_policy,
            max_heap_size: config.max_heap_size,
            max_in_flight_bytes: config.max_in_flight_bytes,
            max_live_heaps: config.max_live_heaps,
            max_packet_gap: config.max_packet_gap,
            heap_timeout: config.heap_timeout,
            max_packet_size: config.max_packet_size,
        }
    }
}

impl TryFrom<ReceiveConfigBuilder> for ReceiveConfig {
    type Error = ConfigError;

    fn try_from(builder: ReceiveConfigBuilder) -> Result<Self, Self::Error> { builder.build() }
}
