//! Metric helpers for `heapwire`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking packets accepted by an assembler.
pub const PACKETS_TOTAL: &str = "heapwire_packets_total";
/// Name of the counter tracking datagrams rejected as malformed.
pub const MALFORMED_PACKETS: &str = "heapwire_malformed_packets_total";
/// Name of the counter tracking heaps reassembled in full.
pub const HEAPS_COMPLETED: &str = "heapwire_heaps_completed_total";
/// Name of the counter tracking abandoned heaps, labelled by `reason`.
pub const HEAPS_LOST: &str = "heapwire_heaps_lost_total";
/// Name of the counter tracking heap events dropped by a full queue.
pub const QUEUE_DROPS: &str = "heapwire_queue_drops_total";
/// Name of the counter tracking heaps transmitted in full.
pub const HEAPS_SENT: &str = "heapwire_heaps_sent_total";
/// Name of the counter tracking heaps that failed to transmit.
pub const SEND_FAILURES: &str = "heapwire_send_failures_total";

/// Record a packet accepted by an assembler.
pub fn inc_packets() {
    #[cfg(feature = "metrics")]
    counter!(PACKETS_TOTAL).increment(1);
}

/// Record a datagram that failed to decode.
pub fn inc_malformed() {
    #[cfg(feature = "metrics")]
    counter!(MALFORMED_PACKETS).increment(1);
}

/// Record a completed heap.
pub fn inc_heaps_completed() {
    #[cfg(feature = "metrics")]
    counter!(HEAPS_COMPLETED).increment(1);
}

/// Record an abandoned heap with its reason label.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables, reason = "metrics disabled"))]
pub fn inc_heaps_lost(reason: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(HEAPS_LOST, "reason" => reason).increment(1);
}

/// Record a heap event dropped by a full queue.
pub fn inc_queue_drops() {
    #[cfg(feature = "metrics")]
    counter!(QUEUE_DROPS).increment(1);
}

/// Record a heap transmitted in full.
pub fn inc_heaps_sent() {
    #[cfg(feature = "metrics")]
    counter!(HEAPS_SENT).increment(1);
}

/// Record a heap that failed to transmit.
pub fn inc_send_failures() {
    #[cfg(feature = "metrics")]
    counter!(SEND_FAILURES).increment(1);
}
