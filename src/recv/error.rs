//! Outcomes of the receive path that are not delivered heaps.

use std::fmt;

use thiserror::Error;

use crate::packet::{HeapCnt, MalformedPacket};

/// Protocol violation that forced a heap to be abandoned.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Violation {
    /// Two packets of one heap declared different heap lengths.
    #[error("conflicting heap lengths {first} and {second}")]
    ConflictingLength {
        /// Length declared first.
        first: u64,
        /// Length declared later.
        second: u64,
    },
    /// A payload slice ended beyond the declared heap length.
    #[error("payload ends at {end}, beyond heap length {heap_length}")]
    OffsetBeyondLength {
        /// End of the offending slice.
        end: u64,
        /// Declared heap length.
        heap_length: u64,
    },
    /// A payload slice overlapped bytes already received with different
    /// content or boundaries.
    #[error("payload at {offset} overlaps data already received")]
    Overlap {
        /// Start of the offending slice.
        offset: u64,
    },
}

/// Why a heap was abandoned before completion.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum HeapOverflow {
    /// Declared or received size exceeds the per-heap limit.
    #[error("heap of {attempted} bytes exceeds the {limit}-byte limit")]
    TooLarge {
        /// Size that was attempted.
        attempted: u64,
        /// Configured limit.
        limit: u64,
    },
    /// Bytes buffered across partial heaps would exceed the in-flight budget.
    #[error("{attempted} buffered bytes would exceed the {limit}-byte in-flight budget")]
    InFlightBudget {
        /// Buffered total that was attempted.
        attempted: u64,
        /// Configured budget.
        limit: u64,
    },
    /// Too many packets for other heaps arrived since the last packet.
    #[error("no packet for {gap} packets")]
    Stale {
        /// Packets seen for other heaps since this heap's last packet.
        gap: u64,
    },
    /// The heap outlived the configured timeout.
    #[error("heap outlived its timeout")]
    Expired,
    /// The heap was the oldest when the live-heap limit was reached.
    #[error("evicted to make room for a newer heap")]
    Evicted,
    /// Packets of the heap were inconsistent.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] Violation),
    /// The heap was dropped on request.
    #[error("discarded on request")]
    Discarded,
    /// The stream stopped while the heap was partial.
    #[error("flushed at stream stop")]
    Flushed,
}

impl HeapOverflow {
    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TooLarge { .. } => "too_large",
            Self::InFlightBudget { .. } => "in_flight_budget",
            Self::Stale { .. } => "stale",
            Self::Expired => "expired",
            Self::Evicted => "evicted",
            Self::ProtocolViolation(_) => "protocol_violation",
            Self::Discarded => "discarded",
            Self::Flushed => "flushed",
        }
    }
}

/// Notification that a heap was abandoned.
///
/// Delivered to the consumer in place of the heap so loss is never silent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LostHeap {
    /// Identifier of the abandoned heap.
    pub heap_cnt: HeapCnt,
    /// Reason for abandonment.
    pub reason: HeapOverflow,
    /// Payload bytes received before abandonment.
    pub received_bytes: u64,
    /// Declared heap length, if any packet carried it.
    pub heap_length: Option<u64>,
}

impl fmt::Display for LostHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "heap {} lost after {} bytes: {}",
            self.heap_cnt, self.received_bytes, self.reason
        )
    }
}

/// The queue has been stopped and accepts no further items.
///
/// Returned to producers. Consumers observe the stop as
/// [`Popped::Stopped`](super::Popped::Stopped) instead.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("heap queue stopped")]
pub struct QueueStopped<T>(pub T);

/// Errors returned by [`BoundedHeapQueue::try_push`](super::BoundedHeapQueue::try_push).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TryPushError<T> {
    /// The queue was full under [`QueuePolicy::Block`](super::QueuePolicy::Block).
    #[error("heap queue full")]
    Full(T),
    /// The queue has been stopped.
    #[error("heap queue stopped")]
    Stopped(T),
}

impl<T> TryPushError<T> {
    /// Recover the rejected item.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Stopped(item) => item,
        }
    }
}

/// The receive stream has stopped; further packets are ignored.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("receive stream stopped")]
pub struct StreamStopped;

/// Outcome of feeding one datagram to a [`ReceiveStream`](super::ReceiveStream).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PacketStatus {
    /// The packet was parsed and handed to the assembler.
    Accepted,
    /// The packet failed to parse and was dropped.
    Rejected(MalformedPacket),
}
