//! Transmission failures.

use std::{io, sync::Arc};

use thiserror::Error;

use crate::packet::HeapCnt;

/// A heap could not be transmitted.
///
/// Cloneable so one failure can be reported both through the heap's handle
/// and by a later flush.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum SendError {
    /// The transport rejected a packet. Remaining packets were not sent.
    #[error("heap {heap_cnt} failed after {packets_sent} packets: {source}")]
    Transport {
        /// Heap that failed.
        heap_cnt: HeapCnt,
        /// Packets transmitted before the failure.
        packets_sent: usize,
        /// Transport error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The scheduler closed before the heap was transmitted.
    #[error("heap {heap_cnt} cancelled before transmission")]
    Cancelled {
        /// Heap that was cancelled.
        heap_cnt: HeapCnt,
    },
    /// The transmission task ended without an outcome: the transport
    /// panicked or the runtime shut down.
    #[error("heap {heap_cnt} transmission aborted")]
    Aborted {
        /// Heap whose transmission was aborted.
        heap_cnt: HeapCnt,
    },
}

impl SendError {
    /// Heap the failure concerns.
    #[must_use]
    pub const fn heap_cnt(&self) -> HeapCnt {
        match self {
            Self::Transport { heap_cnt, .. }
            | Self::Cancelled { heap_cnt }
            | Self::Aborted { heap_cnt } => *heap_cnt,
        }
    }
}

/// Failures observed by a flush.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum FlushError {
    /// First failure in submission order, under
    /// [`FlushPolicy::Strict`](super::FlushPolicy::Strict).
    #[error("flush failed: {0}")]
    First(SendError),
    /// Every failure in submission order, under
    /// [`FlushPolicy::Lenient`](super::FlushPolicy::Lenient).
    #[error("flush failed for {} heaps", .0.len())]
    Aggregate(Vec<SendError>),
}

impl FlushError {
    /// Failures carried by this error, in submission order.
    #[must_use]
    pub fn failures(&self) -> &[SendError] {
        match self {
            Self::First(error) => std::slice::from_ref(error),
            Self::Aggregate(errors) => errors,
        }
    }
}
