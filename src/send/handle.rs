//! Per-heap completion handles.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::executor::block_on;
use tokio::sync::oneshot;

use super::SendError;
use crate::packet::HeapCnt;

/// Summary of a transmitted heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapSent {
    /// Heap identifier assigned by the scheduler.
    pub heap_cnt: HeapCnt,
    /// Packets transmitted.
    pub packets: usize,
    /// Bytes transmitted, headers included.
    pub bytes: u64,
}

/// Resolves exactly once with the outcome of one heap.
///
/// Dropping the handle does not cancel transmission; the outcome is still
/// observed by [`flush`](super::AsyncSendScheduler::flush).
#[derive(Debug)]
#[must_use = "the handle reports whether the heap was sent"]
pub struct SendHandle {
    heap_cnt: HeapCnt,
    rx: oneshot::Receiver<Result<HeapSent, SendError>>,
}

impl SendHandle {
    pub(crate) fn new(
        heap_cnt: HeapCnt,
        rx: oneshot::Receiver<Result<HeapSent, SendError>>,
    ) -> Self {
        Self { heap_cnt, rx }
    }

    /// Heap identifier assigned to the submission.
    #[must_use]
    pub const fn heap_cnt(&self) -> HeapCnt { self.heap_cnt }

    /// Block the current thread until the heap resolves.
    ///
    /// Must not be called from within an async context.
    ///
    /// # Errors
    ///
    /// Returns the heap's [`SendError`].
    pub fn wait_blocking(self) -> Result<HeapSent, SendError> { block_on(self) }
}

impl Future for SendHandle {
    type Output = Result<HeapSent, SendError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let heap_cnt = self.heap_cnt;
        Pin::new(&mut self.rx).poll(cx).map(|outcome| {
            outcome.unwrap_or(Err(SendError::Aborted { heap_cnt }))
        })
    }
}
