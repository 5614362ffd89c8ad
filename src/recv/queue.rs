//! Fixed-capacity FIFO between the assembler and the consumer.
//!
//! [`BoundedHeapQueue`] is the only synchronisation point on the receive
//! path. Producers and consumers may use it from async tasks or plain
//! threads; the blocking variants drive the async ones on the calling
//! thread. Once stopped, the queue rejects pushes, still hands out the items
//! it holds, and then reports [`Popped::Stopped`] to every caller.

use std::{
    collections::VecDeque,
    pin::pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::{Stream, executor::block_on, stream};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::warn;

use super::error::{QueueStopped, TryPushError};
use crate::error::ConfigError;

/// Behaviour of [`BoundedHeapQueue::push`] when the queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// Wait until a consumer makes room. Nothing is ever lost.
    #[default]
    Block,
    /// Evict the oldest queued item to make room for the new one.
    DropOldest,
    /// Reject the new item and keep the queue unchanged.
    DropNewest,
}

/// Outcome of a successful push.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub enum Pushed<T> {
    /// The item was queued and nothing was lost.
    Queued,
    /// The queue was full; this item was dropped to honour the policy.
    ///
    /// Under [`QueuePolicy::DropOldest`] it is the evicted oldest item, under
    /// [`QueuePolicy::DropNewest`] the item that was pushed.
    Dropped(T),
}

/// Outcome of a pop.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub enum Popped<T> {
    /// The next queued item.
    Item(T),
    /// The queue is stopped and drained; no further items will arrive.
    Stopped,
}

impl<T> Popped<T> {
    /// Convert into an `Option`, mapping [`Popped::Stopped`] to `None`.
    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Item(item) => Some(item),
            Self::Stopped => None,
        }
    }
}

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    stopped: bool,
}

#[derive(Debug)]
struct Shared<T> {
    state: Mutex<State<T>>,
    readable: Notify,
    writable: Notify,
    capacity: usize,
    policy: QueuePolicy,
}

/// Bounded multi-producer, multi-consumer queue with a terminal stop.
///
/// Cloning yields another handle to the same queue.
///
/// # Examples
///
/// ```
/// use heapwire::recv::{BoundedHeapQueue, Popped, Pushed, QueuePolicy};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = BoundedHeapQueue::new(1, QueuePolicy::DropOldest).expect("non-zero capacity");
/// assert_eq!(queue.push(1).await, Ok(Pushed::Queued));
/// assert_eq!(queue.push(2).await, Ok(Pushed::Dropped(1)));
/// queue.stop();
/// assert_eq!(queue.pop().await, Popped::Item(2));
/// assert_eq!(queue.pop().await, Popped::Stopped);
/// # }
/// ```
#[derive(Debug)]
pub struct BoundedHeapQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BoundedHeapQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> BoundedHeapQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Zero`] when `capacity` is zero.
    pub fn new(capacity: usize, policy: QueuePolicy) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::Zero("queue capacity"));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::with_capacity(capacity),
                    stopped: false,
                }),
                readable: Notify::new(),
                writable: Notify::new(),
                capacity,
                policy,
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Push `item`, waiting for room when the policy is
    /// [`QueuePolicy::Block`].
    ///
    /// # Errors
    ///
    /// Returns [`QueueStopped`] carrying the item when the queue has been
    /// stopped, including while waiting for room.
    pub async fn push(&self, item: T) -> Result<Pushed<T>, QueueStopped<T>> {
        let mut item = item;
        loop {
            let mut writable = pin!(self.shared.writable.notified());
            writable.as_mut().enable();
            match self.try_push(item) {
                Ok(pushed) => return Ok(pushed),
                Err(TryPushError::Stopped(rejected)) => return Err(QueueStopped(rejected)),
                Err(TryPushError::Full(rejected)) => item = rejected,
            }
            writable.await;
        }
    }

    /// Push from a thread outside any async runtime.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn push_blocking(&self, item: T) -> Result<Pushed<T>, QueueStopped<T>> {
        block_on(self.push(item))
    }

    /// Push without waiting.
    ///
    /// The drop policies never report [`TryPushError::Full`].
    ///
    /// # Errors
    ///
    /// Returns [`TryPushError::Full`] when the queue is full under
    /// [`QueuePolicy::Block`] and [`TryPushError::Stopped`] once stopped.
    pub fn try_push(&self, item: T) -> Result<Pushed<T>, TryPushError<T>> {
        let mut state = self.state();
        if state.stopped {
            return Err(TryPushError::Stopped(item));
        }
        let pushed = if state.items.len() < self.shared.capacity {
            state.items.push_back(item);
            Pushed::Queued
        } else {
            match self.shared.policy {
                QueuePolicy::Block => return Err(TryPushError::Full(item)),
                QueuePolicy::DropOldest => {
                    let oldest = state.items.pop_front();
                    state.items.push_back(item);
                    match oldest {
                        Some(oldest) => Pushed::Dropped(oldest),
                        None => Pushed::Queued,
                    }
                }
                QueuePolicy::DropNewest => {
                    drop(state);
                    warn!(
                        capacity = self.shared.capacity,
                        "heap queue full; dropped newest item"
                    );
                    crate::metrics::inc_queue_drops();
                    return Ok(Pushed::Dropped(item));
                }
            }
        };
        drop(state);
        if matches!(pushed, Pushed::Dropped(_)) {
            warn!(
                capacity = self.shared.capacity,
                "heap queue full; dropped oldest item"
            );
            crate::metrics::inc_queue_drops();
        }
        self.shared.readable.notify_one();
        Ok(pushed)
    }

    /// Wait for the next item or the terminal stop.
    pub async fn pop(&self) -> Popped<T> {
        loop {
            let mut readable = pin!(self.shared.readable.notified());
            readable.as_mut().enable();
            if let Some(popped) = self.try_pop() {
                return popped;
            }
            readable.await;
        }
    }

    /// Pop from a thread outside any async runtime.
    pub fn pop_blocking(&self) -> Popped<T> { block_on(self.pop()) }

    /// Pop without waiting.
    ///
    /// Returns `None` when the queue is empty but still running.
    pub fn try_pop(&self) -> Option<Popped<T>> {
        let mut state = self.state();
        match state.items.pop_front() {
            Some(item) => {
                drop(state);
                self.shared.writable.notify_one();
                Some(Popped::Item(item))
            }
            None if state.stopped => Some(Popped::Stopped),
            None => None,
        }
    }

    /// Stop the queue and wake every waiter. Idempotent.
    ///
    /// Items already queued are still delivered by subsequent pops.
    pub fn stop(&self) {
        self.state().stopped = true;
        self.shared.readable.notify_waiters();
        self.shared.writable.notify_waiters();
    }

    /// Whether [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool { self.state().stopped }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize { self.state().items.len() }

    /// Whether no items are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.state().items.is_empty() }

    /// Maximum number of queued items.
    #[must_use]
    pub fn capacity(&self) -> usize { self.shared.capacity }

    /// Policy applied when the queue is full.
    #[must_use]
    pub fn policy(&self) -> QueuePolicy { self.shared.policy }

    /// View the queue as a stream of items ending at the stop.
    pub fn stream(&self) -> impl Stream<Item = T> + use<T> {
        stream::unfold(self.clone(), |queue| async move {
            match queue.pop().await {
                Popped::Item(item) => Some((item, queue)),
                Popped::Stopped => None,
            }
        })
    }
}

#[cfg(test)]
mod tests;
