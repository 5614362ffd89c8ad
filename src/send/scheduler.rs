//! Non-blocking heap transmission with completion tracking.
//!
//! [`AsyncSendScheduler::send_heap`] encodes a heap on the caller's thread,
//! spawns its transmission on an explicitly supplied runtime and returns a
//! [`SendHandle`]. Every submission is numbered; [`flush`] waits only for
//! submissions made before it was called and reports their failures
//! according to the configured [`FlushPolicy`].
//!
//! [`flush`]: AsyncSendScheduler::flush

use std::{
    collections::{BTreeMap, BTreeSet},
    pin::pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures::executor::block_on;
use leaky_bucket::RateLimiter;
use tokio::{
    runtime::Handle,
    select,
    sync::{Notify, Semaphore, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{FlushError, FlushPolicy, HeapSent, PacketTransport, SendConfig, SendError, SendHandle};
use crate::{
    error::ConfigError,
    heap::SendHeap,
    packet::{EncodeError, HeapCnt, PacketEncoder, Packets},
};

/// Submissions awaiting an outcome, and failures not yet reported by a flush.
#[derive(Debug)]
struct Tracker {
    next_heap_cnt: u64,
    next_seq: u64,
    outstanding: BTreeSet<u64>,
    failures: BTreeMap<u64, SendError>,
}

struct Inner<T> {
    transport: T,
    encoder: PacketEncoder,
    runtime: Handle,
    limiter: Option<RateLimiter>,
    slots: Semaphore,
    tracker: Mutex<Tracker>,
    settled: Notify,
    shutdown: CancellationToken,
    flush_policy: FlushPolicy,
}

/// Settles one submission exactly once.
///
/// Moved into the transmission task; if the task is dropped unfinished
/// (the transport panicked or the runtime shut down) the submission settles
/// as [`SendError::Aborted`] so flushes still return.
struct Settle<T> {
    inner: Arc<Inner<T>>,
    seq: u64,
    heap_cnt: HeapCnt,
    done: bool,
}

impl<T> Settle<T> {
    fn finish(mut self, outcome: &Result<HeapSent, SendError>) {
        self.done = true;
        self.inner.settle(self.seq, outcome);
    }
}

impl<T> Drop for Settle<T> {
    fn drop(&mut self) {
        if !self.done {
            self.inner.settle(
                self.seq,
                &Err(SendError::Aborted {
                    heap_cnt: self.heap_cnt,
                }),
            );
        }
    }
}

/// Transmits heaps without blocking the caller.
///
/// Cloning yields another handle to the same scheduler; heap counters and
/// flush tracking are shared.
///
/// # Examples
///
/// ```no_run
/// use heapwire::{
///     HeapBuilder,
///     ItemId,
///     send::{AsyncSendScheduler, SendConfig},
/// };
/// use tokio::net::UdpSocket;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let socket = UdpSocket::bind("0.0.0.0:0").await?;
/// socket.connect("127.0.0.1:8888").await?;
/// let scheduler = AsyncSendScheduler::new(
///     socket,
///     &SendConfig::default(),
///     tokio::runtime::Handle::current(),
/// )?;
///
/// let mut builder = HeapBuilder::new();
/// builder.add_item(ItemId::new(0x1000), vec![0xDE, 0xAD, 0xBE, 0xEF])?;
/// let sent = scheduler.send_heap(&builder.build())?.await?;
/// println!("heap {} sent in {} packets", sent.heap_cnt, sent.packets);
/// scheduler.flush().await?;
/// # Ok(())
/// # }
/// ```
pub struct AsyncSendScheduler<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for AsyncSendScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for AsyncSendScheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSendScheduler")
            .field("encoder", &self.inner.encoder)
            .field("rate_limited", &self.inner.limiter.is_some())
            .field("flush_policy", &self.inner.flush_policy)
            .field("closed", &self.inner.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<T: PacketTransport> AsyncSendScheduler<T> {
    /// Create a scheduler sending through `transport` on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PacketSizeTooSmall`] when the configured packet
    /// size cannot carry the fixed overhead.
    pub fn new(transport: T, config: &SendConfig, runtime: Handle) -> Result<Self, ConfigError> {
        let encoder = PacketEncoder::new(config.flavour(), config.max_packet_size()).map_err(
            |_| ConfigError::PacketSizeTooSmall {
                size: config.max_packet_size(),
                minimum: crate::packet::MIN_PACKET_SIZE,
            },
        )?;
        let limiter = config
            .rate()
            .map(|rate| build_limiter(rate, config.burst_size()));
        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                encoder,
                runtime,
                limiter,
                slots: Semaphore::new(config.max_heaps()),
                tracker: Mutex::new(Tracker::default()),
                settled: Notify::new(),
                shutdown: CancellationToken::new(),
                flush_policy: config.flush_policy(),
            }),
        })
    }

    /// Encode `heap` and queue it for transmission.
    ///
    /// Heap counters start at 1 and increase by one per successful call, in
    /// submission order across clones. After [`close`](Self::close) the
    /// returned handle resolves to [`SendError::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] when the heap does not fit the flavour or the
    /// packet size. Nothing is sent and no counter is consumed.
    pub fn send_heap(&self, heap: &SendHeap) -> Result<SendHandle, EncodeError> {
        let inner = &self.inner;
        let (heap_cnt, seq, packets) = {
            let mut tracker = inner.lock();
            let heap_cnt = HeapCnt::new(tracker.next_heap_cnt);
            let packets = inner.encoder.encode(heap, heap_cnt)?;
            tracker.next_heap_cnt += 1;
            (heap_cnt, tracker.submit(), packets)
        };

        let (tx, rx) = oneshot::channel();
        let guard = Settle {
            inner: Arc::clone(inner),
            seq,
            heap_cnt,
            done: false,
        };
        inner.runtime.spawn(async move {
            let outcome = guard.inner.transmit(heap_cnt, packets).await;
            guard.finish(&outcome);
            let _ = tx.send(outcome);
        });
        debug!(heap_cnt = %heap_cnt, "heap submitted");
        Ok(SendHandle::new(heap_cnt, rx))
    }

    /// Wait until every heap submitted before this call has resolved.
    ///
    /// Returns immediately when nothing is outstanding. Each failure is
    /// reported by at most one flush.
    ///
    /// # Errors
    ///
    /// Under [`FlushPolicy::Strict`] returns [`FlushError::First`] with the
    /// earliest failure by submission order; under
    /// [`FlushPolicy::Lenient`] returns [`FlushError::Aggregate`] with all
    /// of them.
    pub async fn flush(&self) -> Result<(), FlushError> {
        let target = self.inner.lock().next_seq;
        loop {
            let mut settled = pin!(self.inner.settled.notified());
            settled.as_mut().enable();
            if self.inner.lock().settled_before(target) {
                break;
            }
            settled.await;
        }

        let mut failures = self.inner.lock().take_failures_before(target);
        if failures.is_empty() {
            return Ok(());
        }
        match self.inner.flush_policy {
            FlushPolicy::Strict => Err(FlushError::First(failures.swap_remove(0))),
            FlushPolicy::Lenient => Err(FlushError::Aggregate(failures)),
        }
    }

    /// Blocking form of [`flush`](Self::flush).
    ///
    /// Must not be called from a thread driving the scheduler's runtime.
    ///
    /// # Errors
    ///
    /// See [`flush`](Self::flush).
    pub fn flush_blocking(&self) -> Result<(), FlushError> { block_on(self.flush()) }

    /// Cancel transmission of heaps that have not started. Idempotent.
    ///
    /// Heaps already transmitting finish or fail packet by packet.
    pub fn close(&self) {
        if !self.inner.shutdown.is_cancelled() {
            self.inner.shutdown.cancel();
            info!("send scheduler closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.inner.shutdown.is_cancelled() }

    /// Heaps submitted but not yet resolved.
    #[must_use]
    pub fn outstanding(&self) -> usize { self.inner.lock().outstanding.len() }

    /// Encoder used for submitted heaps.
    #[must_use]
    pub fn encoder(&self) -> PacketEncoder { self.inner.encoder }
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, seq: u64, outcome: &Result<HeapSent, SendError>) {
        {
            let mut tracker = self.lock();
            tracker.outstanding.remove(&seq);
            if let Err(error) = outcome {
                tracker.failures.insert(seq, error.clone());
            }
        }
        self.settled.notify_waiters();
        match outcome {
            Ok(sent) => {
                debug!(
                    heap_cnt = %sent.heap_cnt,
                    packets = sent.packets,
                    bytes = sent.bytes,
                    "heap sent"
                );
                crate::metrics::inc_heaps_sent();
            }
            Err(error) => {
                warn!(heap_cnt = %error.heap_cnt(), %error, "heap send failed");
                crate::metrics::inc_send_failures();
            }
        }
    }
}

impl<T: PacketTransport> Inner<T> {
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    async fn transmit(&self, heap_cnt: HeapCnt, packets: Packets) -> Result<HeapSent, SendError> {
        let _slot = select! {
            biased;

            () = self.shutdown.cancelled() => return Err(SendError::Cancelled { heap_cnt }),
            slot = self.slots.acquire() => slot.map_err(|_| SendError::Cancelled { heap_cnt })?,
        };
        if self.shutdown.is_cancelled() {
            return Err(SendError::Cancelled { heap_cnt });
        }

        let mut sent = HeapSent {
            heap_cnt,
            packets: 0,
            bytes: 0,
        };
        for packet in packets {
            if let Some(limiter) = &self.limiter {
                limiter.acquire(packet.len()).await;
            }
            let len = packet.len() as u64;
            self.transport
                .send_packet(packet)
                .await
                .map_err(|source| SendError::Transport {
                    heap_cnt,
                    packets_sent: sent.packets,
                    source: Arc::new(source),
                })?;
            sent.packets += 1;
            sent.bytes += len;
        }
        Ok(sent)
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self {
            next_heap_cnt: 1,
            next_seq: 0,
            outstanding: BTreeSet::new(),
            failures: BTreeMap::new(),
        }
    }
}

impl Tracker {
    fn submit(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.outstanding.insert(seq);
        seq
    }

    fn settled_before(&self, target: u64) -> bool {
        self.outstanding.first().is_none_or(|seq| *seq >= target)
    }

    fn take_failures_before(&mut self, target: u64) -> Vec<SendError> {
        let later = self.failures.split_off(&target);
        std::mem::replace(&mut self.failures, later)
            .into_values()
            .collect()
    }
}

/// Token bucket in bytes refilled in millisecond steps, or slower for rates
/// below one byte per millisecond.
fn build_limiter(rate: f64, burst: usize) -> RateLimiter {
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "rate is validated positive and finite; fractional bytes round"
    )]
    let (refill, interval) = if rate >= 1000.0 {
        ((rate / 1000.0).round() as usize, Duration::from_millis(1))
    } else {
        (1, Duration::from_secs_f64(1.0 / rate))
    };
    RateLimiter::builder()
        .max(burst)
        .initial(burst)
        .refill(refill.max(1))
        .interval(interval)
        .build()
}
