//! One receive stream: decoder, assembler and queue wired together.
//!
//! [`ReceiveStream`] is the single writer. It decodes each datagram, feeds
//! the assembler and pushes completed or abandoned heaps into the queue.
//! [`HeapReceiver`] is the consumer side and may be cloned freely.

use futures::{Stream, executor::block_on};
use tracing::{debug, warn};

use super::{
    BoundedHeapQueue,
    HeapAssembler,
    HeapEvent,
    Popped,
    Pushed,
    ReceiveConfig,
    error::{LostHeap, PacketStatus, StreamStopped, TryPushError},
};
use crate::{
    descriptor::DescriptorRegistry,
    error::ConfigError,
    heap::Heap,
    packet::{HeapCnt, decode_packet},
};

/// Producer side of a receive stream.
///
/// Dropping the stream stops it, reporting every partial heap as lost.
///
/// # Examples
///
/// ```
/// use heapwire::{
///     Flavour,
///     HeapBuilder,
///     HeapCnt,
///     ItemId,
///     packet::PacketEncoder,
///     recv::{Popped, ReceiveConfig, ReceiveStream},
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (mut stream, receiver) =
///     ReceiveStream::new(&ReceiveConfig::default()).expect("valid configuration");
/// let encoder = PacketEncoder::new(Flavour::default(), 1472).expect("valid size");
/// let packets = encoder
///     .encode(&heapwire::SendHeap::end_of_stream(), HeapCnt::new(1))
///     .expect("heap fits");
/// for packet in packets {
///     stream.add_packet(&packet).await.expect("stream running");
/// }
/// let Popped::Item(heap) = receiver.pop_heap().await else {
///     panic!("expected the end-of-stream heap");
/// };
/// assert!(heap.is_end_of_stream());
/// assert!(matches!(receiver.pop().await, Popped::Stopped));
/// # }
/// ```
#[derive(Debug)]
pub struct ReceiveStream {
    assembler: HeapAssembler,
    queue: BoundedHeapQueue<HeapEvent>,
    stopped: bool,
}

impl ReceiveStream {
    /// Create a stream with a fresh descriptor registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the queue cannot be built from `config`.
    pub fn new(config: &ReceiveConfig) -> Result<(Self, HeapReceiver), ConfigError> {
        Self::with_registry(config, DescriptorRegistry::new())
    }

    /// Create a stream registering descriptors into an existing registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the queue cannot be built from `config`.
    pub fn with_registry(
        config: &ReceiveConfig,
        registry: DescriptorRegistry,
    ) -> Result<(Self, HeapReceiver), ConfigError> {
        let queue = BoundedHeapQueue::new(config.queue_capacity(), config.queue_policy())?;
        let receiver = HeapReceiver {
            queue: queue.clone(),
            registry: registry.clone(),
        };
        let stream = Self {
            assembler: HeapAssembler::new(config, registry),
            queue,
            stopped: false,
        };
        Ok((stream, receiver))
    }

    /// Feed one datagram.
    ///
    /// Malformed datagrams are dropped, logged and reported as
    /// [`PacketStatus::Rejected`]; the stream continues. When the queue is
    /// full under [`QueuePolicy::Block`](super::QueuePolicy::Block) this
    /// waits for the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`StreamStopped`] once the stream has stopped, either after an
    /// end-of-stream heap or because the consumer stopped the queue.
    pub async fn add_packet(&mut self, datagram: &[u8]) -> Result<PacketStatus, StreamStopped> {
        if self.is_stopped() {
            return Err(StreamStopped);
        }
        let events = match decode_packet(datagram) {
            Ok(packet) => self.assembler.add_packet(&packet),
            Err(error) => {
                debug!(%error, len = datagram.len(), "dropping malformed packet");
                crate::metrics::inc_malformed();
                return Ok(PacketStatus::Rejected(error));
            }
        };
        self.deliver(events).await?;
        Ok(PacketStatus::Accepted)
    }

    /// Feed one datagram from a thread outside any async runtime.
    ///
    /// # Errors
    ///
    /// See [`add_packet`](Self::add_packet).
    pub fn add_packet_blocking(&mut self, datagram: &[u8]) -> Result<PacketStatus, StreamStopped> {
        block_on(self.add_packet(datagram))
    }

    /// Abandon partial heaps that outlived the configured timeout and report
    /// them to the consumer. Returns how many were abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`StreamStopped`] once the stream has stopped.
    pub async fn purge_expired(&mut self) -> Result<usize, StreamStopped> {
        if self.is_stopped() {
            return Err(StreamStopped);
        }
        let events = self.assembler.purge_expired();
        let count = events.len();
        self.deliver(events).await?;
        Ok(count)
    }

    /// Abandon one partial heap. The caller is told directly; the consumer
    /// is not notified.
    pub fn discard(&mut self, heap_cnt: HeapCnt) -> Option<LostHeap> {
        self.assembler.discard(heap_cnt)
    }

    /// Stop the stream. Idempotent.
    ///
    /// Partial heaps are reported as lost where the queue has room, then the
    /// queue is stopped so consumers drain it and observe
    /// [`Popped::Stopped`].
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        for lost in self.assembler.flush() {
            if let Err(TryPushError::Full(event) | TryPushError::Stopped(event)) =
                self.queue.try_push(HeapEvent::Lost(lost))
            {
                debug!(heap_cnt = %event.heap_cnt(), "lost-heap notice not queued at stop");
            }
        }
        self.queue.stop();
        debug!("receive stream stopped");
    }

    /// Whether the stream has stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool { self.stopped || self.queue.is_stopped() }

    /// Registry shared with the consumer.
    #[must_use]
    pub fn registry(&self) -> &DescriptorRegistry { self.assembler.registry() }

    /// Number of partial heaps.
    #[must_use]
    pub fn live_heaps(&self) -> usize { self.assembler.live_heaps() }

    async fn deliver(&mut self, events: Vec<HeapEvent>) -> Result<(), StreamStopped> {
        for event in events {
            let end_of_stream = matches!(&event, HeapEvent::Heap(heap) if heap.is_end_of_stream());
            if end_of_stream {
                for lost in self.assembler.flush() {
                    self.push(HeapEvent::Lost(lost)).await?;
                }
                self.push(event).await?;
                debug!("end of stream received");
                self.stop();
                return Ok(());
            }
            self.push(event).await?;
        }
        Ok(())
    }

    async fn push(&mut self, event: HeapEvent) -> Result<(), StreamStopped> {
        match self.queue.push(event).await {
            Ok(Pushed::Queued) => Ok(()),
            Ok(Pushed::Dropped(dropped)) => {
                debug!(heap_cnt = %dropped.heap_cnt(), "heap event dropped by full queue");
                Ok(())
            }
            Err(_) => {
                warn!("heap queue stopped by consumer; stopping stream");
                self.stop();
                Err(StreamStopped)
            }
        }
    }
}

impl Drop for ReceiveStream {
    fn drop(&mut self) { self.stop(); }
}

/// Consumer side of a receive stream.
#[derive(Clone, Debug)]
pub struct HeapReceiver {
    queue: BoundedHeapQueue<HeapEvent>,
    registry: DescriptorRegistry,
}

impl HeapReceiver {
    /// Wait for the next heap or lost-heap notice.
    pub async fn pop(&self) -> Popped<HeapEvent> { self.queue.pop().await }

    /// Wait for the next heap from a thread outside any async runtime.
    pub fn pop_blocking(&self) -> Popped<HeapEvent> { self.queue.pop_blocking() }

    /// Take the next event if one is queued.
    pub fn try_pop(&self) -> Option<Popped<HeapEvent>> { self.queue.try_pop() }

    /// Wait for the next complete heap, skipping lost-heap notices.
    pub async fn pop_heap(&self) -> Popped<Heap> {
        loop {
            match self.queue.pop().await {
                Popped::Item(HeapEvent::Heap(heap)) => return Popped::Item(heap),
                Popped::Item(HeapEvent::Lost(_)) => {}
                Popped::Stopped => return Popped::Stopped,
            }
        }
    }

    /// Blocking form of [`pop_heap`](Self::pop_heap).
    pub fn pop_heap_blocking(&self) -> Popped<Heap> { block_on(self.pop_heap()) }

    /// Stop consuming. The producer observes [`StreamStopped`] on its next
    /// packet.
    pub fn stop(&self) { self.queue.stop(); }

    /// Whether the queue has stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool { self.queue.is_stopped() }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize { self.queue.len() }

    /// Whether no events are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.queue.is_empty() }

    /// Registry the stream records descriptors into.
    #[must_use]
    pub fn registry(&self) -> &DescriptorRegistry { &self.registry }

    /// View the queue as a stream of events ending at the stop.
    pub fn stream(&self) -> impl Stream<Item = HeapEvent> + use<> { self.queue.stream() }
}
