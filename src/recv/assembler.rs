//! Reassembly of packets into complete heaps.
//!
//! [`HeapAssembler`] tracks partial heaps keyed by [`HeapCnt`]. Each packet's
//! payload is copied to its declared offset and its item pointers are
//! merged. A heap completes once its length is known and every payload byte
//! has arrived; it is then frozen into a [`Heap`] whose items carry the
//! descriptor known at that moment. Heaps that cannot complete are abandoned
//! and reported as [`LostHeap`]s, never dropped silently.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use tracing::{debug, warn};

use super::{
    ReceiveConfig,
    error::{HeapOverflow, LostHeap, Violation},
};
use crate::{
    descriptor::{Descriptor, DescriptorRegistry},
    flavour::Flavour,
    heap::{Heap, Item, ItemFormat},
    packet::{HeapCnt, ItemId, ItemPointer, Packet, address_extents, encoded_len, item_id},
};

/// Completed or abandoned heaps remembered so late duplicates are ignored.
const FINISHED_HISTORY: usize = 64;

/// Something the consumer must hear about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapEvent {
    /// A heap completed.
    Heap(Heap),
    /// A heap was abandoned.
    Lost(LostHeap),
}

impl HeapEvent {
    /// Identifier of the heap the event concerns.
    #[must_use]
    pub const fn heap_cnt(&self) -> HeapCnt {
        match self {
            Self::Heap(heap) => heap.cnt(),
            Self::Lost(lost) => lost.heap_cnt,
        }
    }

    /// The completed heap, if this event carries one.
    #[must_use]
    pub fn into_heap(self) -> Option<Heap> {
        match self {
            Self::Heap(heap) => Some(heap),
            Self::Lost(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Limits {
    max_heap_size: u64,
    max_in_flight_bytes: u64,
    max_live_heaps: usize,
    max_packet_gap: u64,
    heap_timeout: Duration,
}

#[derive(Debug)]
struct LiveHeap {
    flavour: Flavour,
    heap_length: Option<u64>,
    payload: Vec<u8>,
    /// Received slices as `start -> end`; never overlapping.
    ranges: BTreeMap<u64, u64>,
    received: u64,
    pointers: Vec<ItemPointer>,
    seen: HashSet<ItemPointer>,
    registered: HashSet<u64>,
    started_at: Instant,
    first_packet: u64,
    last_packet: u64,
}

impl LiveHeap {
    fn new(flavour: Flavour, now: Instant, seq: u64) -> Self {
        Self {
            flavour,
            heap_length: None,
            payload: Vec::new(),
            ranges: BTreeMap::new(),
            received: 0,
            pointers: Vec::new(),
            seen: HashSet::new(),
            registered: HashSet::new(),
            started_at: now,
            first_packet: seq,
            last_packet: seq,
        }
    }

    fn lost(&self, heap_cnt: HeapCnt, reason: HeapOverflow) -> LostHeap {
        LostHeap {
            heap_cnt,
            reason,
            received_bytes: self.received,
            heap_length: self.heap_length,
        }
    }

    fn max_end(&self) -> u64 { self.ranges.values().next_back().copied().unwrap_or(0) }

    /// Bytes held by the reassembly buffer.
    fn allocated(&self) -> u64 { self.payload.len() as u64 }

    /// Merge one packet. Returns how far the reassembly buffer grew.
    fn accept(
        &mut self,
        packet: &Packet<'_>,
        limits: &Limits,
        buffered: u64,
    ) -> Result<u64, HeapOverflow> {
        if let Some(length) = packet.heap_length() {
            if length > limits.max_heap_size {
                return Err(HeapOverflow::TooLarge {
                    attempted: length,
                    limit: limits.max_heap_size,
                });
            }
            match self.heap_length {
                Some(first) if first != length => {
                    return Err(Violation::ConflictingLength {
                        first,
                        second: length,
                    }
                    .into());
                }
                Some(_) => {}
                None => {
                    let end = self.max_end();
                    if end > length {
                        return Err(Violation::OffsetBeyondLength {
                            end,
                            heap_length: length,
                        }
                        .into());
                    }
                    self.heap_length = Some(length);
                }
            }
        }

        let data = packet.payload();
        let offset = packet.payload_offset();
        let len = data.len() as u64;
        let end = offset.saturating_add(len);
        if len > 0 {
            if end > limits.max_heap_size {
                return Err(HeapOverflow::TooLarge {
                    attempted: end,
                    limit: limits.max_heap_size,
                });
            }
            if let Some(heap_length) = self.heap_length
                && end > heap_length
            {
                return Err(Violation::OffsetBeyondLength { end, heap_length }.into());
            }
        }

        let mut grown = 0;
        if len > 0 && !self.is_duplicate(offset, end, data)? {
            // A packet far into the heap allocates every byte before it.
            grown = end.saturating_sub(self.allocated());
            let attempted = buffered.saturating_add(grown);
            if attempted > limits.max_in_flight_bytes {
                return Err(HeapOverflow::InFlightBudget {
                    attempted,
                    limit: limits.max_in_flight_bytes,
                });
            }
            #[expect(
                clippy::cast_possible_truncation,
                reason = "bounded by max_heap_size, which fits in memory"
            )]
            let (start, stop) = (offset as usize, end as usize);
            if self.payload.len() < stop {
                self.payload.resize(stop, 0);
            }
            self.payload[start..stop].copy_from_slice(data);
            self.ranges.insert(offset, end);
            self.received += len;
        }

        for pointer in packet.item_pointers() {
            if self.seen.insert(*pointer) {
                self.pointers.push(*pointer);
            }
        }
        Ok(grown)
    }

    /// Whether `[offset, end)` repeats a slice already received.
    ///
    /// Any other overlap is a protocol violation.
    fn is_duplicate(&self, offset: u64, end: u64, data: &[u8]) -> Result<bool, HeapOverflow> {
        let Some((&start, &stop)) = self.ranges.range(..end).next_back() else {
            return Ok(false);
        };
        if stop <= offset {
            return Ok(false);
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "received ranges lie within the in-memory payload"
        )]
        let same = start == offset && stop == end && self.payload[start as usize..stop as usize] == *data;
        if same {
            return Ok(true);
        }
        Err(Violation::Overlap { offset }.into())
    }

    fn is_complete(&self) -> bool { self.heap_length == Some(self.received) }

    /// End of the contiguous run of received bytes starting at `from`.
    fn contiguous_end(&self, from: u64) -> u64 {
        let Some((_, &stop)) = self.ranges.range(..=from).next_back() else {
            return from;
        };
        if stop <= from {
            return from;
        }
        let mut end = stop;
        while let Some(&next) = self.ranges.get(&end) {
            end = next;
        }
        end
    }

    /// Register every descriptor whose bytes are now contiguous.
    fn register_descriptors(&mut self, heap_cnt: HeapCnt, registry: &DescriptorRegistry) {
        let pending: Vec<u64> = self
            .pointers
            .iter()
            .filter_map(|pointer| match pointer {
                ItemPointer::Address {
                    id: item_id::DESCRIPTOR,
                    offset,
                } if !self.registered.contains(offset) => Some(*offset),
                _ => None,
            })
            .collect();
        for offset in pending {
            let available = self.contiguous_end(offset);
            if available == offset {
                continue;
            }
            #[expect(
                clippy::cast_possible_truncation,
                reason = "received ranges lie within the in-memory payload"
            )]
            let bytes = &self.payload[offset as usize..available as usize];
            let Some(len) = encoded_len(bytes) else {
                continue;
            };
            if len > bytes.len() {
                continue;
            }
            self.registered.insert(offset);
            register(heap_cnt, &bytes[..len], registry);
        }
    }

    fn freeze(self, heap_cnt: HeapCnt, registry: &DescriptorRegistry) -> Heap {
        let length = self.heap_length.unwrap_or(self.received);
        let mut heap = Heap::new(heap_cnt, self.flavour, length);
        let payload = Bytes::from(self.payload);
        let offsets: Vec<u64> = self
            .pointers
            .iter()
            .filter_map(|pointer| match pointer {
                ItemPointer::Address { offset, .. } => Some(*offset),
                ItemPointer::Immediate { .. } => None,
            })
            .collect();
        let mut extents = address_extents(&offsets, length).into_iter();
        #[expect(
            clippy::cast_possible_truncation,
            reason = "extents are bounded by the in-memory payload"
        )]
        let slices: Vec<Option<Bytes>> = self
            .pointers
            .iter()
            .map(|pointer| match pointer {
                ItemPointer::Address { .. } => extents
                    .next()
                    .filter(|extent| extent.start <= extent.end)
                    .map(|extent| payload.slice(extent.start as usize..extent.end as usize)),
                ItemPointer::Immediate { .. } => None,
            })
            .collect();

        for (pointer, raw) in self.pointers.iter().zip(&slices) {
            if let (
                ItemPointer::Address {
                    id: item_id::DESCRIPTOR,
                    offset,
                },
                Some(raw),
            ) = (*pointer, raw)
            {
                let descriptor = if self.registered.contains(&offset) {
                    Descriptor::from_raw(raw).ok()
                } else {
                    register(heap_cnt, raw, registry)
                };
                if let Some(descriptor) = descriptor.and_then(|d| registry.lookup(d.id())) {
                    heap.push_descriptor(descriptor);
                }
            }
        }

        for (pointer, data) in self.pointers.iter().zip(slices) {
            let id = pointer.id();
            match *pointer {
                ItemPointer::Immediate {
                    id: item_id::STREAM_CTRL,
                    value,
                } => match value {
                    item_id::CTRL_STREAM_START => heap.set_start_of_stream(),
                    item_id::CTRL_STREAM_STOP => heap.set_end_of_stream(),
                    other => debug!(heap_cnt = %heap_cnt, value = other, "unknown stream control"),
                },
                _ if id.is_reserved() => {}
                ItemPointer::Immediate { value, .. } => heap.push_item(Item::from_immediate(
                    id,
                    value,
                    self.flavour,
                    format_of(id, registry),
                )),
                ItemPointer::Address { .. } => match data {
                    Some(data) => heap.push_item(Item::from_bytes(id, data, format_of(id, registry))),
                    None => debug!(heap_cnt = %heap_cnt, item_id = %id, "item beyond heap end"),
                },
            }
        }
        heap
    }
}

fn register(heap_cnt: HeapCnt, raw: &[u8], registry: &DescriptorRegistry) -> Option<Descriptor> {
    match Descriptor::from_raw(raw) {
        Ok(descriptor) => {
            let registration = registry.register(descriptor.clone());
            debug!(
                heap_cnt = %heap_cnt,
                item_id = %descriptor.id(),
                ?registration,
                "descriptor registered"
            );
            Some(descriptor)
        }
        Err(error) => {
            warn!(heap_cnt = %heap_cnt, %error, "skipping undecodable descriptor");
            None
        }
    }
}

fn format_of(id: ItemId, registry: &DescriptorRegistry) -> ItemFormat {
    registry
        .lookup(id)
        .map_or(ItemFormat::Unknown, ItemFormat::Known)
}

/// Tracks partial heaps and emits completed or abandoned ones.
///
/// Time-dependent operations have `_at` variants taking an explicit clock
/// reading for deterministic tests.
///
/// # Examples
///
/// ```
/// use heapwire::{
///     Flavour,
///     HeapBuilder,
///     HeapCnt,
///     ItemId,
///     descriptor::DescriptorRegistry,
///     packet::{PacketEncoder, decode_packet},
///     recv::{HeapAssembler, HeapEvent, ReceiveConfig},
/// };
///
/// let mut builder = HeapBuilder::new();
/// builder
///     .add_item(ItemId::new(0x1000), vec![1, 2, 3])
///     .expect("fresh id");
/// let encoder = PacketEncoder::new(Flavour::default(), 1472).expect("valid size");
/// let packets = encoder
///     .encode(&builder.build(), HeapCnt::new(1))
///     .expect("heap fits");
///
/// let mut assembler = HeapAssembler::new(&ReceiveConfig::default(), DescriptorRegistry::new());
/// let events: Vec<_> = packets
///     .flat_map(|raw| assembler.add_packet(&decode_packet(&raw).expect("valid packet")))
///     .collect();
/// let [HeapEvent::Heap(heap)] = events.as_slice() else {
///     panic!("expected one heap, got {events:?}");
/// };
/// assert_eq!(heap.item(ItemId::new(0x1000)).map(|item| item.len()), Some(3));
/// ```
#[derive(Debug)]
pub struct HeapAssembler {
    limits: Limits,
    registry: DescriptorRegistry,
    live: HashMap<HeapCnt, LiveHeap>,
    finished: VecDeque<HeapCnt>,
    seq: u64,
    buffered: u64,
}

impl HeapAssembler {
    /// Create an assembler bounded by `config`, registering descriptors into
    /// `registry`.
    #[must_use]
    pub fn new(config: &ReceiveConfig, registry: DescriptorRegistry) -> Self {
        Self {
            limits: Limits {
                max_heap_size: config.max_heap_size(),
                max_in_flight_bytes: config.max_in_flight_bytes(),
                max_live_heaps: config.max_live_heaps(),
                max_packet_gap: config.max_packet_gap(),
                heap_timeout: config.heap_timeout(),
            },
            registry,
            live: HashMap::new(),
            finished: VecDeque::with_capacity(FINISHED_HISTORY),
            seq: 0,
            buffered: 0,
        }
    }

    /// Registry descriptors are recorded into.
    #[must_use]
    pub fn registry(&self) -> &DescriptorRegistry { &self.registry }

    /// Number of partial heaps.
    #[must_use]
    pub fn live_heaps(&self) -> usize { self.live.len() }

    /// Reassembly buffer bytes held across partial heaps, including gaps
    /// not yet filled.
    #[must_use]
    pub fn buffered_bytes(&self) -> u64 { self.buffered }

    /// Merge one decoded packet.
    ///
    /// Returns the heaps completed or abandoned as a consequence, in the
    /// order they were resolved.
    pub fn add_packet(&mut self, packet: &Packet<'_>) -> Vec<HeapEvent> {
        self.add_packet_at(packet, Instant::now())
    }

    /// Merge one decoded packet using an explicit clock reading.
    pub fn add_packet_at(&mut self, packet: &Packet<'_>, now: Instant) -> Vec<HeapEvent> {
        let mut events = self.purge_expired_at(now);
        self.seq += 1;
        let heap_cnt = packet.heap_cnt();
        crate::metrics::inc_packets();

        if self.finished.contains(&heap_cnt) {
            debug!(heap_cnt = %heap_cnt, "ignoring packet for finished heap");
            return events;
        }
        self.abandon_stale(heap_cnt, &mut events);

        let mut live = match self.live.remove(&heap_cnt) {
            Some(live) => live,
            None => {
                self.evict_for_new(&mut events);
                LiveHeap::new(packet.flavour(), now, self.seq)
            }
        };
        live.last_packet = self.seq;

        match live.accept(packet, &self.limits, self.buffered) {
            Ok(added) => self.buffered += added,
            Err(reason) => {
                self.buffered -= live.allocated();
                self.abandon(heap_cnt, &live, reason, &mut events);
                return events;
            }
        }

        live.register_descriptors(heap_cnt, &self.registry);
        if !live.is_complete() {
            self.live.insert(heap_cnt, live);
            return events;
        }
        self.buffered -= live.allocated();
        self.remember(heap_cnt);
        let heap = live.freeze(heap_cnt, &self.registry);
        debug!(heap_cnt = %heap_cnt, length = heap.length(), "heap complete");
        crate::metrics::inc_heaps_completed();
        events.push(HeapEvent::Heap(heap));
        events
    }

    /// Abandon partial heaps older than the configured timeout.
    pub fn purge_expired(&mut self) -> Vec<HeapEvent> { self.purge_expired_at(Instant::now()) }

    /// Abandon expired heaps using an explicit clock reading.
    pub fn purge_expired_at(&mut self, now: Instant) -> Vec<HeapEvent> {
        let timeout = self.limits.heap_timeout;
        let expired: Vec<HeapCnt> = self
            .oldest_first()
            .into_iter()
            .filter(|cnt| {
                self.live.get(cnt).is_some_and(|live| {
                    now.saturating_duration_since(live.started_at) >= timeout
                })
            })
            .collect();
        let mut events = Vec::new();
        for cnt in expired {
            self.remove_and_abandon(cnt, HeapOverflow::Expired, &mut events);
        }
        events
    }

    /// Abandon one partial heap on request.
    ///
    /// The identifier may be reused by later packets. Returns `None` when
    /// no such heap is live.
    pub fn discard(&mut self, heap_cnt: HeapCnt) -> Option<LostHeap> {
        let live = self.live.remove(&heap_cnt)?;
        self.buffered -= live.allocated();
        let lost = live.lost(heap_cnt, HeapOverflow::Discarded);
        report(&lost);
        Some(lost)
    }

    /// Abandon every partial heap, oldest first. Used at stream stop.
    pub fn flush(&mut self) -> Vec<LostHeap> {
        let mut events = Vec::new();
        for cnt in self.oldest_first() {
            self.remove_and_abandon(cnt, HeapOverflow::Flushed, &mut events);
        }
        events
            .into_iter()
            .filter_map(|event| match event {
                HeapEvent::Lost(lost) => Some(lost),
                HeapEvent::Heap(_) => None,
            })
            .collect()
    }

    fn oldest_first(&self) -> Vec<HeapCnt> {
        let mut order: Vec<_> = self
            .live
            .iter()
            .map(|(cnt, live)| (live.first_packet, *cnt))
            .collect();
        order.sort_unstable();
        order.into_iter().map(|(_, cnt)| cnt).collect()
    }

    fn abandon_stale(&mut self, current: HeapCnt, events: &mut Vec<HeapEvent>) {
        let max_gap = self.limits.max_packet_gap;
        let seq = self.seq;
        let stale: Vec<(HeapCnt, u64)> = self
            .oldest_first()
            .into_iter()
            .filter(|cnt| *cnt != current)
            .filter_map(|cnt| {
                let gap = seq - self.live.get(&cnt)?.last_packet;
                (gap > max_gap).then_some((cnt, gap))
            })
            .collect();
        for (cnt, gap) in stale {
            self.remove_and_abandon(cnt, HeapOverflow::Stale { gap }, events);
        }
    }

    fn evict_for_new(&mut self, events: &mut Vec<HeapEvent>) {
        while self.live.len() >= self.limits.max_live_heaps {
            let Some(oldest) = self.oldest_first().into_iter().next() else {
                break;
            };
            self.remove_and_abandon(oldest, HeapOverflow::Evicted, events);
        }
    }

    fn remove_and_abandon(
        &mut self,
        heap_cnt: HeapCnt,
        reason: HeapOverflow,
        events: &mut Vec<HeapEvent>,
    ) {
        if let Some(live) = self.live.remove(&heap_cnt) {
            self.buffered -= live.allocated();
            self.abandon(heap_cnt, &live, reason, events);
        }
    }

    /// Report a heap that has already been removed from the live set.
    fn abandon(
        &mut self,
        heap_cnt: HeapCnt,
        live: &LiveHeap,
        reason: HeapOverflow,
        events: &mut Vec<HeapEvent>,
    ) {
        self.remember(heap_cnt);
        let lost = live.lost(heap_cnt, reason);
        report(&lost);
        events.push(HeapEvent::Lost(lost));
    }

    fn remember(&mut self, heap_cnt: HeapCnt) {
        if self.finished.len() == FINISHED_HISTORY {
            self.finished.pop_front();
        }
        self.finished.push_back(heap_cnt);
    }
}

fn report(lost: &LostHeap) {
    warn!(
        heap_cnt = %lost.heap_cnt,
        reason = %lost.reason,
        received_bytes = lost.received_bytes,
        heap_length = ?lost.heap_length,
        "heap abandoned"
    );
    crate::metrics::inc_heaps_lost(lost.reason.as_str());
}

// Frozen heaps share descriptors with the registry.
static_assertions::assert_impl_all!(Heap: Send, Sync);
static_assertions::assert_impl_all!(Arc<Descriptor>: Send, Sync);
