//! Outbound helper that slices heaps into packets.
//!
//! [`PacketEncoder`] lays a [`SendHeap`] out as one contiguous payload
//! (descriptors first, then items in insertion order) and produces a lazy
//! [`Packets`] iterator over datagrams no larger than the configured maximum.
//! Every packet repeats the heap counter, heap size, payload offset and
//! payload length so receivers can place it regardless of arrival order.

use bytes::{BufMut, Bytes, BytesMut};

use super::{
    CONTROL_POINTERS,
    EncodeError,
    HEADER_SIZE,
    HeapCnt,
    ITEM_POINTER_SIZE,
    ItemId,
    ItemPointer,
    MAGIC,
    VERSION,
    item_id,
};
use crate::{
    byte_order::{write_network_u16, write_network_u64},
    flavour::Flavour,
    heap::{ItemValue, SendHeap},
};

/// Smallest packet that can carry the fixed header, the control pointers and
/// one payload byte.
pub const MIN_PACKET_SIZE: usize = HEADER_SIZE + CONTROL_POINTERS * ITEM_POINTER_SIZE + 1;

/// Splits heaps into packets of bounded size.
///
/// # Examples
///
/// ```
/// use heapwire::{Flavour, HeapBuilder, HeapCnt, ItemId, packet::PacketEncoder};
///
/// let encoder = PacketEncoder::new(Flavour::default(), 1472).expect("valid size");
/// let mut builder = HeapBuilder::new();
/// builder
///     .add_item(ItemId::new(0x1000), vec![0xDE, 0xAD, 0xBE, 0xEF])
///     .expect("fresh id");
/// let heap = builder.build();
/// let packets: Vec<_> = encoder
///     .encode(&heap, HeapCnt::new(1))
///     .expect("heap fits")
///     .collect();
/// assert_eq!(packets.len(), 1);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct PacketEncoder {
    flavour: Flavour,
    max_packet_size: usize,
}

impl PacketEncoder {
    /// Create an encoder producing packets of at most `max_packet_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::PacketTooSmall`] when the size is below
    /// [`MIN_PACKET_SIZE`].
    pub const fn new(flavour: Flavour, max_packet_size: usize) -> Result<Self, EncodeError> {
        if max_packet_size < MIN_PACKET_SIZE {
            return Err(EncodeError::PacketTooSmall {
                size: max_packet_size,
                minimum: MIN_PACKET_SIZE,
            });
        }
        Ok(Self {
            flavour,
            max_packet_size,
        })
    }

    /// Flavour used for item pointers.
    #[must_use]
    pub const fn flavour(&self) -> Flavour { self.flavour }

    /// Upper bound on the size of each produced packet.
    #[must_use]
    pub const fn max_packet_size(&self) -> usize { self.max_packet_size }

    /// Lay out `heap` under `heap_cnt` and return its packets.
    ///
    /// Validation happens eagerly; the packets themselves are built lazily as
    /// the iterator advances. The iterator is `Clone`, so a sequence can be
    /// replayed from any point.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] when an identifier, immediate value, heap size
    /// or heap counter does not fit the flavour, or when the item pointers do
    /// not fit in the first packet.
    pub fn encode(&self, heap: &SendHeap, heap_cnt: HeapCnt) -> Result<Packets, EncodeError> {
        let flavour = self.flavour;
        if heap_cnt.get() > flavour.max_address() {
            return Err(EncodeError::HeapCntTooLarge(heap_cnt));
        }

        let mut layout = Layout::default();
        if heap.is_start() {
            layout.push_immediate(item_id::STREAM_CTRL, item_id::CTRL_STREAM_START);
        }
        for descriptor in heap.descriptors() {
            let raw = descriptor
                .to_raw(flavour)
                .map_err(|_| EncodeError::Descriptor(descriptor.id()))?;
            layout.push_address(item_id::DESCRIPTOR, raw);
        }
        for item in heap.items() {
            let id = item.id();
            if id.get() > flavour.max_item_id() {
                return Err(EncodeError::ItemIdTooLarge {
                    id,
                    max: flavour.max_item_id(),
                });
            }
            match item.value() {
                ItemValue::Immediate(value) => {
                    if *value > flavour.max_address() {
                        return Err(EncodeError::ImmediateTooLarge {
                            id,
                            max: flavour.max_address(),
                        });
                    }
                    layout.push_immediate(id, *value);
                }
                ItemValue::Bytes(data) => layout.push_address(id, data.clone()),
            }
        }
        if heap.is_end() {
            layout.push_immediate(item_id::STREAM_CTRL, item_id::CTRL_STREAM_STOP);
        }

        if layout.size > flavour.max_address() {
            return Err(EncodeError::HeapTooLarge {
                size: layout.size,
                max: flavour.max_address(),
            });
        }
        let reserve = usize::from(layout.size > 0);
        let max_pointers = (self.max_packet_size - fixed_overhead() - reserve) / ITEM_POINTER_SIZE;
        let max_pointers = max_pointers.min(usize::from(u16::MAX) - CONTROL_POINTERS);
        if layout.pointers.len() > max_pointers {
            return Err(EncodeError::TooManyItemPointers {
                count: layout.pointers.len(),
                max: max_pointers,
            });
        }

        Ok(Packets {
            flavour,
            max_packet_size: self.max_packet_size,
            heap_cnt,
            heap_size: layout.size,
            pointers: layout.pointers,
            segments: layout.segments,
            next_offset: 0,
            first: true,
            done: false,
        })
    }
}

#[derive(Debug, Default)]
struct Layout {
    pointers: Vec<ItemPointer>,
    segments: Vec<Segment>,
    size: u64,
}

impl Layout {
    fn push_immediate(&mut self, id: ItemId, value: u64) {
        self.pointers.push(ItemPointer::Immediate { id, value });
    }

    fn push_address(&mut self, id: ItemId, data: Bytes) {
        let start = self.size;
        self.pointers.push(ItemPointer::Address { id, offset: start });
        self.size = start.saturating_add(data.len() as u64);
        if !data.is_empty() {
            self.segments.push(Segment { start, data });
        }
    }
}

#[derive(Clone, Debug)]
struct Segment {
    start: u64,
    data: Bytes,
}

impl Segment {
    fn end(&self) -> u64 { self.start + self.data.len() as u64 }
}

/// Lazy, restartable sequence of encoded packets for one heap.
///
/// The first packet carries every item pointer; each packet carries a
/// contiguous slice of the heap payload. A boundary never splits an item
/// that would fit whole in a fresh packet: the current packet ends early and
/// the item starts the next one. Items larger than a packet are split.
#[derive(Clone, Debug)]
pub struct Packets {
    flavour: Flavour,
    max_packet_size: usize,
    heap_cnt: HeapCnt,
    heap_size: u64,
    pointers: Vec<ItemPointer>,
    segments: Vec<Segment>,
    next_offset: u64,
    first: bool,
    done: bool,
}

impl Packets {
    /// Heap counter stamped on every packet.
    #[must_use]
    pub const fn heap_cnt(&self) -> HeapCnt { self.heap_cnt }

    /// Total heap payload length.
    #[must_use]
    pub const fn heap_size(&self) -> u64 { self.heap_size }

    fn capacity(&self, first: bool) -> u64 {
        let pointers = if first { self.pointers.len() } else { 0 };
        (self.max_packet_size - fixed_overhead() - pointers * ITEM_POINTER_SIZE) as u64
    }

    fn boundary(&self, start: u64, capacity: u64) -> u64 {
        let limit = start.saturating_add(capacity).min(self.heap_size);
        if limit == self.heap_size {
            return limit;
        }
        let fresh = self.capacity(false);
        let idx = self.segments.partition_point(|segment| segment.start < limit);
        match idx.checked_sub(1).map(|i| &self.segments[i]) {
            Some(segment)
                if segment.end() > limit
                    && segment.start > start
                    && segment.data.len() as u64 <= fresh =>
            {
                segment.start
            }
            _ => limit,
        }
    }

    fn build(&self, start: u64, end: u64, first: bool) -> Bytes {
        let pointers: &[ItemPointer] = if first { &self.pointers } else { &[] };
        let count = CONTROL_POINTERS + pointers.len();
        let payload_len = end - start;
        let mut buf = BytesMut::with_capacity(
            HEADER_SIZE + count * ITEM_POINTER_SIZE + usize::try_from(payload_len).unwrap_or(0),
        );
        put_header(&mut buf, self.flavour, count);
        let control = [
            (item_id::HEAP_CNT, self.heap_cnt.get()),
            (item_id::HEAP_SIZE, self.heap_size),
            (item_id::HEAP_OFFSET, start),
            (item_id::PAYLOAD_LENGTH, payload_len),
        ];
        for (id, value) in control {
            put_pointer(&mut buf, ItemPointer::Immediate { id, value }, self.flavour);
        }
        for pointer in pointers {
            put_pointer(&mut buf, *pointer, self.flavour);
        }

        let first_segment = self.segments.partition_point(|segment| segment.end() <= start);
        for segment in &self.segments[first_segment..] {
            if segment.start >= end {
                break;
            }
            let from = start.max(segment.start) - segment.start;
            let to = end.min(segment.end()) - segment.start;
            #[expect(
                clippy::cast_possible_truncation,
                reason = "segment offsets are bounded by the in-memory segment length"
            )]
            buf.put_slice(&segment.data[from as usize..to as usize]);
        }
        buf.freeze()
    }
}

impl Iterator for Packets {
    type Item = Bytes;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let start = self.next_offset;
        let end = self.boundary(start, self.capacity(self.first));
        let packet = self.build(start, end, self.first);
        self.next_offset = end;
        self.first = false;
        self.done = end >= self.heap_size;
        Some(packet)
    }
}

impl std::iter::FusedIterator for Packets {}

const fn fixed_overhead() -> usize { HEADER_SIZE + CONTROL_POINTERS * ITEM_POINTER_SIZE }

/// Write the eight-byte packet header announcing `count` item pointers.
pub(crate) fn put_header(buf: &mut BytesMut, flavour: Flavour, count: usize) {
    buf.put_u8(MAGIC);
    buf.put_u8(VERSION);
    buf.put_u8(flavour.item_pointer_width_byte());
    buf.put_u8(flavour.heap_address_width_byte());
    buf.put_slice(&[0, 0]);
    let count = u16::try_from(count).unwrap_or(u16::MAX);
    buf.put_slice(&write_network_u16(count));
}

/// Write one item pointer in network byte order.
pub(crate) fn put_pointer(buf: &mut BytesMut, pointer: ItemPointer, flavour: Flavour) {
    buf.put_slice(&write_network_u64(pointer.to_raw(flavour)));
}
