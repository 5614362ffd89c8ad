//! Canned heaps and packet helpers.

use bytes::Bytes;
use heapwire::{
    Descriptor,
    Flavour,
    FormatField,
    HeapBuilder,
    HeapCnt,
    ItemId,
    SendHeap,
    packet::PacketEncoder,
};

/// Item id of the canned "first integer" item.
pub const FIRST_INTEGER: ItemId = ItemId::new(0x1000);

/// A heap carrying one big-endian `i32` item and its descriptor.
#[must_use]
pub fn first_integer_heap(value: u32) -> SendHeap {
    let mut builder = HeapBuilder::new();
    builder
        .add_descriptor(
            Descriptor::new(FIRST_INTEGER, "first integer")
                .with_description("an integer sent by the test")
                .with_format(vec![FormatField::new('i', 32)]),
        )
        .add_item(FIRST_INTEGER, value.to_be_bytes().to_vec())
        .expect("first integer id is free");
    builder.build()
}

/// Encode `heap` with the default flavour into packets of at most
/// `max_packet_size` bytes.
///
/// # Panics
///
/// Panics if the heap cannot be encoded.
#[must_use]
pub fn encode_heap(heap: &SendHeap, heap_cnt: u64, max_packet_size: usize) -> Vec<Bytes> {
    PacketEncoder::new(Flavour::default(), max_packet_size)
        .expect("packet size must cover the header")
        .encode(heap, HeapCnt::new(heap_cnt))
        .expect("heap must fit the default flavour")
        .collect()
}
