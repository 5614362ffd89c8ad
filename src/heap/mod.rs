//! Heap values on both sides of the wire.
//!
//! Outbound heaps are assembled with [`HeapBuilder`] into an immutable
//! [`SendHeap`]. Inbound heaps are produced by the assembler as frozen
//! [`Heap`] values whose items are tagged with the descriptor known at
//! completion time.

pub mod builder;
pub mod error;

use std::sync::Arc;

use bytes::Bytes;

pub use builder::HeapBuilder;
pub use error::BuildError;

use crate::{
    byte_order::write_network_uint,
    descriptor::Descriptor,
    flavour::Flavour,
    packet::{HeapCnt, ItemId},
};

/// Data of an outbound item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemValue {
    /// Small value carried inline in the item pointer.
    Immediate(u64),
    /// Byte region carried in the heap payload.
    Bytes(Bytes),
}

impl ItemValue {
    /// Build an immediate value.
    #[must_use]
    pub const fn immediate(value: u64) -> Self { Self::Immediate(value) }
}

impl From<Bytes> for ItemValue {
    fn from(value: Bytes) -> Self { Self::Bytes(value) }
}

impl From<Vec<u8>> for ItemValue {
    fn from(value: Vec<u8>) -> Self { Self::Bytes(Bytes::from(value)) }
}

impl From<&'static [u8]> for ItemValue {
    fn from(value: &'static [u8]) -> Self { Self::Bytes(Bytes::from_static(value)) }
}

impl From<&'static str> for ItemValue {
    fn from(value: &'static str) -> Self { Self::Bytes(Bytes::from_static(value.as_bytes())) }
}

/// One item of an outbound heap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendItem {
    id: ItemId,
    value: ItemValue,
}

impl SendItem {
    const fn new(id: ItemId, value: ItemValue) -> Self { Self { id, value } }

    /// Item identifier.
    #[must_use]
    pub const fn id(&self) -> ItemId { self.id }

    /// Item data.
    #[must_use]
    pub const fn value(&self) -> &ItemValue { &self.value }
}

/// Immutable outbound heap produced by [`HeapBuilder::build`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendHeap {
    items: Vec<SendItem>,
    descriptors: Vec<Descriptor>,
    start: bool,
    end: bool,
}

impl SendHeap {
    /// Items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[SendItem] { &self.items }

    /// Descriptors carried explicitly by this heap.
    #[must_use]
    pub fn descriptors(&self) -> &[Descriptor] { &self.descriptors }

    /// Whether the heap announces the start of a stream.
    #[must_use]
    pub const fn is_start(&self) -> bool { self.start }

    /// Whether the heap terminates the stream.
    #[must_use]
    pub const fn is_end(&self) -> bool { self.end }

    /// Convenience constructor for a bare end-of-stream heap.
    #[must_use]
    pub fn end_of_stream() -> Self {
        Self {
            end: true,
            ..Self::default()
        }
    }
}

/// How an inbound item's bytes should be interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemFormat {
    /// The registry held a descriptor for the item when the heap completed.
    Known(Arc<Descriptor>),
    /// No descriptor was known; the raw bytes are retained as-is.
    Unknown,
}

/// One item of a received heap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    id: ItemId,
    data: Bytes,
    immediate: Option<u64>,
    format: ItemFormat,
}

impl Item {
    pub(crate) fn from_bytes(id: ItemId, data: Bytes, format: ItemFormat) -> Self {
        Self {
            id,
            data,
            immediate: None,
            format,
        }
    }

    /// Immediate items expose their value as big-endian bytes of the
    /// flavour's address width.
    pub(crate) fn from_immediate(
        id: ItemId,
        value: u64,
        flavour: Flavour,
        format: ItemFormat,
    ) -> Self {
        Self {
            id,
            data: Bytes::from(write_network_uint(value, flavour.heap_address_bytes())),
            immediate: Some(value),
            format,
        }
    }

    /// Item identifier.
    #[must_use]
    pub const fn id(&self) -> ItemId { self.id }

    /// Item bytes.
    #[must_use]
    pub const fn data(&self) -> &Bytes { &self.data }

    /// Item length in bytes.
    #[must_use]
    pub fn len(&self) -> usize { self.data.len() }

    /// Whether the item carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Inline value, for items received in immediate mode.
    #[must_use]
    pub const fn immediate(&self) -> Option<u64> { self.immediate }

    /// Format tag resolved at heap completion.
    #[must_use]
    pub const fn format(&self) -> &ItemFormat { &self.format }

    /// Descriptor resolved at heap completion, if any.
    #[must_use]
    pub fn descriptor(&self) -> Option<&Arc<Descriptor>> {
        match &self.format {
            ItemFormat::Known(descriptor) => Some(descriptor),
            ItemFormat::Unknown => None,
        }
    }
}

/// A complete, frozen heap delivered to the consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heap {
    cnt: HeapCnt,
    flavour: Flavour,
    length: u64,
    items: Vec<Item>,
    descriptors: Vec<Arc<Descriptor>>,
    start_of_stream: bool,
    end_of_stream: bool,
}

impl Heap {
    pub(crate) fn new(cnt: HeapCnt, flavour: Flavour, length: u64) -> Self {
        Self {
            cnt,
            flavour,
            length,
            items: Vec::new(),
            descriptors: Vec::new(),
            start_of_stream: false,
            end_of_stream: false,
        }
    }

    pub(crate) fn push_item(&mut self, item: Item) { self.items.push(item); }

    pub(crate) fn push_descriptor(&mut self, descriptor: Arc<Descriptor>) {
        self.descriptors.push(descriptor);
    }

    pub(crate) fn set_start_of_stream(&mut self) { self.start_of_stream = true; }

    pub(crate) fn set_end_of_stream(&mut self) { self.end_of_stream = true; }

    /// Heap identifier.
    #[must_use]
    pub const fn cnt(&self) -> HeapCnt { self.cnt }

    /// Flavour the heap was received with.
    #[must_use]
    pub const fn flavour(&self) -> Flavour { self.flavour }

    /// Total payload length in bytes.
    #[must_use]
    pub const fn length(&self) -> u64 { self.length }

    /// Data items in wire order. Control and descriptor items are excluded.
    #[must_use]
    pub fn items(&self) -> &[Item] { &self.items }

    /// Look up an item by identifier.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&Item> { self.items.iter().find(|item| item.id == id) }

    /// Descriptors carried explicitly in this heap.
    #[must_use]
    pub fn descriptors(&self) -> &[Arc<Descriptor>] { &self.descriptors }

    /// Whether the heap announced the start of the stream.
    #[must_use]
    pub const fn is_start_of_stream(&self) -> bool { self.start_of_stream }

    /// Whether the heap terminated the stream.
    #[must_use]
    pub const fn is_end_of_stream(&self) -> bool { self.end_of_stream }
}
