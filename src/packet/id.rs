//! Identifier newtypes for items and heaps.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Identifier of an item within a stream.
///
/// Descriptors share the identifier of the item they describe.
///
/// # Examples
///
/// ```
/// use heapwire::ItemId;
/// let id = ItemId::new(0x1000);
/// assert_eq!(id.get(), 0x1000);
/// assert_eq!(id.to_string(), "0x1000");
/// ```
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into, Serialize, Deserialize,
)]
#[display("{_0:#x}")]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    /// Create a new identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self { Self(value) }

    /// Return the inner numeric identifier.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }

    /// Report whether the identifier belongs to the protocol's reserved range.
    ///
    /// Reserved identifiers carry control semantics (heap counters, offsets,
    /// descriptors, stream control) and cannot be used for application items.
    #[must_use]
    pub const fn is_reserved(self) -> bool { self.0 <= item_id::LAST_RESERVED.0 }
}

/// Identifier of a heap, monotonic per sender and scoped to one stream.
///
/// # Examples
///
/// ```
/// use heapwire::HeapCnt;
/// let cnt = HeapCnt::new(7);
/// assert_eq!(cnt.get(), 7);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into)]
#[display("{_0}")]
pub struct HeapCnt(u64);

impl HeapCnt {
    /// Create a new heap counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self { Self(value) }

    /// Return the underlying numeric value.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

/// Identifiers reserved by the protocol.
pub mod item_id {
    use super::ItemId;

    /// Padding pointer; ignored by receivers.
    pub const NULL: ItemId = ItemId(0x00);
    /// Heap counter (heap identifier).
    pub const HEAP_CNT: ItemId = ItemId(0x01);
    /// Total payload length of the heap.
    pub const HEAP_SIZE: ItemId = ItemId(0x02);
    /// Offset of this packet's payload within the heap.
    pub const HEAP_OFFSET: ItemId = ItemId(0x03);
    /// Number of payload bytes in this packet.
    pub const PAYLOAD_LENGTH: ItemId = ItemId(0x04);
    /// An encoded descriptor.
    pub const DESCRIPTOR: ItemId = ItemId(0x05);
    /// Stream start/stop control.
    pub const STREAM_CTRL: ItemId = ItemId(0x06);
    /// Descriptor field: name.
    pub const DESCRIPTOR_NAME: ItemId = ItemId(0x10);
    /// Descriptor field: description.
    pub const DESCRIPTOR_DESCRIPTION: ItemId = ItemId(0x11);
    /// Descriptor field: shape.
    pub const DESCRIPTOR_SHAPE: ItemId = ItemId(0x12);
    /// Descriptor field: format.
    pub const DESCRIPTOR_FORMAT: ItemId = ItemId(0x13);
    /// Descriptor field: described item id.
    pub const DESCRIPTOR_ID: ItemId = ItemId(0x14);
    /// Descriptor field: numpy-style dtype header.
    pub const DESCRIPTOR_DTYPE: ItemId = ItemId(0x15);

    pub(crate) const LAST_RESERVED: ItemId = DESCRIPTOR_DTYPE;

    /// `STREAM_CTRL` value announcing the start of a stream.
    pub const CTRL_STREAM_START: u64 = 0;
    /// `STREAM_CTRL` value announcing the end of a stream.
    pub const CTRL_STREAM_STOP: u64 = 2;
}
