//! Item pointers: the per-item entries of a packet header.

use super::ItemId;
use crate::flavour::Flavour;

const IMMEDIATE_FLAG: u64 = 1 << 63;

/// Reference to an item's data from a packet header.
///
/// Immediate pointers embed the value directly; address pointers locate the
/// item's first byte within the heap payload. The item's length is implied
/// by the next greater address (or the heap length) and is resolved by the
/// assembler once the heap is complete.
///
/// # Examples
///
/// ```
/// use heapwire::{Flavour, ItemId, packet::ItemPointer};
///
/// let flavour = Flavour::default();
/// let pointer = ItemPointer::Immediate {
///     id: ItemId::new(0x1000),
///     value: 42,
/// };
/// let raw = pointer.to_raw(flavour);
/// assert_eq!(ItemPointer::from_raw(raw, flavour), pointer);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemPointer {
    /// Value carried inline in the pointer.
    Immediate {
        /// Item identifier.
        id: ItemId,
        /// Inline value, at most `heap_address_bits` wide.
        value: u64,
    },
    /// Value stored in the heap payload starting at `offset`.
    Address {
        /// Item identifier.
        id: ItemId,
        /// Byte offset of the item within the heap payload.
        offset: u64,
    },
}

impl ItemPointer {
    /// Identifier of the referenced item.
    #[must_use]
    pub const fn id(&self) -> ItemId {
        match self {
            Self::Immediate { id, .. } | Self::Address { id, .. } => *id,
        }
    }

    /// Report whether the pointer carries its value inline.
    #[must_use]
    pub const fn is_immediate(&self) -> bool { matches!(self, Self::Immediate { .. }) }

    /// Split a raw 64-bit pointer according to `flavour`.
    #[must_use]
    pub fn from_raw(raw: u64, flavour: Flavour) -> Self {
        let address_bits = flavour.heap_address_bits();
        let id = ItemId::new((raw >> address_bits) & flavour.max_item_id());
        let low = raw & flavour.max_address();
        if raw & IMMEDIATE_FLAG == 0 {
            Self::Address { id, offset: low }
        } else {
            Self::Immediate { id, value: low }
        }
    }

    /// Pack the pointer into its raw 64-bit form.
    ///
    /// Identifier and value bits beyond the flavour's widths are masked off;
    /// callers validate ranges before encoding.
    #[must_use]
    pub fn to_raw(self, flavour: Flavour) -> u64 {
        let (flag, id, low) = match self {
            Self::Immediate { id, value } => (IMMEDIATE_FLAG, id, value),
            Self::Address { id, offset } => (0, id, offset),
        };
        flag | ((id.get() & flavour.max_item_id()) << flavour.heap_address_bits())
            | (low & flavour.max_address())
    }
}
