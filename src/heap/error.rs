//! Errors raised while building outbound heaps.

use thiserror::Error;

use crate::packet::ItemId;

/// Misuse of [`HeapBuilder`](super::HeapBuilder) or a send-side
/// [`ItemGroup`](crate::send::ItemGroup), rejected synchronously.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// The heap already holds an item with this identifier.
    #[error("item id {0} already present in this heap")]
    DuplicateItemId(ItemId),
    /// The identifier is reserved for protocol control items.
    #[error("item id {0} is reserved by the protocol")]
    ReservedItemId(ItemId),
    /// Items cannot be added after the heap was marked as end-of-stream.
    #[error("heap already marked as end of stream")]
    HeapEnded,
    /// An item group has no item with this identifier.
    #[error("item id {0} is not part of the item group")]
    UnknownItemId(ItemId),
    /// A value's length disagrees with the size its descriptor implies.
    #[error("item id {id} expects {expected} bytes, got {actual}")]
    ValueSize {
        /// Item whose value was rejected.
        id: ItemId,
        /// Size implied by the descriptor's format and shape.
        expected: u64,
        /// Length of the rejected value.
        actual: u64,
    },
}
