//! Error types raised while decoding and encoding packets.

use thiserror::Error;

use super::{HeapCnt, ItemId};

/// A datagram that cannot be parsed as a packet.
///
/// Malformed packets are dropped by the receive stream; the stream itself
/// continues.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MalformedPacket {
    /// The buffer is shorter than the structure it declares.
    #[error("packet truncated: need {needed} bytes, have {actual}")]
    Truncated {
        /// Bytes required by the declared structure.
        needed: usize,
        /// Bytes actually present.
        actual: usize,
    },
    /// The magic byte is not `0x53`.
    #[error("unrecognised magic byte {0:#04x}")]
    BadMagic(u8),
    /// The version byte is not supported.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    /// The advertised pointer widths do not describe a supported flavour.
    #[error(
        "unsupported pointer widths: {item_pointer_bytes} id bytes + {heap_address_bytes} address bytes"
    )]
    UnsupportedWidths {
        /// Bytes advertised for the identifier part of a pointer.
        item_pointer_bytes: u8,
        /// Bytes advertised for the address part of a pointer.
        heap_address_bytes: u8,
    },
    /// No `HEAP_CNT` pointer was present.
    #[error("packet carries no heap counter")]
    MissingHeapCnt,
    /// A control pointer used address mode.
    #[error("control item {0} must be immediate")]
    ControlNotImmediate(ItemId),
    /// The declared payload length exceeds the bytes after the header.
    #[error("payload length {declared} exceeds the {available} bytes available")]
    PayloadLengthMismatch {
        /// Length declared by `PAYLOAD_LENGTH`.
        declared: u64,
        /// Bytes remaining after the item pointers.
        available: usize,
    },
    /// The payload extends beyond the declared heap length.
    #[error("payload ends at {end}, beyond heap length {heap_length}")]
    PayloadBeyondHeap {
        /// Offset one past the last payload byte.
        end: u64,
        /// Declared heap length.
        heap_length: u64,
    },
}

/// Errors produced while slicing a heap into packets.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The packet size cannot hold the header and control pointers.
    #[error("max packet size {size} is below the minimum of {minimum} bytes")]
    PacketTooSmall {
        /// Configured packet size.
        size: usize,
        /// Smallest usable packet size.
        minimum: usize,
    },
    /// The item pointers do not fit in the first packet.
    #[error("{count} item pointers do not fit in one packet (at most {max})")]
    TooManyItemPointers {
        /// Item pointers the heap needs.
        count: usize,
        /// Item pointers that fit alongside the packet header.
        max: usize,
    },
    /// An item identifier is wider than the flavour allows.
    #[error("item id {id} exceeds the flavour maximum {max:#x}")]
    ItemIdTooLarge {
        /// Offending identifier.
        id: ItemId,
        /// Largest identifier supported.
        max: u64,
    },
    /// An immediate value is wider than the flavour allows.
    #[error("immediate value for item {id} exceeds the flavour maximum {max:#x}")]
    ImmediateTooLarge {
        /// Item carrying the value.
        id: ItemId,
        /// Largest immediate supported.
        max: u64,
    },
    /// The heap payload cannot be addressed by the flavour.
    #[error("heap payload of {size} bytes exceeds the addressable maximum {max}")]
    HeapTooLarge {
        /// Total payload bytes.
        size: u64,
        /// Largest addressable payload.
        max: u64,
    },
    /// The heap counter cannot be represented.
    #[error("heap counter {0} exceeds the flavour maximum")]
    HeapCntTooLarge(HeapCnt),
    /// A descriptor could not be encoded.
    #[error("descriptor for item {0} could not be encoded")]
    Descriptor(ItemId),
}
