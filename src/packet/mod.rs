//! Wire packets: the unit handed to and received from the transport.
//!
//! A packet is an eight-byte header, a list of 64-bit item pointers and a
//! trailing payload slice of one heap. [`decode_packet`] parses received
//! datagrams; [`PacketEncoder`] slices outbound heaps.

use std::ops::Range;

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod id;
pub mod pointer;

pub use decoder::{Packet, decode_packet, encoded_len};
pub use encoder::{MIN_PACKET_SIZE, PacketEncoder, Packets};
pub use error::{EncodeError, MalformedPacket};
pub use id::{HeapCnt, ItemId, item_id};
pub use pointer::ItemPointer;

/// First header byte of every packet.
pub const MAGIC: u8 = 0x53;
/// Protocol version carried in the second header byte.
pub const VERSION: u8 = 4;
/// Size of the fixed packet header in bytes.
pub const HEADER_SIZE: usize = 8;
/// Size of one item pointer in bytes.
pub const ITEM_POINTER_SIZE: usize = 8;
/// Control pointers repeated in every encoded packet.
pub(crate) const CONTROL_POINTERS: usize = 4;

/// Byte ranges of address-mode items.
///
/// `offsets` lists the address of every address-mode pointer in wire order;
/// the result uses the same order. Items are ranked by offset, ties keeping
/// wire order, and each ends where the next ranked item starts, so an empty
/// item followed by another at the same offset stays empty. The last item
/// ends at `total`. A range may start beyond `total`; callers reject it.
pub(crate) fn address_extents(offsets: &[u64], total: u64) -> Vec<Range<u64>> {
    let mut ranked: Vec<usize> = (0..offsets.len()).collect();
    ranked.sort_by_key(|&index| offsets[index]);

    let mut extents = vec![0..0; offsets.len()];
    for (rank, &index) in ranked.iter().enumerate() {
        let end = ranked
            .get(rank + 1)
            .map_or(total, |&next| offsets[next])
            .min(total);
        extents[index] = offsets[index]..end;
    }
    extents
}

#[cfg(test)]
mod tests;
