//! Stateless parsing of one datagram into a [`Packet`] view.
//!
//! The decoder validates the fixed header, extracts the control pointers into
//! typed fields and borrows the payload from the input buffer. No heap-level
//! state is touched.

use super::{
    HEADER_SIZE,
    HeapCnt,
    ITEM_POINTER_SIZE,
    ItemPointer,
    MAGIC,
    MalformedPacket,
    VERSION,
    item_id,
};
use crate::{
    byte_order::{read_network_u16, read_network_u64},
    flavour::Flavour,
};

/// Structured view of one received packet.
///
/// Control pointers (`HEAP_CNT`, `HEAP_SIZE`, `HEAP_OFFSET`,
/// `PAYLOAD_LENGTH`) are lifted into fields; `NULL` padding pointers are
/// discarded. Every other pointer, including descriptors and stream control,
/// is kept in wire order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet<'a> {
    flavour: Flavour,
    heap_cnt: HeapCnt,
    heap_length: Option<u64>,
    payload_offset: u64,
    pointers: Vec<ItemPointer>,
    payload: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Flavour advertised by the packet header.
    #[must_use]
    pub const fn flavour(&self) -> Flavour { self.flavour }

    /// Identifier of the heap this packet belongs to.
    #[must_use]
    pub const fn heap_cnt(&self) -> HeapCnt { self.heap_cnt }

    /// Total heap payload length, when the packet declares it.
    #[must_use]
    pub const fn heap_length(&self) -> Option<u64> { self.heap_length }

    /// Offset of this packet's payload within the heap payload.
    #[must_use]
    pub const fn payload_offset(&self) -> u64 { self.payload_offset }

    /// Non-control item pointers carried by this packet.
    #[must_use]
    pub fn item_pointers(&self) -> &[ItemPointer] { &self.pointers }

    /// Payload bytes carried by this packet.
    #[must_use]
    pub const fn payload(&self) -> &'a [u8] { self.payload }
}

/// Parse one datagram.
///
/// # Errors
///
/// Returns [`MalformedPacket`] when the header is unrecognised, the declared
/// structure exceeds the buffer, or the control pointers are inconsistent.
///
/// # Examples
///
/// ```
/// use heapwire::packet::{MalformedPacket, decode_packet};
///
/// assert_eq!(
///     decode_packet(&[0x53, 0x04]),
///     Err(MalformedPacket::Truncated {
///         needed: 8,
///         actual: 2
///     })
/// );
/// ```
pub fn decode_packet(buf: &[u8]) -> Result<Packet<'_>, MalformedPacket> {
    let Some(header) = buf.first_chunk::<HEADER_SIZE>() else {
        return Err(MalformedPacket::Truncated {
            needed: HEADER_SIZE,
            actual: buf.len(),
        });
    };
    if header[0] != MAGIC {
        return Err(MalformedPacket::BadMagic(header[0]));
    }
    if header[1] != VERSION {
        return Err(MalformedPacket::UnsupportedVersion(header[1]));
    }
    let flavour = Flavour::from_header_widths(header[2], header[3]).ok_or(
        MalformedPacket::UnsupportedWidths {
            item_pointer_bytes: header[2],
            heap_address_bytes: header[3],
        },
    )?;
    let count = usize::from(read_network_u16([header[6], header[7]]));
    let pointers_end = HEADER_SIZE + count * ITEM_POINTER_SIZE;
    if buf.len() < pointers_end {
        return Err(MalformedPacket::Truncated {
            needed: pointers_end,
            actual: buf.len(),
        });
    }

    let mut heap_cnt = None;
    let mut heap_length = None;
    let mut payload_offset = 0;
    let mut payload_length = None;
    let mut pointers = Vec::with_capacity(count);

    for chunk in buf[HEADER_SIZE..pointers_end].chunks_exact(ITEM_POINTER_SIZE) {
        let mut raw = [0_u8; ITEM_POINTER_SIZE];
        raw.copy_from_slice(chunk);
        let pointer = ItemPointer::from_raw(read_network_u64(raw), flavour);
        let id = pointer.id();
        let slot = match id {
            item_id::NULL => continue,
            item_id::HEAP_CNT => &mut heap_cnt,
            item_id::HEAP_SIZE => &mut heap_length,
            item_id::PAYLOAD_LENGTH => &mut payload_length,
            item_id::HEAP_OFFSET => {
                payload_offset = immediate_value(pointer)?;
                continue;
            }
            _ => {
                pointers.push(pointer);
                continue;
            }
        };
        *slot = Some(immediate_value(pointer)?);
    }

    let heap_cnt = HeapCnt::new(heap_cnt.ok_or(MalformedPacket::MissingHeapCnt)?);
    let remaining = &buf[pointers_end..];
    let payload = match payload_length {
        Some(declared) => {
            let available = remaining.len();
            let len = usize::try_from(declared)
                .ok()
                .filter(|len| *len <= available)
                .ok_or(MalformedPacket::PayloadLengthMismatch {
                    declared,
                    available,
                })?;
            &remaining[..len]
        }
        None => remaining,
    };

    if let Some(heap_length) = heap_length {
        let end = payload_offset.saturating_add(payload.len() as u64);
        if end > heap_length {
            return Err(MalformedPacket::PayloadBeyondHeap { end, heap_length });
        }
    }

    Ok(Packet {
        flavour,
        heap_cnt,
        heap_length,
        payload_offset,
        pointers,
        payload,
    })
}

/// Report the total encoded size of the packet at the start of `buf`.
///
/// Returns `None` until enough of the header and pointers are present to
/// locate the `PAYLOAD_LENGTH` pointer, or when the packet does not declare
/// one. Used to find the end of descriptors embedded in a heap payload.
#[must_use]
pub fn encoded_len(buf: &[u8]) -> Option<usize> {
    let header = buf.first_chunk::<HEADER_SIZE>()?;
    let flavour = Flavour::from_header_widths(header[2], header[3])?;
    let count = usize::from(read_network_u16([header[6], header[7]]));
    let pointers_end = HEADER_SIZE + count * ITEM_POINTER_SIZE;
    let pointers = buf.get(HEADER_SIZE..pointers_end)?;
    pointers.chunks_exact(ITEM_POINTER_SIZE).find_map(|chunk| {
        let mut raw = [0_u8; ITEM_POINTER_SIZE];
        raw.copy_from_slice(chunk);
        match ItemPointer::from_raw(read_network_u64(raw), flavour) {
            ItemPointer::Immediate {
                id: item_id::PAYLOAD_LENGTH,
                value,
            } => usize::try_from(value).ok().map(|len| pointers_end + len),
            _ => None,
        }
    })
}

fn immediate_value(pointer: ItemPointer) -> Result<u64, MalformedPacket> {
    match pointer {
        ItemPointer::Immediate { value, .. } => Ok(value),
        ItemPointer::Address { id, .. } => Err(MalformedPacket::ControlNotImmediate(id)),
    }
}
