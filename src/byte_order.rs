//! Big-endian field codecs for packet headers, item pointers and descriptors.
//!
//! The heap protocol puts the most significant byte first in every
//! multi-byte field. The `clippy::big_endian_bytes` expectation lives here
//! and nowhere else.

/// Pointer count of a packet header as it appears in bytes 6 and 7.
///
/// # Examples
///
/// ```
/// use heapwire::byte_order::write_network_u16;
///
/// // A header announcing five item pointers.
/// assert_eq!(write_network_u16(5), [0x00, 0x05]);
/// ```
#[must_use]
pub fn write_network_u16(value: u16) -> [u8; 2] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Wire fields are most significant byte first."
    )]
    value.to_be_bytes()
}

/// Reads a header's two-byte pointer count.
///
/// # Examples
///
/// ```
/// use heapwire::byte_order::read_network_u16;
///
/// assert_eq!(read_network_u16([0x01, 0x00]), 256);
/// ```
#[must_use]
pub fn read_network_u16(bytes: [u8; 2]) -> u16 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Wire fields are most significant byte first."
    )]
    u16::from_be_bytes(bytes)
}

/// One 64-bit item pointer word, ready to append to a packet.
#[must_use]
pub fn write_network_u64(value: u64) -> [u8; 8] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Wire fields are most significant byte first."
    )]
    value.to_be_bytes()
}

/// Reads an item pointer word.
///
/// The top bit of the result is the immediate flag; splitting the rest into
/// identifier and value depends on the stream flavour.
///
/// # Examples
///
/// ```
/// use heapwire::byte_order::read_network_u64;
///
/// // Immediate heap counter (0x0001) holding 7 under the 48-bit flavour.
/// let word = read_network_u64([0x80, 0x01, 0, 0, 0, 0, 0, 0x07]);
/// assert_eq!(word >> 63, 1);
/// assert_eq!((word >> 48) & 0x7FFF, 0x0001);
/// assert_eq!(word & 0xFFFF_FFFF_FFFF, 7);
/// ```
#[must_use]
pub fn read_network_u64(bytes: [u8; 8]) -> u64 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Wire fields are most significant byte first."
    )]
    u64::from_be_bytes(bytes)
}

/// Serialise the low `width` bytes of `value` in network byte order.
///
/// Used for the heap-address-sized fields of descriptors, whose width is
/// set by the stream flavour rather than fixed by the protocol.
///
/// # Panics
///
/// Panics if `width` is greater than eight.
///
/// # Examples
///
/// ```
/// use heapwire::byte_order::write_network_uint;
///
/// assert_eq!(write_network_uint(0x0102_0304, 3), vec![0x02, 0x03, 0x04]);
/// ```
#[must_use]
pub fn write_network_uint(value: u64, width: usize) -> Vec<u8> {
    assert!(width <= 8, "network integers are at most eight bytes wide");
    write_network_u64(value)[8 - width..].to_vec()
}

/// Parse an unsigned network-order integer of up to eight bytes.
///
/// Returns `None` when `bytes` is wider than eight bytes.
///
/// # Examples
///
/// ```
/// use heapwire::byte_order::read_network_uint;
///
/// assert_eq!(read_network_uint(&[0x02, 0x03, 0x04]), Some(0x02_0304));
/// assert_eq!(read_network_uint(&[0; 9]), None);
/// ```
#[must_use]
pub fn read_network_uint(bytes: &[u8]) -> Option<u64> {
    if bytes.len() > 8 {
        return None;
    }
    let mut padded = [0_u8; 8];
    padded[8 - bytes.len()..].copy_from_slice(bytes);
    Some(read_network_u64(padded))
}

#[cfg(test)]
mod tests {
    //! Tests for variable-width field codecs.

    use rstest::rstest;

    use super::{read_network_uint, write_network_uint};

    #[rstest]
    #[case::one_byte(0xAB, 1, &[0xAB])]
    #[case::five_bytes(0x12_3456_789A, 5, &[0x12, 0x34, 0x56, 0x78, 0x9A])]
    #[case::six_bytes(0xDEAD_BEEF, 6, &[0x00, 0x00, 0xDE, 0xAD, 0xBE, 0xEF])]
    fn variable_width_integers_use_network_order(
        #[case] value: u64,
        #[case] width: usize,
        #[case] expected: &[u8],
    ) {
        let written = write_network_uint(value, width);
        assert_eq!(written, expected);
        assert_eq!(read_network_uint(&written), Some(value));
    }

    #[test]
    fn write_truncates_to_requested_width() {
        assert_eq!(write_network_uint(0xFFFF_0001, 2), vec![0x00, 0x01]);
    }

    #[test]
    fn empty_slice_reads_as_zero() {
        assert_eq!(read_network_uint(&[]), Some(0));
    }
}
