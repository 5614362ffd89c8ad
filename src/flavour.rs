//! Bit widths that parameterise the wire format of a stream.
//!
//! Item pointers are always 64 bits wide. A [`Flavour`] fixes how those bits
//! are split between the item identifier and the heap address (which also
//! carries immediate values). Senders and receivers of one stream must agree
//! on the flavour; receivers learn it from each packet header.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Width of one item pointer in bits.
pub const ITEM_POINTER_BITS: u32 = 64;

/// Heap address width used when none is configured.
pub const DEFAULT_HEAP_ADDRESS_BITS: u32 = 48;

/// Split of the 64-bit item pointer between identifier and address.
///
/// # Examples
///
/// ```
/// use heapwire::Flavour;
///
/// let flavour = Flavour::default();
/// assert_eq!(flavour.heap_address_bits(), 48);
/// assert_eq!(flavour.heap_address_bytes(), 6);
/// assert_eq!(flavour.max_item_id(), 0x7FFF);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Flavour {
    heap_address_bits: u32,
}

impl Flavour {
    /// Create a flavour with the given heap address width.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHeapAddressBits`] unless the width is a
    /// multiple of eight between 8 and 56.
    pub const fn new(heap_address_bits: u32) -> Result<Self, ConfigError> {
        if heap_address_bits == 0 || heap_address_bits > 56 || heap_address_bits % 8 != 0 {
            return Err(ConfigError::InvalidHeapAddressBits(heap_address_bits));
        }
        Ok(Self { heap_address_bits })
    }

    /// Reconstruct a flavour from the byte widths carried in a packet header.
    ///
    /// Returns `None` if the widths do not add up to a 64-bit item pointer or
    /// describe an unsupported address width.
    #[must_use]
    pub fn from_header_widths(item_pointer_bytes: u8, heap_address_bytes: u8) -> Option<Self> {
        let total = u32::from(item_pointer_bytes) + u32::from(heap_address_bytes);
        if total * 8 != ITEM_POINTER_BITS {
            return None;
        }
        Self::new(u32::from(heap_address_bytes) * 8).ok()
    }

    /// Number of bits used for heap addresses and immediate values.
    #[must_use]
    pub const fn heap_address_bits(self) -> u32 { self.heap_address_bits }

    /// Number of bytes used for heap addresses and immediate values.
    #[must_use]
    pub const fn heap_address_bytes(self) -> usize { (self.heap_address_bits / 8) as usize }

    /// Header byte advertising the identifier part of an item pointer.
    #[must_use]
    pub const fn item_pointer_width_byte(self) -> u8 {
        ((ITEM_POINTER_BITS - self.heap_address_bits) / 8) as u8
    }

    /// Header byte advertising the address part of an item pointer.
    #[must_use]
    pub const fn heap_address_width_byte(self) -> u8 { (self.heap_address_bits / 8) as u8 }

    /// Number of bits available for item identifiers (excluding the mode bit).
    #[must_use]
    pub const fn item_id_bits(self) -> u32 { ITEM_POINTER_BITS - 1 - self.heap_address_bits }

    /// Largest item identifier this flavour can carry.
    #[must_use]
    pub const fn max_item_id(self) -> u64 { (1_u64 << self.item_id_bits()) - 1 }

    /// Largest address or immediate value this flavour can carry.
    #[must_use]
    pub const fn max_address(self) -> u64 { (1_u64 << self.heap_address_bits) - 1 }
}

impl Default for Flavour {
    fn default() -> Self {
        Self {
            heap_address_bits: DEFAULT_HEAP_ADDRESS_BITS,
        }
    }
}

impl TryFrom<u32> for Flavour {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Flavour> for u32 {
    fn from(value: Flavour) -> Self { value.heap_address_bits }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::Flavour;
    use crate::error::ConfigError;

    #[rstest]
    #[case(0)]
    #[case(12)]
    #[case(64)]
    fn rejects_unsupported_address_widths(#[case] bits: u32) {
        assert_eq!(Flavour::new(bits), Err(ConfigError::InvalidHeapAddressBits(bits)));
    }

    #[rstest]
    #[case(40, 3, 5, 0x7F_FFFF)]
    #[case(48, 2, 6, 0x7FFF)]
    fn derives_widths_from_address_bits(
        #[case] bits: u32,
        #[case] id_bytes: u8,
        #[case] address_bytes: u8,
        #[case] max_id: u64,
    ) {
        let flavour = Flavour::new(bits).expect("supported width");
        assert_eq!(flavour.item_pointer_width_byte(), id_bytes);
        assert_eq!(flavour.heap_address_width_byte(), address_bytes);
        assert_eq!(flavour.max_item_id(), max_id);
        assert_eq!(Flavour::from_header_widths(id_bytes, address_bytes), Some(flavour));
    }

    #[test]
    fn header_widths_must_fill_a_pointer() {
        assert_eq!(Flavour::from_header_widths(2, 5), None);
        assert_eq!(Flavour::from_header_widths(8, 0), None);
    }
}
