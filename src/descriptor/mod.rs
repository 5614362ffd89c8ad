//! Item metadata and its wire encoding.
//!
//! A [`Descriptor`] names an item and describes how to interpret its bytes.
//! On the wire a descriptor is itself a complete single-packet heap, carried
//! as the value of a `DESCRIPTOR` item. Receivers keep the most recent
//! descriptor per item in a [`DescriptorRegistry`].

pub mod error;
pub mod registry;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

pub use error::DescriptorError;
pub use registry::{DescriptorRegistry, Registration};

use crate::{
    byte_order::{read_network_uint, write_network_uint},
    flavour::Flavour,
    packet::{
        ItemId,
        ItemPointer,
        decode_packet,
        address_extents,
        encoder::{put_header, put_pointer},
        item_id,
    },
};

const SHAPE_VARIABLE_FLAG: u8 = 0x02;

/// One `(type code, bit length)` entry of a descriptor format.
///
/// Common codes are `u` (unsigned), `i` (signed), `f` (IEEE float),
/// `b` (boolean) and `c` (character).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatField {
    /// ASCII type code.
    pub code: char,
    /// Width of one element in bits.
    pub bits: u32,
}

impl FormatField {
    /// Create a format field.
    #[must_use]
    pub const fn new(code: char, bits: u32) -> Self { Self { code, bits } }
}

/// One dimension of an item's shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    /// Dimension of known size.
    Fixed(u64),
    /// Dimension whose size is only known from the item length.
    Variable,
}

/// Metadata describing how to interpret an item's bytes.
///
/// # Examples
///
/// ```
/// use heapwire::{Descriptor, Dimension, FormatField, ItemId};
///
/// let descriptor = Descriptor::new(ItemId::new(0x1001), "matrix")
///     .with_description("a matrix of integers")
///     .with_format(vec![FormatField::new('i', 32)])
///     .with_shape(vec![Dimension::Fixed(4), Dimension::Fixed(4)]);
/// assert_eq!(descriptor.item_size(), Some(64));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    id: ItemId,
    name: String,
    description: String,
    format: Vec<FormatField>,
    shape: Vec<Dimension>,
    dtype: Option<String>,
}

impl Descriptor {
    /// Create a descriptor with an empty description, format and shape.
    #[must_use]
    pub fn new(id: ItemId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            format: Vec::new(),
            shape: Vec::new(),
            dtype: None,
        }
    }

    /// Set the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the format.
    #[must_use]
    pub fn with_format(mut self, format: Vec<FormatField>) -> Self {
        self.format = format;
        self
    }

    /// Set the shape. An empty shape denotes a scalar.
    #[must_use]
    pub fn with_shape(mut self, shape: Vec<Dimension>) -> Self {
        self.shape = shape;
        self
    }

    /// Attach a numpy-style dtype header. It is carried opaquely.
    #[must_use]
    pub fn with_dtype(mut self, dtype: impl Into<String>) -> Self {
        self.dtype = Some(dtype.into());
        self
    }

    /// Identifier of the described item.
    #[must_use]
    pub const fn id(&self) -> ItemId { self.id }

    /// Item name.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// Item description.
    #[must_use]
    pub fn description(&self) -> &str { &self.description }

    /// Element format.
    #[must_use]
    pub fn format(&self) -> &[FormatField] { &self.format }

    /// Item shape.
    #[must_use]
    pub fn shape(&self) -> &[Dimension] { &self.shape }

    /// Optional dtype header.
    #[must_use]
    pub fn dtype(&self) -> Option<&str> { self.dtype.as_deref() }

    /// Bits occupied by one element of the format.
    #[must_use]
    pub fn element_bits(&self) -> u64 {
        self.format.iter().map(|field| u64::from(field.bits)).sum()
    }

    /// Size of the whole item in bytes, when the shape is fully known and
    /// the elements are byte-aligned.
    #[must_use]
    pub fn item_size(&self) -> Option<u64> {
        let mut elements: u64 = 1;
        for dimension in &self.shape {
            match dimension {
                Dimension::Fixed(size) => elements = elements.checked_mul(*size)?,
                Dimension::Variable => return None,
            }
        }
        let bits = self.element_bits().checked_mul(elements)?;
        (bits % 8 == 0 && bits > 0).then_some(bits / 8)
    }

    /// Encode the descriptor as a single-packet heap.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::FieldTooWide`] when a format bit length or
    /// shape size does not fit the flavour, and
    /// [`DescriptorError::IdTooLarge`] when the item id does not.
    pub fn to_raw(&self, flavour: Flavour) -> Result<Bytes, DescriptorError> {
        if self.id.get() > flavour.max_address() {
            return Err(DescriptorError::IdTooLarge(self.id));
        }
        let width = flavour.heap_address_bytes();

        let mut format = Vec::with_capacity(self.format.len() * width);
        for field in &self.format {
            let code = u8::try_from(field.code).map_err(|_| DescriptorError::InvalidFormat)?;
            let length_width = width - 1;
            if u64::from(field.bits) >= 1_u64 << (8 * length_width) {
                return Err(DescriptorError::FieldTooWide(self.id));
            }
            format.push(code);
            format.extend(write_network_uint(u64::from(field.bits), length_width));
        }

        let mut shape = Vec::with_capacity(self.shape.len() * (width + 1));
        for dimension in &self.shape {
            let (flag, size) = match dimension {
                Dimension::Fixed(size) => (0, *size),
                Dimension::Variable => (SHAPE_VARIABLE_FLAG, 0),
            };
            if size > flavour.max_address() {
                return Err(DescriptorError::FieldTooWide(self.id));
            }
            shape.push(flag);
            shape.extend(write_network_uint(size, width));
        }

        let mut fields: Vec<(ItemId, &[u8])> = vec![
            (item_id::DESCRIPTOR_NAME, self.name.as_bytes()),
            (item_id::DESCRIPTOR_DESCRIPTION, self.description.as_bytes()),
            (item_id::DESCRIPTOR_SHAPE, &shape),
            (item_id::DESCRIPTOR_FORMAT, &format),
        ];
        if let Some(dtype) = &self.dtype {
            fields.push((item_id::DESCRIPTOR_DTYPE, dtype.as_bytes()));
        }

        let payload_len: usize = fields.iter().map(|(_, bytes)| bytes.len()).sum();
        let payload_len = payload_len as u64;
        if payload_len > flavour.max_address() {
            return Err(DescriptorError::FieldTooWide(self.id));
        }
        let mut pointers = vec![
            ItemPointer::Immediate {
                id: item_id::HEAP_CNT,
                value: 1,
            },
            ItemPointer::Immediate {
                id: item_id::HEAP_SIZE,
                value: payload_len,
            },
            ItemPointer::Immediate {
                id: item_id::HEAP_OFFSET,
                value: 0,
            },
            ItemPointer::Immediate {
                id: item_id::PAYLOAD_LENGTH,
                value: payload_len,
            },
            ItemPointer::Immediate {
                id: item_id::DESCRIPTOR_ID,
                value: self.id.get(),
            },
        ];
        let mut offset = 0_u64;
        for (id, bytes) in &fields {
            pointers.push(ItemPointer::Address { id: *id, offset });
            offset += bytes.len() as u64;
        }

        let mut buf = BytesMut::new();
        put_header(&mut buf, flavour, pointers.len());
        for pointer in pointers {
            put_pointer(&mut buf, pointer, flavour);
        }
        for (_, bytes) in fields {
            buf.put_slice(bytes);
        }
        Ok(buf.freeze())
    }

    /// Decode a descriptor from its single-packet heap encoding.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] when the packet is malformed, lacks the
    /// described item id, or carries fields that cannot be parsed.
    pub fn from_raw(raw: &[u8]) -> Result<Self, DescriptorError> {
        let packet = decode_packet(raw)?;
        let payload = packet.payload();
        let total = payload.len() as u64;
        let width = packet.flavour().heap_address_bytes();

        let mut id = None;
        let mut fields = Vec::new();
        for pointer in packet.item_pointers() {
            match *pointer {
                ItemPointer::Immediate {
                    id: item_id::DESCRIPTOR_ID,
                    value,
                } => id = Some(ItemId::new(value)),
                ItemPointer::Address { id: field, offset } => fields.push((field, offset)),
                ItemPointer::Immediate { .. } => {}
            }
        }

        let offsets: Vec<u64> = fields.iter().map(|(_, offset)| *offset).collect();
        let mut descriptor = Self::new(ItemId::new(0), String::new());
        for ((field, _), extent) in fields.into_iter().zip(address_extents(&offsets, total)) {
            if extent.start > extent.end {
                return Err(DescriptorError::Incomplete);
            }
            #[expect(
                clippy::cast_possible_truncation,
                reason = "extents are bounded by the in-memory payload length"
            )]
            let bytes = &payload[extent.start as usize..extent.end as usize];
            descriptor.apply_field(field, bytes, width)?;
        }
        descriptor.id = id.ok_or(DescriptorError::MissingId)?;
        Ok(descriptor)
    }

    fn apply_field(&mut self, field: ItemId, bytes: &[u8], width: usize) -> Result<(), DescriptorError> {
        match field {
            item_id::DESCRIPTOR_NAME => self.name = utf8(bytes, "name")?,
            item_id::DESCRIPTOR_DESCRIPTION => self.description = utf8(bytes, "description")?,
            item_id::DESCRIPTOR_DTYPE => self.dtype = Some(utf8(bytes, "dtype")?),
            item_id::DESCRIPTOR_FORMAT => {
                if width == 0 || bytes.len() % width != 0 {
                    return Err(DescriptorError::InvalidFormat);
                }
                self.format = bytes
                    .chunks_exact(width)
                    .map(|chunk| {
                        let bits = read_network_uint(&chunk[1..])
                            .and_then(|bits| u32::try_from(bits).ok())
                            .ok_or(DescriptorError::InvalidFormat)?;
                        Ok(FormatField::new(char::from(chunk[0]), bits))
                    })
                    .collect::<Result<_, DescriptorError>>()?;
            }
            item_id::DESCRIPTOR_SHAPE => {
                let entry = width + 1;
                if bytes.len() % entry != 0 {
                    return Err(DescriptorError::InvalidShape);
                }
                self.shape = bytes
                    .chunks_exact(entry)
                    .map(|chunk| {
                        if chunk[0] & SHAPE_VARIABLE_FLAG != 0 {
                            return Ok(Dimension::Variable);
                        }
                        read_network_uint(&chunk[1..])
                            .map(Dimension::Fixed)
                            .ok_or(DescriptorError::InvalidShape)
                    })
                    .collect::<Result<_, DescriptorError>>()?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn utf8(bytes: &[u8], field: &'static str) -> Result<String, DescriptorError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| DescriptorError::InvalidUtf8(field))
}

#[cfg(test)]
mod tests;
