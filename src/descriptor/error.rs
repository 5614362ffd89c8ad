//! Errors raised while encoding or decoding descriptors.

use thiserror::Error;

use crate::packet::{ItemId, MalformedPacket};

/// A descriptor could not be encoded or decoded.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DescriptorError {
    /// The embedded packet failed to parse.
    #[error("malformed descriptor packet: {0}")]
    Packet(#[from] MalformedPacket),
    /// The packet ended before all descriptor fields were present.
    #[error("descriptor packet is incomplete")]
    Incomplete,
    /// No `DESCRIPTOR_ID` immediate was present.
    #[error("descriptor does not name the item it describes")]
    MissingId,
    /// The described item id does not fit the flavour.
    #[error("descriptor id {0} does not fit the heap address width")]
    IdTooLarge(ItemId),
    /// A string field was not valid UTF-8.
    #[error("descriptor {0} is not valid UTF-8")]
    InvalidUtf8(&'static str),
    /// The format field could not be parsed or encoded.
    #[error("descriptor format is invalid")]
    InvalidFormat,
    /// The shape field could not be parsed.
    #[error("descriptor shape is invalid")]
    InvalidShape,
    /// A format length or shape size exceeds the flavour's field width.
    #[error("descriptor for item {0} has a field wider than the flavour allows")]
    FieldTooWide(ItemId),
}
