//! Unit tests for descriptor encoding and the registry.

use std::sync::Arc;

use rstest::{fixture, rstest};

use super::{Descriptor, DescriptorError, DescriptorRegistry, Dimension, FormatField, Registration};
use crate::{
    flavour::Flavour,
    packet::{ItemId, decode_packet, encoded_len, item_id},
};

#[fixture]
fn first_integer() -> Descriptor {
    Descriptor::new(ItemId::new(0x1000), "first integer")
        .with_description("the first integer of the stream")
        .with_format(vec![FormatField::new('i', 32)])
}

#[rstest]
#[case(Flavour::default())]
#[case(Flavour::new(40).expect("valid flavour"))]
#[case(Flavour::new(56).expect("valid flavour"))]
fn descriptor_survives_encoding(first_integer: Descriptor, #[case] flavour: Flavour) {
    let descriptor = first_integer
        .with_shape(vec![Dimension::Fixed(3), Dimension::Variable])
        .with_dtype("{'descr': '>i4', 'fortran_order': False, 'shape': (3,)}");
    let raw = descriptor.to_raw(flavour).expect("encodes");
    assert_eq!(Descriptor::from_raw(&raw).expect("decodes"), descriptor);
}

#[rstest]
#[case::scalar(Descriptor::new(ItemId::new(0x1000), "first integer")
    .with_description("the first integer of the stream")
    .with_format(vec![FormatField::new('i', 32)]))]
#[case::empty_description(Descriptor::new(ItemId::new(0x1001), "counter")
    .with_format(vec![FormatField::new('u', 64)]))]
#[case::no_format(Descriptor::new(ItemId::new(0x1002), "blob")
    .with_description("raw bytes")
    .with_shape(vec![Dimension::Fixed(16)]))]
#[case::only_a_name(Descriptor::new(ItemId::new(0x1003), "marker"))]
fn empty_fields_survive_encoding(#[case] descriptor: Descriptor) {
    let raw = descriptor.to_raw(Flavour::default()).expect("encodes");
    assert_eq!(Descriptor::from_raw(&raw).expect("decodes"), descriptor);
}

#[rstest]
fn raw_descriptor_is_a_single_packet_heap(first_integer: Descriptor) {
    let raw = first_integer.to_raw(Flavour::default()).expect("encodes");
    let packet = decode_packet(&raw).expect("valid packet");
    assert_eq!(packet.heap_cnt().get(), 1);
    assert_eq!(packet.payload_offset(), 0);
    assert_eq!(packet.heap_length(), Some(packet.payload().len() as u64));
    assert_eq!(encoded_len(&raw), Some(raw.len()));
    assert!(
        packet
            .item_pointers()
            .iter()
            .any(|pointer| pointer.id() == item_id::DESCRIPTOR_ID && pointer.is_immediate())
    );
}

#[rstest]
fn format_entries_use_the_address_width(first_integer: Descriptor) {
    let raw = first_integer.to_raw(Flavour::default()).expect("encodes");
    let packet = decode_packet(&raw).expect("valid packet");
    // name, description, empty shape, then a 6-byte format entry
    let payload = packet.payload();
    let name_and_description = "first integer".len() + "the first integer of the stream".len();
    assert_eq!(
        &payload[name_and_description..],
        &[b'i', 0, 0, 0, 0, 32]
    );
}

#[rstest]
fn missing_id_is_rejected(first_integer: Descriptor) {
    let raw = first_integer.to_raw(Flavour::default()).expect("encodes");
    let mut tampered = raw.to_vec();
    // The fifth pointer is DESCRIPTOR_ID; turn it into NULL padding.
    let at = 8 + 4 * 8;
    tampered[at..at + 8].copy_from_slice(&[0x80, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(Descriptor::from_raw(&tampered), Err(DescriptorError::MissingId));
}

#[rstest]
fn oversized_format_length_is_rejected() {
    let descriptor = Descriptor::new(ItemId::new(0x2000), "wide")
        .with_format(vec![FormatField::new('u', 300)]);
    let flavour = Flavour::new(16).expect("valid flavour");
    assert_eq!(
        descriptor.to_raw(flavour),
        Err(DescriptorError::FieldTooWide(ItemId::new(0x2000)))
    );
}

#[rstest]
#[case(vec![], Some(4))]
#[case(vec![Dimension::Fixed(8)], Some(32))]
#[case(vec![Dimension::Variable], None)]
fn item_size_follows_shape(
    first_integer: Descriptor,
    #[case] shape: Vec<Dimension>,
    #[case] expected: Option<u64>,
) {
    assert_eq!(first_integer.with_shape(shape).item_size(), expected);
}

#[rstest]
fn registry_reports_replacement(first_integer: Descriptor) {
    let registry = DescriptorRegistry::new();
    assert_eq!(registry.register(first_integer.clone()), Registration::New);
    let stored = registry.lookup(ItemId::new(0x1000)).expect("registered");
    assert_eq!(registry.register(first_integer.clone()), Registration::Unchanged);
    assert!(Arc::ptr_eq(
        &stored,
        &registry.lookup(ItemId::new(0x1000)).expect("registered")
    ));

    let renamed = first_integer.with_description("renamed");
    assert_eq!(registry.register(renamed.clone()), Registration::Replaced);
    assert_eq!(
        registry.lookup(ItemId::new(0x1000)).as_deref(),
        Some(&renamed)
    );
    assert_eq!(stored.description(), "the first integer of the stream");
}

#[rstest]
fn registry_handles_share_state(first_integer: Descriptor) {
    let registry = DescriptorRegistry::new();
    let other = registry.clone();
    registry.register(first_integer);
    registry.register(Descriptor::new(ItemId::new(0x0fff), "earlier"));
    assert_eq!(other.len(), 2);
    let ids: Vec<_> = other.snapshot().iter().map(|d| d.id().get()).collect();
    assert_eq!(ids, vec![0x0fff, 0x1000]);
    other.clear();
    assert!(registry.is_empty());
}
