//! Unit tests for packet decoding and encoding.
//!
//! Split by direction; shared helpers for hand-built packets live here.

use bytes::BytesMut;

use super::{
    ItemPointer,
    encoder::{put_header, put_pointer},
};
use crate::flavour::Flavour;

mod encoder_tests;

/// Build a packet byte by byte, bypassing the encoder's validation.
fn raw_packet(flavour: Flavour, pointers: &[ItemPointer], payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_header(&mut buf, flavour, pointers.len());
    for pointer in pointers {
        put_pointer(&mut buf, *pointer, flavour);
    }
    buf.extend_from_slice(payload);
    buf.to_vec()
}

#[test]
fn extent_runs_to_the_next_ranked_offset() {
    let extents = super::address_extents(&[10, 0, 4], 16);
    assert_eq!(extents, vec![10..16, 0..4, 4..10]);
}

#[test]
fn empty_item_keeps_its_extent_empty() {
    let extents = super::address_extents(&[0, 4, 4, 10], 16);
    assert_eq!(extents, vec![0..4, 4..4, 4..10, 10..16]);
}

#[test]
fn extents_are_clamped_to_the_total() {
    let extents = super::address_extents(&[0, 10], 8);
    assert_eq!(extents, vec![0..8, 10..8]);
}
