//! Tests for value decoding and `ItemGroup`.

use std::sync::Arc;

use bytes::Bytes;
use rstest::rstest;

use crate::{
    descriptor::{Descriptor, FormatField},
    flavour::Flavour,
    heap::{Heap, Item, ItemFormat},
    packet::{HeapCnt, ItemId},
    recv::{ItemGroup, Value, decode_values},
};

const ITEM: ItemId = ItemId::new(0x1000);

fn described(format: Vec<FormatField>) -> Descriptor {
    Descriptor::new(ITEM, "value").with_format(format)
}

fn bytes_item(data: &[u8]) -> Item {
    Item::from_bytes(ITEM, Bytes::copy_from_slice(data), ItemFormat::Unknown)
}

#[rstest]
#[case::u32(vec![FormatField::new('u', 32)], vec![0, 0, 0, 1, 0, 0, 0, 2], vec![Value::Unsigned(1), Value::Unsigned(2)])]
#[case::i8(vec![FormatField::new('i', 8)], vec![0xFF, 0x7F], vec![Value::Signed(-1), Value::Signed(127)])]
#[case::i16(vec![FormatField::new('i', 16)], vec![0x80, 0x00], vec![Value::Signed(-32768)])]
#[case::f32(vec![FormatField::new('f', 32)], vec![0x3F, 0xC0, 0, 0], vec![Value::Float(1.5)])]
#[case::f64(vec![FormatField::new('f', 64)], vec![0xC0, 0, 0, 0, 0, 0, 0, 0], vec![Value::Float(-2.0)])]
#[case::bool(vec![FormatField::new('b', 8)], vec![0, 1], vec![Value::Bool(false), Value::Bool(true)])]
#[case::char(vec![FormatField::new('c', 8)], b"hi".to_vec(), vec![Value::Char('h'), Value::Char('i')])]
#[case::interleaved(
    vec![FormatField::new('u', 8), FormatField::new('i', 16)],
    vec![1, 0xFF, 0xFE, 2, 0, 3],
    vec![Value::Unsigned(1), Value::Signed(-2), Value::Unsigned(2), Value::Signed(3)]
)]
fn decodes_supported_formats(
    #[case] format: Vec<FormatField>,
    #[case] data: Vec<u8>,
    #[case] expected: Vec<Value>,
) {
    assert_eq!(
        decode_values(&described(format), &bytes_item(&data)),
        Some(expected)
    );
}

#[rstest]
#[case::no_format(vec![], vec![1])]
#[case::half_float(vec![FormatField::new('f', 16)], vec![0, 0])]
#[case::sub_byte(vec![FormatField::new('u', 4)], vec![0])]
#[case::unknown_code(vec![FormatField::new('z', 8)], vec![0])]
#[case::partial_element(vec![FormatField::new('u', 32)], vec![0, 0, 0, 1, 0, 0])]
fn unsupported_layouts_decode_to_none(#[case] format: Vec<FormatField>, #[case] data: Vec<u8>) {
    assert_eq!(decode_values(&described(format), &bytes_item(&data)), None);
}

#[rstest]
#[case(8)]
#[case(32)]
fn immediates_use_their_trailing_bytes(#[case] bits: u32) {
    let item = Item::from_immediate(ITEM, 42, Flavour::default(), ItemFormat::Unknown);
    assert_eq!(
        decode_values(&described(vec![FormatField::new('u', bits)]), &item),
        Some(vec![Value::Unsigned(42)])
    );
}

fn heap_with(cnt: u64, descriptor: Option<Arc<Descriptor>>, data: &[u8]) -> Heap {
    let mut heap = Heap::new(HeapCnt::new(cnt), Flavour::default(), data.len() as u64);
    let format = descriptor.clone().map_or(ItemFormat::Unknown, ItemFormat::Known);
    heap.push_item(Item::from_bytes(ITEM, Bytes::copy_from_slice(data), format));
    if let Some(descriptor) = descriptor {
        heap.push_descriptor(descriptor);
    }
    heap
}

#[test]
fn group_tracks_the_latest_value_per_item() {
    let descriptor = Arc::new(
        Descriptor::new(ITEM, "first integer").with_format(vec![FormatField::new('i', 32)]),
    );
    let mut group = ItemGroup::new();
    assert!(group.is_empty());

    assert_eq!(
        group.update(&heap_with(1, Some(descriptor), &[0xFF, 0xFF, 0xFF, 0xFE])),
        vec![ITEM]
    );
    assert_eq!(group.values(ITEM), Some(vec![Value::Signed(-2)]));

    group.update(&heap_with(2, None, &[0, 0, 0, 7]));
    assert_eq!(group.values(ITEM), Some(vec![Value::Signed(7)]));
    assert_eq!(
        group.by_name("first integer").map(|item| item.data().to_vec()),
        Some(vec![0, 0, 0, 7])
    );
    assert_eq!(group.ids().collect::<Vec<_>>(), vec![ITEM]);
    assert_eq!(group.len(), 1);
}

#[test]
fn descriptors_without_values_are_remembered() {
    let other = ItemId::new(0x2000);
    let mut heap = Heap::new(HeapCnt::new(1), Flavour::default(), 0);
    heap.push_descriptor(Arc::new(Descriptor::new(other, "later")));

    let mut group = ItemGroup::new();
    assert!(group.update(&heap).is_empty());
    assert_eq!(group.descriptor(other).map(|d| d.name()), Some("later"));
    assert!(group.get(other).is_none());
    assert!(group.values(other).is_none());
}
