//! Tests for `PacketEncoder` layout and packet slicing.

use bytes::Bytes;
use rstest::{fixture, rstest};

use crate::{
    descriptor::{Descriptor, FormatField},
    flavour::Flavour,
    heap::{HeapBuilder, ItemValue, SendHeap},
    packet::{
        EncodeError,
        HeapCnt,
        ItemId,
        ItemPointer,
        MIN_PACKET_SIZE,
        PacketEncoder,
        decode_packet,
        item_id,
    },
};

/// Header plus four control pointers.
const OVERHEAD: usize = 40;

#[fixture]
fn encoder() -> PacketEncoder {
    PacketEncoder::new(Flavour::default(), 1472).expect("valid packet size")
}

fn heap_with(items: &[(u64, ItemValue)]) -> SendHeap {
    let mut builder = HeapBuilder::new();
    for (id, value) in items {
        builder
            .add_item(ItemId::new(*id), value.clone())
            .expect("fresh item id");
    }
    builder.build()
}

fn encoder_with(max_packet_size: usize) -> PacketEncoder {
    PacketEncoder::new(Flavour::default(), max_packet_size).expect("valid packet size")
}

#[rstest]
fn small_heap_fits_one_packet(encoder: PacketEncoder) {
    let heap = heap_with(&[(0x1000, vec![0xDE, 0xAD, 0xBE, 0xEF].into())]);
    let packets: Vec<Bytes> = encoder
        .encode(&heap, HeapCnt::new(1))
        .expect("heap fits")
        .collect();

    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].len(), OVERHEAD + 8 + 4);
    assert_eq!(&packets[0][..8], &[0x53, 4, 2, 6, 0, 0, 0, 5]);

    let packet = decode_packet(&packets[0]).expect("valid packet");
    assert_eq!(packet.heap_cnt(), HeapCnt::new(1));
    assert_eq!(packet.heap_length(), Some(4));
    assert_eq!(packet.payload_offset(), 0);
    assert_eq!(packet.payload(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(
        packet.item_pointers(),
        &[ItemPointer::Address {
            id: ItemId::new(0x1000),
            offset: 0
        }]
    );
}

#[test]
fn large_items_are_split_across_packets() {
    let max = OVERHEAD + 8 + 10;
    let heap = heap_with(&[(0x1000, (0..50).collect::<Vec<u8>>().into())]);
    let packets: Vec<Bytes> = encoder_with(max)
        .encode(&heap, HeapCnt::new(9))
        .expect("heap fits")
        .collect();

    let decoded: Vec<_> = packets
        .iter()
        .map(|raw| decode_packet(raw).expect("valid packet"))
        .collect();
    let slices: Vec<(u64, usize)> = decoded
        .iter()
        .map(|packet| (packet.payload_offset(), packet.payload().len()))
        .collect();
    assert_eq!(slices, vec![(0, 10), (10, 18), (28, 18), (46, 4)]);
    assert!(packets.iter().all(|raw| raw.len() <= max));
    assert_eq!(decoded[0].item_pointers().len(), 1);
    assert!(decoded[1..].iter().all(|packet| packet.item_pointers().is_empty()));
    assert!(decoded.iter().all(|packet| packet.heap_length() == Some(50)));

    let payload: Vec<u8> = decoded
        .iter()
        .flat_map(|packet| packet.payload().iter().copied())
        .collect();
    assert_eq!(payload, (0..50).collect::<Vec<u8>>());
}

#[test]
fn items_that_fit_a_fresh_packet_are_not_split() {
    let max = OVERHEAD + 16 + 10;
    let heap = heap_with(&[(0x1000, vec![1; 6].into()), (0x1001, vec![2; 12].into())]);
    let packets: Vec<Bytes> = encoder_with(max)
        .encode(&heap, HeapCnt::new(1))
        .expect("heap fits")
        .collect();

    let lengths: Vec<usize> = packets
        .iter()
        .map(|raw| decode_packet(raw).expect("valid packet").payload().len())
        .collect();
    assert_eq!(lengths, vec![6, 12]);
}

#[rstest]
fn control_and_descriptors_are_laid_out_in_order(encoder: PacketEncoder) {
    let mut builder = HeapBuilder::new();
    builder
        .mark_start()
        .add_descriptor(
            Descriptor::new(ItemId::new(0x1000), "first integer")
                .with_format(vec![FormatField::new('i', 32)]),
        )
        .add_item(ItemId::new(0x1000), vec![0, 0, 0, 1])
        .expect("fresh item id")
        .add_item(ItemId::new(0x1001), ItemValue::immediate(5))
        .expect("fresh item id")
        .mark_end();
    let heap = builder.build();

    let raw: Vec<Bytes> = encoder
        .encode(&heap, HeapCnt::new(2))
        .expect("heap fits")
        .collect();
    let packet = decode_packet(&raw[0]).expect("valid packet");
    let ids: Vec<ItemId> = packet.item_pointers().iter().map(ItemPointer::id).collect();
    assert_eq!(
        ids,
        vec![
            item_id::STREAM_CTRL,
            item_id::DESCRIPTOR,
            ItemId::new(0x1000),
            ItemId::new(0x1001),
            item_id::STREAM_CTRL,
        ]
    );
    assert_eq!(
        packet.item_pointers()[0],
        ItemPointer::Immediate {
            id: item_id::STREAM_CTRL,
            value: item_id::CTRL_STREAM_START
        }
    );
    assert_eq!(
        packet.item_pointers()[4],
        ItemPointer::Immediate {
            id: item_id::STREAM_CTRL,
            value: item_id::CTRL_STREAM_STOP
        }
    );
}

#[rstest]
fn empty_heap_still_produces_one_packet(encoder: PacketEncoder) {
    let packets: Vec<Bytes> = encoder
        .encode(&SendHeap::end_of_stream(), HeapCnt::new(3))
        .expect("heap fits")
        .collect();
    assert_eq!(packets.len(), 1);
    let packet = decode_packet(&packets[0]).expect("valid packet");
    assert_eq!(packet.heap_length(), Some(0));
    assert!(packet.payload().is_empty());
}

#[test]
fn packet_sequences_can_be_replayed() {
    let heap = heap_with(&[(0x1000, vec![7; 100].into())]);
    let packets = encoder_with(OVERHEAD + 8 + 20)
        .encode(&heap, HeapCnt::new(1))
        .expect("heap fits");
    let replay: Vec<Bytes> = packets.clone().collect();
    assert_eq!(packets.collect::<Vec<_>>(), replay);
}

#[test]
fn packet_size_must_cover_the_overhead() {
    assert_eq!(
        PacketEncoder::new(Flavour::default(), OVERHEAD).map(|_| ()),
        Err(EncodeError::PacketTooSmall {
            size: OVERHEAD,
            minimum: MIN_PACKET_SIZE
        })
    );
}

#[rstest]
#[case::id_too_wide(
    56,
    1,
    vec![(0x1000, ItemValue::immediate(1))],
    EncodeError::ItemIdTooLarge { id: ItemId::new(0x1000), max: 127 }
)]
#[case::immediate_too_wide(
    16,
    1,
    vec![(0x1000, ItemValue::immediate(70_000))],
    EncodeError::ImmediateTooLarge { id: ItemId::new(0x1000), max: 0xFFFF }
)]
#[case::heap_cnt_too_wide(16, 1 << 20, vec![], EncodeError::HeapCntTooLarge(HeapCnt::new(1 << 20)))]
#[case::heap_too_large(
    8,
    1,
    vec![(0x1000, vec![0; 300].into())],
    EncodeError::HeapTooLarge { size: 300, max: 255 }
)]
fn rejects_heaps_the_flavour_cannot_carry(
    #[case] bits: u32,
    #[case] heap_cnt: u64,
    #[case] items: Vec<(u64, ItemValue)>,
    #[case] expected: EncodeError,
) {
    let flavour = Flavour::new(bits).expect("valid flavour");
    let encoder = PacketEncoder::new(flavour, 1472).expect("valid packet size");
    let result = encoder.encode(&heap_with(&items), HeapCnt::new(heap_cnt));
    assert_eq!(result.map(|_| ()).unwrap_err(), expected);
}

#[test]
fn item_pointers_must_fit_the_first_packet() {
    let heap = heap_with(&[(0x1000, vec![1].into())]);
    let result = encoder_with(MIN_PACKET_SIZE).encode(&heap, HeapCnt::new(1));
    assert_eq!(
        result.map(|_| ()).unwrap_err(),
        EncodeError::TooManyItemPointers { count: 1, max: 0 }
    );
}
