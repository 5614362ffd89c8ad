//! Heaps sent by the scheduler and received by the UDP reader over loopback.

use std::time::Duration;

use heapwire::{
    SendHeap,
    recv::{ItemGroup, Popped, ReaderExit, ReceiveConfig, ReceiveStream, UdpReader, Value},
    send::{AsyncSendScheduler, SendConfig},
};
use heapwire_testing::{FIRST_INTEGER, first_integer_heap};
use tokio::{net::UdpSocket, runtime::Handle, time::timeout};

const DEADLINE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn described_item_crosses_a_loopback_socket() {
    let config = ReceiveConfig::default();
    let recv_socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("bind receiver");
    let addr = recv_socket.local_addr().expect("receiver address");
    let (stream, receiver) = ReceiveStream::new(&config).expect("valid receive config");
    let reader = tokio::spawn(UdpReader::new(recv_socket, stream, &config).run());

    let send_socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind sender");
    send_socket.connect(addr).await.expect("connect sender");
    let scheduler = AsyncSendScheduler::new(send_socket, &SendConfig::default(), Handle::current())
        .expect("valid send config");

    let sent = scheduler
        .send_heap(&first_integer_heap(0xDEAD_BEEF))
        .expect("heap encodes")
        .await
        .expect("heap sent");
    assert_eq!(sent.heap_cnt.get(), 1);
    scheduler
        .send_heap(&SendHeap::end_of_stream())
        .expect("end heap encodes")
        .await
        .expect("end heap sent");
    scheduler.flush().await.expect("no failures");

    let mut group = ItemGroup::new();
    let Popped::Item(heap) = timeout(DEADLINE, receiver.pop_heap())
        .await
        .expect("heap arrives")
    else {
        panic!("expected the data heap");
    };
    assert_eq!(group.update(&heap), vec![FIRST_INTEGER]);
    assert_eq!(
        group.values(FIRST_INTEGER),
        Some(vec![Value::Signed(i64::from(i32::from_be_bytes(
            0xDEAD_BEEF_u32.to_be_bytes()
        )))])
    );
    assert_eq!(
        group.by_name("first integer").map(|item| item.id()),
        Some(FIRST_INTEGER)
    );

    let Popped::Item(end) = timeout(DEADLINE, receiver.pop_heap())
        .await
        .expect("end heap arrives")
    else {
        panic!("expected the end heap");
    };
    assert!(end.is_end_of_stream());
    assert!(matches!(receiver.pop_heap().await, Popped::Stopped));
    assert_eq!(
        timeout(DEADLINE, reader).await.expect("reader exits").expect("reader task"),
        ReaderExit::Stopped
    );
}

#[tokio::test]
async fn multi_packet_heap_reassembles_over_loopback() {
    let config = ReceiveConfig::default();
    let recv_socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("bind receiver");
    let addr = recv_socket.local_addr().expect("receiver address");
    let (stream, receiver) = ReceiveStream::new(&config).expect("valid receive config");
    let reader = UdpReader::new(recv_socket, stream, &config);
    let token = reader.shutdown_token();
    let reader = tokio::spawn(reader.run());

    let send_socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind sender");
    send_socket.connect(addr).await.expect("connect sender");
    let send_config = SendConfig::builder()
        .max_packet_size(256)
        .build()
        .expect("valid send config");
    let scheduler = AsyncSendScheduler::new(send_socket, &send_config, Handle::current())
        .expect("valid scheduler");

    let payload: Vec<u8> = (0..2000_u32).map(|i| (i % 251) as u8).collect();
    let mut builder = heapwire::HeapBuilder::new();
    builder
        .add_item(heapwire::ItemId::new(0x2000), payload.clone())
        .expect("fresh id");
    let sent = scheduler
        .send_heap(&builder.build())
        .expect("heap encodes")
        .await
        .expect("heap sent");
    assert!(sent.packets > 1);

    let Popped::Item(heap) = timeout(DEADLINE, receiver.pop_heap())
        .await
        .expect("heap arrives")
    else {
        panic!("expected the heap");
    };
    let item = heap
        .item(heapwire::ItemId::new(0x2000))
        .expect("item present");
    assert_eq!(item.data().as_ref(), payload.as_slice());

    token.cancel();
    assert_eq!(
        timeout(DEADLINE, reader).await.expect("reader exits").expect("reader task"),
        ReaderExit::Cancelled
    );
}

#[tokio::test]
async fn generated_heaps_update_a_receiving_group() {
    use heapwire::{
        Descriptor,
        Flavour,
        FormatField,
        HeapCnt,
        ItemId,
        packet::PacketEncoder,
        send::{HeapGenerator, ItemGroup as SendGroup},
    };

    let counter = ItemId::new(0x1000);
    let label = ItemId::new(0x1001);
    let mut outbound = SendGroup::new();
    outbound
        .add_item(Descriptor::new(counter, "counter").with_format(vec![FormatField::new('u', 32)]))
        .expect("unreserved id")
        .add_item(Descriptor::new(label, "label").with_format(vec![FormatField::new('c', 8)]))
        .expect("unreserved id");
    outbound
        .set_value(counter, 1_u32.to_be_bytes().to_vec())
        .expect("known id");
    outbound.set_value(label, b"cat".to_vec()).expect("known id");

    let (mut stream, receiver) =
        ReceiveStream::new(&ReceiveConfig::default()).expect("valid receive config");
    let encoder = PacketEncoder::new(Flavour::default(), 1472).expect("valid size");
    let mut generator = HeapGenerator::new();
    let mut inbound = ItemGroup::new();

    for cnt in 1..=2 {
        if cnt == 2 {
            outbound
                .set_value(counter, 2_u32.to_be_bytes().to_vec())
                .expect("known id");
        }
        let heap = generator.get_heap(&outbound).expect("valid group");
        for packet in encoder.encode(&heap, HeapCnt::new(cnt)).expect("heap fits") {
            stream.add_packet(&packet).await.expect("stream running");
        }
        let Popped::Item(received) = timeout(DEADLINE, receiver.pop_heap())
            .await
            .expect("heap arrives")
        else {
            panic!("expected heap {cnt}");
        };
        let updated = inbound.update(&received);
        if cnt == 2 {
            assert_eq!(updated, vec![counter]);
            assert!(received.descriptors().is_empty());
        }
    }

    assert_eq!(inbound.values(counter), Some(vec![Value::Unsigned(2)]));
    assert_eq!(
        inbound.values(label),
        Some(vec![Value::Char('c'), Value::Char('a'), Value::Char('t')])
    );
}
