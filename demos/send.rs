//! Send one described integer item followed by an end-of-stream heap.
//!
//! Run `cargo run --example recv` first, then `cargo run --example send`.

use heapwire::{
    Descriptor,
    FormatField,
    ItemId,
    send::{AsyncSendScheduler, HeapGenerator, ItemGroup, SendConfig},
};
use tokio::net::UdpSocket;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let socket = UdpSocket::bind("127.0.0.1:0").await?;
    socket.connect("127.0.0.1:8888").await?;
    let scheduler = AsyncSendScheduler::new(
        socket,
        &SendConfig::builder().rate(Some(1.0e6)).build()?,
        tokio::runtime::Handle::current(),
    )?;

    let id = ItemId::new(0x1000);
    let mut group = ItemGroup::new();
    group.add_item(
        Descriptor::new(id, "first integer")
            .with_description("a demonstration integer")
            .with_format(vec![FormatField::new('i', 32)]),
    )?;
    group.set_value(id, 0xDEAD_BEEF_u32.to_be_bytes().to_vec())?;

    let mut generator = HeapGenerator::new();
    let sent = scheduler.send_heap(&generator.get_heap(&group)?)?.await?;
    println!("heap {} sent in {} packets", sent.heap_cnt, sent.packets);

    scheduler.send_heap(&generator.get_end())?.await?;
    scheduler.flush().await?;
    Ok(())
}
