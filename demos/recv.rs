//! Print every decoded item until the sender ends the stream.

use heapwire::recv::{ItemGroup, Popped, ReceiveConfig, ReceiveStream, UdpReader};
use tokio::net::UdpSocket;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = ReceiveConfig::default();
    let socket = UdpSocket::bind("127.0.0.1:8888").await?;
    let (stream, receiver) = ReceiveStream::new(&config)?;
    let reader = tokio::spawn(UdpReader::new(socket, stream, &config).run());

    let mut group = ItemGroup::new();
    while let Popped::Item(heap) = receiver.pop_heap().await {
        for id in group.update(&heap) {
            let name = group
                .descriptor(id)
                .map_or_else(|| format!("item {id}"), |d| d.name().to_owned());
            match group.values(id) {
                Some(values) => println!("{name}: {values:?}"),
                None => println!("{name}: {} raw bytes", group.get(id).map_or(0, |i| i.len())),
            }
        }
    }

    println!("stream ended: {:?}", reader.await?);
    Ok(())
}
