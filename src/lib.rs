#![doc(html_root_url = "https://docs.rs/heapwire/latest")]
//! Public API for the `heapwire` library.
//!
//! Streams of heaps, self-describing groups of items, travel over
//! datagrams as packets. This crate decodes packets, reassembles them into
//! heaps under explicit memory bounds, and on the sending side slices heaps
//! into packets and paces their transmission.
//!
//! # Receiving
//!
//! ```
//! use heapwire::{
//!     Flavour,
//!     HeapBuilder,
//!     HeapCnt,
//!     ItemId,
//!     packet::PacketEncoder,
//!     recv::{Popped, ReceiveConfig, ReceiveStream},
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (mut stream, receiver) =
//!     ReceiveStream::new(&ReceiveConfig::default()).expect("valid configuration");
//!
//! let mut builder = HeapBuilder::new();
//! builder
//!     .add_item(ItemId::new(0x1000), vec![0xDE, 0xAD, 0xBE, 0xEF])
//!     .expect("fresh id");
//! let encoder = PacketEncoder::new(Flavour::default(), 1472).expect("valid size");
//! for packet in encoder
//!     .encode(&builder.build(), HeapCnt::new(1))
//!     .expect("heap fits")
//! {
//!     stream.add_packet(&packet).await.expect("stream running");
//! }
//!
//! let Popped::Item(heap) = receiver.pop_heap().await else {
//!     panic!("expected a heap");
//! };
//! let item = heap.item(ItemId::new(0x1000)).expect("item present");
//! assert_eq!(item.data().as_ref(), &[0xDE, 0xAD, 0xBE, 0xEF]);
//! # }
//! ```

pub mod byte_order;
pub mod descriptor;
pub mod error;
pub mod flavour;
pub mod heap;
pub mod metrics;
pub mod packet;
pub mod recv;
pub mod send;

pub use descriptor::{Descriptor, DescriptorRegistry, Dimension, FormatField};
pub use error::ConfigError;
pub use flavour::Flavour;
pub use heap::{BuildError, Heap, HeapBuilder, Item, ItemFormat, ItemValue, SendHeap};
pub use packet::{HeapCnt, ItemId};
pub use recv::{HeapEvent, HeapReceiver, LostHeap, ReceiveConfig, ReceiveStream};
pub use send::{AsyncSendScheduler, FlushPolicy, HeapGenerator, SendConfig, SendHandle};
