//! Receive path: packets in, complete heaps out.
//!
//! A [`ReceiveStream`] decodes datagrams, reassembles them into heaps with a
//! [`HeapAssembler`] and hands the results to consumers through a
//! [`BoundedHeapQueue`]. Heaps that cannot be completed reach the consumer as
//! [`HeapEvent::Lost`] notices. [`UdpReader`] is an optional read loop for a
//! bound UDP socket.

pub mod assembler;
pub mod config;
pub mod error;
pub mod item_group;
pub mod queue;
pub mod reader;
pub mod stream;

pub use assembler::{HeapAssembler, HeapEvent};
pub use config::{ReceiveConfig, ReceiveConfigBuilder};
pub use error::{
    HeapOverflow,
    LostHeap,
    PacketStatus,
    QueueStopped,
    StreamStopped,
    TryPushError,
    Violation,
};
pub use item_group::{ItemGroup, Value, decode_values};
pub use queue::{BoundedHeapQueue, Popped, Pushed, QueuePolicy};
pub use reader::{DatagramSource, ReaderExit, UdpReader};
pub use stream::{HeapReceiver, ReceiveStream};
