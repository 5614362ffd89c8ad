//! Transmit path: heaps in, packets out.
//!
//! [`AsyncSendScheduler`] encodes heaps with a
//! [`PacketEncoder`](crate::packet::PacketEncoder), transmits their packets
//! through a [`PacketTransport`] and reports each heap's outcome through a
//! [`SendHandle`]. [`ItemGroup`] and [`HeapGenerator`] build those heaps
//! incrementally from changing item values.

pub mod config;
pub mod error;
pub mod handle;
pub mod item_group;
pub mod scheduler;
pub mod transport;

pub use config::{FlushPolicy, SendConfig, SendConfigBuilder};
pub use error::{FlushError, SendError};
pub use handle::{HeapSent, SendHandle};
pub use item_group::{HeapGenerator, ItemGroup, Selection};
pub use scheduler::AsyncSendScheduler;
pub use transport::PacketTransport;
