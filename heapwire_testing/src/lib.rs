//! Test support for `heapwire`.
//!
//! Provides packet transports that record, fail or stall on demand, helpers
//! that encode heaps into packets, and a serialised handle to the global
//! logger for asserting on log output.
//!
//! ```rust
//! use heapwire_testing::{RecordingTransport, encode_heap, first_integer_heap};
//!
//! let packets = encode_heap(&first_integer_heap(0xDEAD_BEEF), 1, 1472);
//! assert_eq!(packets.len(), 1);
//! let transport = RecordingTransport::new();
//! assert!(transport.packets().is_empty());
//! ```

pub mod heaps;
pub mod logging;
pub mod transport;

pub use heaps::{FIRST_INTEGER, encode_heap, first_integer_heap};
pub use logging::{LoggerHandle, logger};
pub use transport::{FailingTransport, GatedTransport, RecordingTransport};
