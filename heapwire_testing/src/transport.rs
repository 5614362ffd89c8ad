//! Packet transports for driving an `AsyncSendScheduler` in tests.

use std::{
    io,
    sync::{
        Mutex,
        PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use heapwire::send::PacketTransport;
use tokio::sync::{Notify, Semaphore};

/// Keeps every packet it is given.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    packets: Mutex<Vec<Bytes>>,
}

impl RecordingTransport {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Packets recorded so far, in transmission order.
    #[must_use]
    pub fn packets(&self) -> Vec<Bytes> {
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PacketTransport for RecordingTransport {
    async fn send_packet(&self, packet: Bytes) -> io::Result<()> {
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(packet);
        Ok(())
    }
}

/// Accepts a fixed number of packets, then fails every later one.
#[derive(Debug)]
pub struct FailingTransport {
    remaining: AtomicUsize,
}

impl FailingTransport {
    /// Fail from the first packet on.
    #[must_use]
    pub fn always() -> Self { Self::after(0) }

    /// Accept `packets` packets before failing.
    #[must_use]
    pub fn after(packets: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(packets),
        }
    }
}

#[async_trait]
impl PacketTransport for FailingTransport {
    async fn send_packet(&self, _packet: Bytes) -> io::Result<()> {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .map(|_| ())
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "transport failed"))
    }
}

/// Holds each packet until the test releases it.
#[derive(Debug)]
pub struct GatedTransport {
    gate: Semaphore,
    entered: Notify,
    sent: AtomicUsize,
}

impl Default for GatedTransport {
    fn default() -> Self { Self::new() }
}

impl GatedTransport {
    /// Create a transport with the gate closed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            entered: Notify::new(),
            sent: AtomicUsize::new(0),
        }
    }

    /// Let `packets` more packets through.
    pub fn release(&self, packets: usize) { self.gate.add_permits(packets); }

    /// Wait until a packet reaches the gate.
    pub async fn entered(&self) { self.entered.notified().await; }

    /// Packets that passed the gate.
    #[must_use]
    pub fn sent(&self) -> usize { self.sent.load(Ordering::SeqCst) }
}

#[async_trait]
impl PacketTransport for GatedTransport {
    async fn send_packet(&self, _packet: Bytes) -> io::Result<()> {
        self.entered.notify_one();
        self.gate
            .acquire()
            .await
            .map_err(|_| io::Error::other("gate closed"))?
            .forget();
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
