//! The seam between the scheduler and the network.

use std::{io, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;

/// Destination for encoded packets.
///
/// One call transmits one datagram. Implementations report failures per
/// packet and never retry.
#[async_trait]
pub trait PacketTransport: Send + Sync + 'static {
    /// Transmit one packet.
    async fn send_packet(&self, packet: Bytes) -> io::Result<()>;
}

/// Sends on a connected socket. A short write is reported as an error.
#[async_trait]
impl PacketTransport for UdpSocket {
    async fn send_packet(&self, packet: Bytes) -> io::Result<()> {
        let sent = self.send(&packet).await?;
        if sent == packet.len() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {sent} of {} bytes", packet.len()),
            ))
        }
    }
}

#[async_trait]
impl<T: PacketTransport + ?Sized> PacketTransport for Arc<T> {
    async fn send_packet(&self, packet: Bytes) -> io::Result<()> {
        T::send_packet(self, packet).await
    }
}
