//! Read loop driving a [`ReceiveStream`] from a datagram socket.

use std::io;

use async_trait::async_trait;
use log::{info, warn};
use tokio::{
    net::UdpSocket,
    select,
    time::{Duration, MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;

use super::{ReceiveConfig, ReceiveStream};

/// Source of datagrams consumed by [`UdpReader`].
///
/// Implementations must be cancellation-safe: dropping a pending `recv`
/// future must not lose a datagram already copied into `buf`.
#[async_trait]
pub trait DatagramSource: Send + Sync {
    /// Receive one datagram into `buf`, returning its length.
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

#[async_trait]
impl DatagramSource for UdpSocket {
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> { UdpSocket::recv(self, buf).await }
}

/// Why [`UdpReader::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderExit {
    /// The stream stopped: end of stream, or the consumer stopped the queue.
    Stopped,
    /// The shutdown token was cancelled.
    Cancelled,
}

/// Feeds datagrams from a bound socket into a receive stream.
///
/// Partial heaps are purged on a timer so expiry does not depend on traffic.
/// The reader does not open or bind sockets.
pub struct UdpReader<S> {
    source: S,
    stream: ReceiveStream,
    shutdown: CancellationToken,
    buf: Vec<u8>,
    purge_every: Duration,
}

impl<S: DatagramSource> UdpReader<S> {
    /// Create a reader using `config` for its buffer size and purge period.
    #[must_use]
    pub fn new(source: S, stream: ReceiveStream, config: &ReceiveConfig) -> Self {
        Self {
            source,
            stream,
            shutdown: CancellationToken::new(),
            buf: vec![0; config.max_packet_size()],
            purge_every: config.heap_timeout(),
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken { self.shutdown.clone() }

    /// Read until the stream stops or the token is cancelled, then stop the
    /// stream.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    pub async fn run(mut self) -> ReaderExit {
        let mut purge = interval(self.purge_every);
        purge.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let exit = loop {
            select! {
                biased;

                () = self.shutdown.cancelled() => break ReaderExit::Cancelled,
                _ = purge.tick() => {
                    // Delivery may wait on a full queue; shutdown must still win.
                    let purged = select! {
                        biased;

                        () = self.shutdown.cancelled() => break ReaderExit::Cancelled,
                        purged = self.stream.purge_expired() => purged,
                    };
                    if purged.is_err() {
                        break ReaderExit::Stopped;
                    }
                }
                res = self.source.recv(&mut self.buf) => match res {
                    Ok(len) => {
                        let added = select! {
                            biased;

                            () = self.shutdown.cancelled() => break ReaderExit::Cancelled,
                            added = self.stream.add_packet(&self.buf[..len]) => added,
                        };
                        if added.is_err() {
                            break ReaderExit::Stopped;
                        }
                    }
                    Err(e) => warn!("datagram receive failed: error={e:?}"),
                },
            }
        };
        self.stream.stop();
        info!("udp reader finished: exit={exit:?}");
        exit
    }
}
