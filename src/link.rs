//! Peer links: one physical connection to either the frontend client
//! or the backend server, as seen by the session.

use std::{
    fmt::Debug,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Outbound half of a connection. Sends never block; packets are handed
/// to a writer task, which preserves their order.
pub trait PeerLink<P>: Send {
    /// Queues a packet. May be batched with later packets before flushing.
    fn send(&self, packet: P);

    /// Queues a packet and flushes everything queued so far.
    fn send_immediate(&self, packet: P);

    /// Closes the connection, showing `reason` to the peer if the
    /// protocol supports it. Idempotent.
    fn close(&self, reason: &str);

    fn is_closed(&self) -> bool;

    fn remote_address(&self) -> Option<SocketAddr>;
}

/// Message from a [`ChannelLink`] to whatever drives the far end.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkMessage<P> {
    Packet { packet: P, flush: bool },
    Close { reason: String },
}

/// A [`PeerLink`] backed by a channel. Socket writer tasks drain the
/// receiving end; the in-process relay hands it to the local backend.
pub struct ChannelLink<P> {
    sender: flume::Sender<LinkMessage<P>>,
    closed: Arc<AtomicBool>,
    remote_address: Option<SocketAddr>,
}

impl<P> ChannelLink<P> {
    pub fn new(remote_address: Option<SocketAddr>) -> (Self, LinkReceiver<P>) {
        let (sender, receiver) = flume::unbounded();
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                sender,
                closed: Arc::clone(&closed),
                remote_address,
            },
            LinkReceiver { receiver, closed },
        )
    }

    fn push(&self, message: LinkMessage<P>) {
        if self.sender.send(message).is_err() {
            // Far end is gone; teardown will notice through the event path.
            self.closed.store(true, Ordering::Release);
        }
    }
}

impl<P: Send + Debug> PeerLink<P> for ChannelLink<P> {
    fn send(&self, packet: P) {
        if self.is_closed() {
            tracing::trace!("Dropping {packet:?} on closed link");
            return;
        }
        self.push(LinkMessage::Packet {
            packet,
            flush: false,
        });
    }

    fn send_immediate(&self, packet: P) {
        if self.is_closed() {
            tracing::trace!("Dropping {packet:?} on closed link");
            return;
        }
        self.push(LinkMessage::Packet {
            packet,
            flush: true,
        });
    }

    fn close(&self, reason: &str) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.sender
                .send(LinkMessage::Close {
                    reason: reason.to_owned(),
                })
                .ok();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn remote_address(&self) -> Option<SocketAddr> {
        self.remote_address
    }
}

/// Far end of a [`ChannelLink`].
pub struct LinkReceiver<P> {
    receiver: flume::Receiver<LinkMessage<P>>,
    closed: Arc<AtomicBool>,
}

impl<P> LinkReceiver<P> {
    /// Waits for the next message. `None` once the link is dropped
    /// and drained.
    pub async fn recv(&self) -> Option<LinkMessage<P>> {
        self.receiver.recv_async().await.ok()
    }

    pub fn try_recv(&self) -> Option<LinkMessage<P>> {
        self.receiver.try_recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Everything queued so far.
    pub fn drain(&self) -> Vec<LinkMessage<P>> {
        self.receiver.drain().collect()
    }

    /// Packets queued so far, skipping close messages.
    pub fn drain_packets(&self) -> Vec<P> {
        self.drain()
            .into_iter()
            .filter_map(|message| match message {
                LinkMessage::Packet { packet, .. } => Some(packet),
                LinkMessage::Close { .. } => None,
            })
            .collect()
    }

    /// Marks the link closed from the far side, e.g. when the socket dies.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
