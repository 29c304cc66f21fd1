//! Outbound packet queue
//!
//! Every connection has one unbounded FIFO. Any number of producers push
//! through cloned [`PacketSender`]s without blocking; a single drain task
//! pops items in arrival order and performs the framed write.
//!
//! Mode switches travel through the same queue as markers, so compression
//! and encryption start exactly between the frames they were queued between.

use std::sync::Arc;
use std::time::Duration;

use basalt_core::{BasaltError, ConnectionState, Result};
use basalt_protocol::{Encode, FrameWriter, KeepAliveChallenge, Packet, PacketDef, SharedSecret};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::keepalive::KeepAliveTick;
use crate::session::SessionShared;

/// One queued item
#[derive(Debug)]
pub enum Outbound {
    Packet(Packet),

    /// Compress every following frame above the threshold
    EnableCompression(usize),

    /// Encrypt every following byte
    EnableEncryption(SharedSecret),

    /// Write nothing further and end the session
    Close,
}

/// Producer side of a connection's queue
#[derive(Debug, Clone)]
pub struct PacketSender {
    tx: mpsc::UnboundedSender<Outbound>,
    cancel: CancellationToken,
}

impl PacketSender {
    fn push(&self, item: Outbound) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.tx.send(item).is_ok()
    }

    /// Queue a packet
    ///
    /// Returns `false` when the session is gone; that is not an error.
    pub fn send(&self, packet: Packet) -> bool {
        self.push(Outbound::Packet(packet))
    }

    pub fn send_def<T: PacketDef + Encode>(&self, def: &T) -> bool {
        self.send(Packet::from_def(def))
    }

    pub fn enable_compression(&self, threshold: usize) -> bool {
        self.push(Outbound::EnableCompression(threshold))
    }

    pub fn enable_encryption(&self, secret: SharedSecret) -> bool {
        self.push(Outbound::EnableEncryption(secret))
    }

    /// Flush what is queued so far, then end the session
    pub fn close(&self) -> bool {
        self.push(Outbound::Close)
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

/// Consumer side of a connection's queue
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::UnboundedReceiver<Outbound>,
}

/// Create a queue whose sends stop once `cancel` fires
pub fn channel(cancel: CancellationToken) -> (PacketSender, OutboundQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PacketSender { tx, cancel }, OutboundQueue { rx })
}

impl OutboundQueue {
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }

    /// Drain loop for one connection
    ///
    /// Writes queued items in order and sends keep-alive challenges while
    /// the session is in Play. Returns when the session is cancelled, a
    /// `Close` marker is reached, keep-alive expires or a write fails.
    /// Cancellation is checked before every item.
    pub async fn drain<W>(
        mut self,
        mut writer: FrameWriter<W>,
        session: Arc<SessionShared>,
        keepalive_interval: Duration,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let cancel = session.cancel_token().clone();
        let mut keepalive = interval_at(Instant::now() + keepalive_interval, keepalive_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                item = self.rx.recv() => match item {
                    Some(Outbound::Packet(packet)) => {
                        tracing::trace!("Connection {} send 0x{:02X} ({} bytes)", session.id(), packet.id, packet.len());
                        writer.write_packet(&packet).await?;
                    }
                    Some(Outbound::EnableCompression(threshold)) => {
                        writer.enable_compression(threshold)?;
                        tracing::debug!("Connection {} compression enabled (threshold {})", session.id(), threshold);
                    }
                    Some(Outbound::EnableEncryption(secret)) => {
                        writer.enable_encryption(&secret)?;
                        tracing::debug!("Connection {} encryption enabled", session.id());
                    }
                    Some(Outbound::Close) | None => break,
                },

                _ = keepalive.tick() => {
                    if session.state() != ConnectionState::Play {
                        continue;
                    }
                    match session.keepalive_tick() {
                        KeepAliveTick::Challenge(nonce) => {
                            writer.write_packet(&Packet::from_def(&KeepAliveChallenge { id: nonce })).await?;
                        }
                        KeepAliveTick::Expired => {
                            tracing::warn!("Connection {} closed: {}", session.id(), BasaltError::LivenessTimeout);
                            session.cancel();
                            break;
                        }
                    }
                }
            }
        }

        let _ = writer.shutdown().await;
        Ok(())
    }
}
