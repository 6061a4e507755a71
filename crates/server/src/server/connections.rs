//! Live client channels and snapshot fan-out.

use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::session::SessionId;

/// Outbound side of one connection: a bounded queue drained by that
/// connection's writer task.
#[derive(Debug, Clone)]
pub struct ClientChannel {
    pub addr: SocketAddr,
    tx: mpsc::Sender<String>,
}

impl ClientChannel {
    pub fn new(addr: SocketAddr, tx: mpsc::Sender<String>) -> Self {
        Self { addr, tx }
    }

    /// Queue a frame without waiting.
    pub fn offer(&self, frame: String) -> Result<(), TrySendError<String>> {
        self.tx.try_send(frame)
    }
}

/// Per-broadcast delivery counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Every live connection, keyed by session.
///
/// Guarded by its own lock, independent of the registry lock. Channels are
/// only removed by the owning connection when its ingest loop ends.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    channels: RwLock<HashMap<SessionId, ClientChannel>>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: SessionId, channel: ClientChannel) {
        self.channels.write().await.insert(session, channel);
    }

    pub async fn remove(&self, session: &SessionId) -> Option<ClientChannel> {
        self.channels.write().await.remove(session)
    }

    pub async fn contains(&self, session: &SessionId) -> bool {
        self.channels.read().await.contains_key(session)
    }

    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.channels.read().await.is_empty()
    }

    /// Offer `frame` to every channel. A full or closed queue is logged and
    /// skipped; the channel stays registered.
    pub async fn broadcast(&self, frame: &str) -> BroadcastReport {
        let channels = self.channels.read().await;
        let mut report = BroadcastReport::default();

        for (session, channel) in channels.iter() {
            match channel.offer(frame.to_owned()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(%session, addr = %channel.addr, "Outbound queue full, dropping snapshot");
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%session, addr = %channel.addr, "Writer already closed, dropping snapshot");
                    report.dropped += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_channel() {
        let set = ConnectionSet::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        set.insert(SessionId::from("a"), ClientChannel::new(addr(), tx_a)).await;
        set.insert(SessionId::from("b"), ClientChannel::new(addr(), tx_b)).await;

        let report = set.broadcast("[]").await;

        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 0 });
        assert_eq!(rx_a.recv().await.as_deref(), Some("[]"));
        assert_eq!(rx_b.recv().await.as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_failed_channel_is_kept_and_others_still_served() {
        let set = ConnectionSet::new();
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        let (closed_tx, closed_rx) = mpsc::channel(1);
        let (ok_tx, mut ok_rx) = mpsc::channel(4);
        drop(closed_rx);
        set.insert(SessionId::from("slow"), ClientChannel::new(addr(), slow_tx)).await;
        set.insert(SessionId::from("closed"), ClientChannel::new(addr(), closed_tx)).await;
        set.insert(SessionId::from("ok"), ClientChannel::new(addr(), ok_tx)).await;

        set.broadcast("first").await;
        let report = set.broadcast("second").await;

        // slow is full after the first frame, closed never accepts
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 2 });
        assert_eq!(set.len().await, 3);
        assert_eq!(ok_rx.recv().await.as_deref(), Some("first"));
        assert_eq!(ok_rx.recv().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_remove_only_named_session() {
        let set = ConnectionSet::new();
        let (tx, _rx) = mpsc::channel(1);
        set.insert(SessionId::from("a"), ClientChannel::new(addr(), tx.clone())).await;
        set.insert(SessionId::from("b"), ClientChannel::new(addr(), tx)).await;

        assert!(set.remove(&SessionId::from("a")).await.is_some());
        assert!(set.remove(&SessionId::from("a")).await.is_none());
        assert!(set.contains(&SessionId::from("b")).await);
        assert_eq!(set.len().await, 1);
    }
}
