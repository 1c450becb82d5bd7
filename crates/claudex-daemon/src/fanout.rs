use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use tokio::sync::{RwLock, mpsc};

use claudex_protocol::{DaemonMessage, OutgoingMessage, Status};

pub type ConnectionId = u64;

struct ConnectionHandle {
    subscriptions: std::sync::Mutex<HashSet<String>>,
    sender: mpsc::UnboundedSender<OutgoingMessage>,
}

/// Registry of live connections and their session subscriptions, plus the
/// two broadcast entrypoints the PTY read loop and status monitor call
/// into. Each connection gets one unbounded mpsc channel, drained in order
/// by that connection's own writer task — the channel's FIFO delivery acts
/// as a per-connection write mutex: writes are serialized without ever
/// holding a lock across the actual socket I/O.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly-accepted connection, returning its id and the
    /// handle used to look it back up on removal.
    pub async fn register(&self, sender: mpsc::UnboundedSender<OutgoingMessage>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.connections.write().await.insert(
            id,
            ConnectionHandle {
                subscriptions: std::sync::Mutex::new(HashSet::new()),
                sender,
            },
        );
        id
    }

    /// Drop every subscription for `id`. Called on connection close.
    pub async fn remove(&self, id: ConnectionId) {
        self.connections.write().await.remove(&id);
    }

    pub async fn subscribe(&self, id: ConnectionId, session_id: &str) {
        let conns = self.connections.read().await;
        if let Some(handle) = conns.get(&id) {
            handle.subscriptions.lock().unwrap().insert(session_id.to_string());
        }
    }

    pub async fn unsubscribe(&self, id: ConnectionId, session_id: &str) {
        let conns = self.connections.read().await;
        if let Some(handle) = conns.get(&id) {
            handle.subscriptions.lock().unwrap().remove(session_id);
        }
    }

    /// Send a single message to exactly one connection (used to deliver
    /// the initial scrollback snapshot and control-plane responses).
    pub async fn send_to(&self, id: ConnectionId, msg: OutgoingMessage) {
        let conns = self.connections.read().await;
        if let Some(handle) = conns.get(&id) {
            let _ = handle.sender.send(msg);
        }
    }

    /// Base64-encode `bytes` and deliver an `output` frame to every
    /// connection currently subscribed to `session_id`.
    pub async fn broadcast_output(&self, session_id: &str, bytes: &[u8]) {
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        let msg = OutgoingMessage::Daemon(DaemonMessage::Output {
            session_id: session_id.to_string(),
            data,
        });
        self.broadcast(session_id, msg).await;
    }

    pub async fn broadcast_status(&self, session_id: &str, status: Status) {
        let msg = OutgoingMessage::Daemon(DaemonMessage::Status {
            session_id: session_id.to_string(),
            status,
        });
        self.broadcast(session_id, msg).await;
    }

    async fn broadcast(&self, session_id: &str, msg: OutgoingMessage) {
        // Per-connection sends are fire-and-forget into that connection's
        // own channel, so one slow or dead connection never blocks
        // delivery to the rest.
        let conns = self.connections.read().await;
        for handle in conns.values() {
            let subscribed = handle.subscriptions.lock().unwrap().contains(session_id);
            if subscribed {
                let _ = handle.sender.send(msg.clone());
            }
        }
    }

    pub async fn subscriber_count(&self, session_id: &str) -> usize {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|h| h.subscriptions.lock().unwrap().contains(session_id))
            .count()
    }
}

pub type SharedRegistry = Arc<ConnectionRegistry>;
