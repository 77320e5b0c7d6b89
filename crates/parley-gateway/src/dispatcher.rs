use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use parley_types::events::GatewayEvent;

/// Tracks which connection currently belongs to each user and pushes
/// events to live connections. Shared by every request handler and every
/// connection lifecycle event.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for events every connected client receives
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Presence registry: user_id -> (conn_id, sender). At most one
    /// connection per user; a later registration supersedes the earlier
    /// one, so simultaneous multi-device delivery is not supported.
    connections: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to broadcast events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register the caller as this user's live connection, superseding any
    /// earlier registration. Returns (conn_id, receiver).
    pub async fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(user_id, (conn_id, tx));
        (conn_id, rx)
    }

    /// Remove this user's registration, but only if conn_id still owns it.
    /// A stale conn_id (the user reconnected in the meantime) is a no-op,
    /// never an error. Returns whether an entry was removed.
    pub async fn unregister(&self, user_id: Uuid, conn_id: Uuid) -> bool {
        let mut connections = self.inner.connections.write().await;
        match connections.get(&user_id) {
            Some((stored_conn_id, _)) if *stored_conn_id == conn_id => {
                connections.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    /// The user's currently active connection id, if any.
    pub async fn lookup(&self, user_id: Uuid) -> Option<Uuid> {
        self.inner
            .connections
            .read()
            .await
            .get(&user_id)
            .map(|(conn_id, _)| *conn_id)
    }

    /// Push an event to the user's live connection. Best-effort: if the
    /// user is not connected (or disconnects mid-push) the event is
    /// silently dropped — no queue, no retry.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        let connections = self.inner.connections.read().await;
        if let Some((_, tx)) = connections.get(&user_id) {
            let _ = tx.send(event);
        }
    }

    /// Ids of all currently connected users.
    pub async fn online_user_ids(&self) -> Vec<Uuid> {
        self.inner.connections.read().await.keys().copied().collect()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
