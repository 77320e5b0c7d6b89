use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use parley_types::events::GatewayEvent;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 30 seconds.
/// If 2 consecutive Pongs are missed (~60s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Claim the user's presence slot and announce the new connected set.
/// The broadcast subscription is taken out before the announcement, so
/// the joining connection's own receiver sees the `OnlineUsers` event
/// that first includes it. If the user reconnects elsewhere, a later
/// register supersedes this one and the returned conn_id goes stale.
async fn join_presence(
    dispatcher: &Dispatcher,
    user_id: Uuid,
) -> (
    Uuid,
    tokio::sync::mpsc::UnboundedReceiver<GatewayEvent>,
    tokio::sync::broadcast::Receiver<GatewayEvent>,
) {
    let broadcast_rx = dispatcher.subscribe();
    let (conn_id, user_rx) = dispatcher.register(user_id).await;
    dispatcher.broadcast(GatewayEvent::OnlineUsers {
        user_ids: dispatcher.online_user_ids().await,
    });
    (conn_id, user_rx, broadcast_rx)
}

/// Handle a pre-authenticated WebSocket connection. The token was already
/// validated at the HTTP upgrade layer, so the connection goes straight to
/// Ready and the event loop.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    user_id: Uuid,
    username: String,
) {
    let (mut sender, mut receiver) = socket.split();

    info!("{} ({}) connected to gateway", username, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    let Ok(text) = serde_json::to_string(&ready) else {
        return;
    };
    if sender.send(Message::Text(text.into())).await.is_err() {
        return;
    }

    let (conn_id, mut user_rx, mut broadcast_rx) = join_presence(&dispatcher, user_id).await;

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + targeted events to the client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Drain the client side; the gateway accepts no commands over the
    // socket, only pongs and close frames matter.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Only announce the departure if this connection still owned the
    // presence slot; a stale conn_id leaves the newer entry untouched.
    if dispatcher.unregister(user_id, conn_id).await {
        dispatcher.broadcast(GatewayEvent::OnlineUsers {
            user_ids: dispatcher.online_user_ids().await,
        });
    }
    info!("{} ({}) disconnected from gateway", username, user_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn next_online_set(
        rx: &mut tokio::sync::broadcast::Receiver<GatewayEvent>,
    ) -> Vec<Uuid> {
        match rx.recv().await {
            Ok(GatewayEvent::OnlineUsers { user_ids }) => user_ids,
            other => panic!("expected OnlineUsers, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn joining_connection_sees_its_own_arrival() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();

        let (_conn, _user_rx, mut broadcast_rx) = join_presence(&dispatcher, user).await;

        let online = next_online_set(&mut broadcast_rx).await;
        assert!(online.contains(&user));
    }

    #[tokio::test]
    async fn existing_connections_see_new_arrivals() {
        let dispatcher = Dispatcher::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let (_conn_a, _rx_a, mut broadcast_a) = join_presence(&dispatcher, first).await;
        let (_conn_b, _rx_b, mut broadcast_b) = join_presence(&dispatcher, second).await;

        // First connection: its own arrival, then the second user's.
        let online = next_online_set(&mut broadcast_a).await;
        assert_eq!(online, vec![first]);
        let online = next_online_set(&mut broadcast_a).await;
        assert_eq!(online.len(), 2);
        assert!(online.contains(&first) && online.contains(&second));

        // Second connection only sees the set that already includes it.
        let online = next_online_set(&mut broadcast_b).await;
        assert_eq!(online.len(), 2);
        assert!(online.contains(&second));
    }
}
