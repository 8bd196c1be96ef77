use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use kan_persistence::FileChange;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

/// Bounded per-client send queue; a client that falls this far behind is
/// dropped rather than blocking the hub.
const CLIENT_QUEUE_SIZE: usize = 32;
/// Ping cadence from the writer task.
const PING_INTERVAL: Duration = Duration::from_secs(30);
/// A connection with no traffic (pongs included) for this long is dropped.
const READ_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected { project: String },
    FileChange(FileChange),
}

/// WebSocket fan-out hub. Clients are registered with a bounded sender;
/// broadcast iterates a snapshot taken under the read lock. The send
/// channel is closed exactly once, by `remove_client`.
#[derive(Clone, Default)]
pub struct Hub {
    clients: Arc<RwLock<HashMap<u64, mpsc::Sender<ServerMessage>>>>,
    next_id: Arc<AtomicU64>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_client(&self) -> (u64, mpsc::Receiver<ServerMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_SIZE);
        self.clients.write().await.insert(id, tx);
        tracing::debug!(client = id, "WebSocket client registered");
        (id, rx)
    }

    pub async fn remove_client(&self, id: u64) {
        if self.clients.write().await.remove(&id).is_some() {
            tracing::debug!(client = id, "WebSocket client removed");
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn send_to(&self, id: u64, message: ServerMessage) {
        let sender = self.clients.read().await.get(&id).cloned();
        if let Some(sender) = sender {
            let _ = sender.send(message).await;
        }
    }

    /// Deliver to every client; clients with a full or closed queue are
    /// dropped from the hub.
    pub async fn broadcast(&self, message: ServerMessage) {
        let snapshot: Vec<(u64, mpsc::Sender<ServerMessage>)> = self
            .clients
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut stale = Vec::new();
        for (id, tx) in snapshot {
            if tx.try_send(message.clone()).is_err() {
                stale.push(id);
            }
        }
        if !stale.is_empty() {
            let mut clients = self.clients.write().await;
            for id in stale {
                clients.remove(&id);
                tracing::warn!(client = id, "Dropped slow WebSocket client");
            }
        }
    }
}

/// Drive one connection: a writer task owns all outgoing frames (queued
/// messages plus periodic pings); the read side only detects disconnects
/// and removes the client from the hub.
pub async fn handle_socket(socket: WebSocket, hub: Hub, project: String) {
    let (id, mut rx) = hub.add_client().await;
    hub.send_to(id, ServerMessage::Connected { project }).await;

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await; // the first tick fires immediately
        loop {
            tokio::select! {
                maybe = rx.recv() => {
                    let Some(message) = maybe else { break };
                    let Ok(text) = serde_json::to_string(&message) else { continue };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sink.close().await;
    });

    // Incoming messages are not semantically consumed; any frame (pongs
    // included) refreshes the read deadline.
    loop {
        match tokio::time::timeout(READ_DEADLINE, stream.next()).await {
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(_))) => break,
            Err(_) => {
                tracing::debug!(client = id, "WebSocket read deadline expired");
                break;
            }
        }
    }

    // Closing the send channel here ends the writer, which closes the
    // underlying connection.
    hub.remove_client(id).await;
    let _ = writer.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use kan_persistence::{ChangeKind, ChangeType};

    fn change() -> FileChange {
        FileChange {
            change_type: ChangeType::Modified,
            kind: ChangeKind::Card,
            board_name: Some("main".into()),
            card_id: Some("a_x".into()),
            path: "boards/main/cards/a_x.json".into(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_clients() {
        let hub = Hub::new();
        let (_id1, mut rx1) = hub.add_client().await;
        let (_id2, mut rx2) = hub.add_client().await;

        hub.broadcast(ServerMessage::FileChange(change())).await;
        assert!(matches!(rx1.recv().await, Some(ServerMessage::FileChange(_))));
        assert!(matches!(rx2.recv().await, Some(ServerMessage::FileChange(_))));
    }

    #[tokio::test]
    async fn test_full_queue_drops_client() {
        let hub = Hub::new();
        let (_id, rx) = hub.add_client().await;
        // Never drain; overflow must evict rather than block.
        for _ in 0..(CLIENT_QUEUE_SIZE + 1) {
            hub.broadcast(ServerMessage::FileChange(change())).await;
        }
        assert_eq!(hub.client_count().await, 0);
        drop(rx);
    }

    #[tokio::test]
    async fn test_remove_client_is_idempotent() {
        let hub = Hub::new();
        let (id, _rx) = hub.add_client().await;
        hub.remove_client(id).await;
        hub.remove_client(id).await;
        assert_eq!(hub.client_count().await, 0);
    }

    #[test]
    fn test_message_wire_shape() {
        let json =
            serde_json::to_value(ServerMessage::FileChange(change())).unwrap();
        assert_eq!(json["type"], "file_change");
        assert_eq!(json["data"]["kind"], "card");
        assert_eq!(json["data"]["type"], "modified");
        assert_eq!(json["data"]["board_name"], "main");

        let json = serde_json::to_value(ServerMessage::Connected {
            project: "demo".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["data"]["project"], "demo");
    }
}
