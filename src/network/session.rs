//! Session Management
//!
//! [`ClientSession`] is the per-connection player state. It is owned by the
//! connection task and mutated only by that task's handlers.
//!
//! [`SessionRegistry`] is the shared view every connection can see: one
//! [`SessionEntry`] per live connection carrying what a snapshot broadcast
//! needs plus the connection's outbound queue. Removing an entry is the single
//! "session ended" event and wakes the connection task so it closes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify, RwLock};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::core::chunk::ChunkCoord;
use crate::core::geometry::TilePos;
use crate::network::protocol::{ClientId, PlayerEntry, ServerMessage};
use crate::world::endpoint::Endpoint;
use crate::world::topology::MIN_GHOST_WIDTH;

/// Stable identity of one accepted connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// CLIENT SESSION
// =============================================================================

/// Per-connection player state.
#[derive(Debug)]
pub struct ClientSession {
    /// Connection identity.
    pub connection_id: ConnectionId,
    /// Assigned player id, 0 until the client sends its config.
    pub client_id: ClientId,
    /// Display name.
    pub username: String,
    /// Authoritative position.
    pub pos: TilePos,
    /// Clamped ghost-zone width.
    pub ghost_zone_width: i32,
    /// Neighbors currently hinted to the client, with the endpoint sent.
    pub active_ghost_regions: BTreeMap<String, Endpoint>,
    /// Walking flag.
    pub is_moving: bool,
    /// Provisional connections are not yet full players.
    pub is_provisional: bool,
    /// Position exempt from re-triggering a teleport.
    pub safe_spot: Option<TilePos>,
    /// Chunk of `pos`.
    pub chunk: ChunkCoord,
    /// Time of the last accepted move; `None` until the first one.
    pub last_move_at: Option<Instant>,
    /// Time of the last arrival.
    pub last_arrival_at: Option<Instant>,
    outbound: mpsc::Sender<ServerMessage>,
}

impl ClientSession {
    /// New session sending through `outbound`.
    pub fn new(connection_id: ConnectionId, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            connection_id,
            client_id: 0,
            username: String::new(),
            pos: TilePos::default(),
            ghost_zone_width: MIN_GHOST_WIDTH,
            active_ghost_regions: BTreeMap::new(),
            is_moving: false,
            is_provisional: false,
            safe_spot: None,
            chunk: ChunkCoord::default(),
            last_move_at: None,
            last_arrival_at: None,
            outbound,
        }
    }

    /// Whether no move has been accepted yet.
    pub fn is_first_move(&self) -> bool {
        self.last_move_at.is_none()
    }

    /// Queue a message for this connection. A closed connection drops it.
    pub async fn send(&self, msg: ServerMessage) {
        let _ = self.outbound.send(msg).await;
    }

    /// What other sessions may see of this one.
    pub fn view(&self) -> SessionView {
        SessionView {
            client_id: self.client_id,
            username: self.username.clone(),
            pos: self.pos,
            is_moving: self.is_moving,
        }
    }
}

/// Publicly visible part of a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionView {
    /// Player id (0 = unassigned).
    pub client_id: ClientId,
    /// Display name.
    pub username: String,
    /// Position.
    pub pos: TilePos,
    /// Walking flag.
    pub is_moving: bool,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Registry entry for one live connection.
#[derive(Clone, Debug)]
pub struct SessionEntry {
    /// Last published view.
    pub view: SessionView,
    /// Outbound queue of the connection.
    pub outbound: mpsc::Sender<ServerMessage>,
    /// Woken when the entry is removed.
    pub closed: Arc<Notify>,
}

/// Concurrent registry of every connection in this region.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<ConnectionId, SessionEntry>>,
    next_client_id: AtomicI32,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Empty registry; client ids start at 1.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            next_client_id: AtomicI32::new(1),
        }
    }

    /// Next client id. Ids are never reused.
    pub fn assign_client_id(&self) -> ClientId {
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a connection. The returned notify fires on removal.
    pub async fn insert(&self, id: ConnectionId, outbound: mpsc::Sender<ServerMessage>) -> Arc<Notify> {
        let closed = Arc::new(Notify::new());
        let entry = SessionEntry {
            view: SessionView::default(),
            outbound,
            closed: closed.clone(),
        };
        self.sessions.write().await.insert(id, entry);
        closed
    }

    /// Unregister a connection and wake it so it closes. Idempotent.
    pub async fn remove(&self, id: ConnectionId) -> Option<SessionEntry> {
        let removed = self.sessions.write().await.remove(&id);
        if let Some(entry) = &removed {
            // `notify_one` stores a permit, so a task not yet waiting still sees it.
            entry.closed.notify_one();
            debug!(connection = %id, client_id = entry.view.client_id, "session_removed");
        }
        removed
    }

    /// Replace the visible state of a connection. Unknown ids are ignored.
    pub async fn publish(&self, id: ConnectionId, view: SessionView) {
        if let Some(entry) = self.sessions.write().await.get_mut(&id) {
            entry.view = view;
        }
    }

    /// Whether a connection is registered.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// True if no connection is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Copy of every entry, taken under one read lock.
    pub async fn snapshot(&self) -> Vec<(ConnectionId, SessionEntry)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect()
    }

    /// Roster of players with an assigned id, ordered by id.
    pub fn roster(entries: &[(ConnectionId, SessionEntry)]) -> Vec<PlayerEntry> {
        let mut players: Vec<PlayerEntry> = entries
            .iter()
            .filter(|(_, e)| e.view.client_id != 0)
            .map(|(_, e)| PlayerEntry {
                client_id: e.view.client_id,
                pos: e.view.pos,
                moving: e.view.is_moving,
                username: e.view.username.clone(),
            })
            .collect();
        players.sort_by_key(|p| p.client_id);
        players
    }

    /// Send every connection a snapshot addressed with its own id.
    ///
    /// Uses `try_send`: a connection whose queue is full misses this
    /// snapshot rather than stalling the sender. Returns how many were queued.
    pub async fn broadcast_snapshot(&self) -> usize {
        let entries = self.snapshot().await;
        let players = Self::roster(&entries);
        let mut sent = 0;
        for (id, entry) in &entries {
            let msg = ServerMessage::PlayersSnapshot {
                my_id: entry.view.client_id,
                players: players.clone(),
            };
            match entry.outbound.try_send(msg) {
                Ok(()) => sent += 1,
                Err(e) => debug!(connection = %id, error = %e, "snapshot_dropped"),
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(id: ClientId, name: &str, x: i32, y: i32) -> SessionView {
        SessionView {
            client_id: id,
            username: name.into(),
            pos: TilePos::new(x, y),
            is_moving: false,
        }
    }

    #[test]
    fn test_client_ids_are_monotonic() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.assign_client_id(), 1);
        assert_eq!(registry.assign_client_id(), 2);
        assert_eq!(registry.assign_client_id(), 3);
    }

    #[test]
    fn test_new_session_defaults() {
        let (tx, _rx) = mpsc::channel(4);
        let session = ClientSession::new(ConnectionId::new(), tx);
        assert_eq!(session.client_id, 0);
        assert_eq!(session.ghost_zone_width, 1);
        assert!(session.is_first_move());
        assert!(session.active_ghost_regions.is_empty());
    }

    #[tokio::test]
    async fn test_insert_publish_remove() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        let id = ConnectionId::new();
        let closed = registry.insert(id, tx).await;
        assert!(registry.contains(id).await);

        registry.publish(id, view(7, "ash", 3, 4)).await;
        let snap = registry.snapshot().await;
        assert_eq!(snap[0].1.view, view(7, "ash", 3, 4));

        assert!(registry.remove(id).await.is_some());
        assert!(registry.remove(id).await.is_none());
        assert!(registry.is_empty().await);
        // The permit was stored before anyone waited.
        closed.notified().await;
    }

    #[tokio::test]
    async fn test_publish_unknown_is_ignored() {
        let registry = SessionRegistry::new();
        registry.publish(ConnectionId::new(), view(1, "x", 0, 0)).await;
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_addresses_each_recipient() {
        let registry = SessionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let (tx_c, mut rx_c) = mpsc::channel(4);
        let (a, b, c) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        registry.insert(a, tx_a).await;
        registry.insert(b, tx_b).await;
        registry.insert(c, tx_c).await;
        registry.publish(a, view(2, "bo", 1, 1)).await;
        registry.publish(b, view(1, "al", 5, 5)).await;
        // `c` has no id yet.

        assert_eq!(registry.broadcast_snapshot().await, 3);

        let ServerMessage::PlayersSnapshot { my_id, players } = rx_a.recv().await.unwrap() else {
            panic!("expected snapshot");
        };
        assert_eq!(my_id, 2);
        assert_eq!(players.iter().map(|p| p.client_id).collect::<Vec<_>>(), vec![1, 2]);

        let ServerMessage::PlayersSnapshot { my_id, .. } = rx_b.recv().await.unwrap() else {
            panic!("expected snapshot");
        };
        assert_eq!(my_id, 1);

        let ServerMessage::PlayersSnapshot { my_id, players } = rx_c.recv().await.unwrap() else {
            panic!("expected snapshot");
        };
        assert_eq!(my_id, 0);
        assert_eq!(players.len(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_skips_full_queue() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        tx.send(ServerMessage::PlayerInfo { client_id: 1 }).await.unwrap();
        registry.insert(ConnectionId::new(), tx).await;
        assert_eq!(registry.broadcast_snapshot().await, 0);
    }
}
