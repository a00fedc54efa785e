//! The session manager: live connections, the player index, and the
//! process-wide policies that span connections.
//!
//! Two maps with different locking:
//!
//! - `connections` is a `std::sync::RwLock` over the id → handle map;
//!   lookups are brief and never held across an await.
//! - `players` is a `tokio::sync::Mutex` over the player-uuid → id index,
//!   because the duplicate-login policy must evict the previous holder
//!   (an awaited enqueue) *before* the new binding commits, atomically
//!   with respect to other logins.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hearth_core::protocol::play::ClientboundPlayPacket;
use hearth_core::protocol::types::{Chat, GameProfile};
use hearth_core::protocol::ClientboundPacket;

use crate::net::connection::{ConnectionShared, Outbound};
use crate::net::ConnectionId;

/// Result of enqueueing an outbound packet.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The connection is gone (or going); the packet was not queued.
    #[error("connection closed")]
    Closed,
}

/// Binding a player to a connection can be refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    /// The configured connection cap is reached.
    #[error("server is full")]
    Capacity,
}

/// A cheap, cloneable reference to one live connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    outbound: mpsc::Sender<Outbound>,
    shared: Arc<ConnectionShared>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        id: ConnectionId,
        addr: SocketAddr,
        outbound: mpsc::Sender<Outbound>,
        shared: Arc<ConnectionShared>,
    ) -> Self {
        Self {
            id,
            addr,
            outbound,
            shared,
        }
    }

    /// The profile bound at LoginSuccess, if any yet.
    pub fn profile(&self) -> Option<GameProfile> {
        self.shared.profile.lock().expect("profile lock").clone()
    }

    /// Enqueues a packet, waiting for queue capacity. Per-caller order is
    /// preserved; packets enqueued this way are never dropped.
    pub async fn send(&self, packet: ClientboundPacket) -> Result<(), SendError> {
        self.outbound
            .send(Outbound::Packet(packet))
            .await
            .map_err(|_| SendError::Closed)
    }

    /// Enqueues a packet if there is room right now, else drops it.
    ///
    /// For producers that marked their traffic lossy (world-update diffs);
    /// chat, keep-alive and disconnect always go through [`send`](Self::send).
    pub fn send_lossy(&self, packet: ClientboundPacket) -> bool {
        self.outbound.try_send(Outbound::Packet(packet)).is_ok()
    }

    pub(crate) async fn push(&self, item: Outbound) -> Result<(), SendError> {
        self.outbound.send(item).await.map_err(|_| SendError::Closed)
    }
}

struct SessionInner {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    players: tokio::sync::Mutex<HashMap<Uuid, ConnectionId>>,
    next_id: AtomicU64,
    max_players: u32,
}

/// Tracks every live connection and owns the cross-connection policies:
/// the connection cap and the one-connection-per-player rule.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    pub fn new(max_players: u32) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                connections: RwLock::new(HashMap::new()),
                players: tokio::sync::Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                max_players,
            }),
        }
    }

    /// Allocates the next connection id.
    pub(crate) fn next_id(&self) -> ConnectionId {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register(&self, handle: ConnectionHandle) {
        let mut connections = self.inner.connections.write().expect("connections lock");
        debug!(id = handle.id, addr = %handle.addr, "connection registered");
        connections.insert(handle.id, handle);
    }

    /// Drops the connection from both maps. Returns the handle if it was
    /// still registered.
    pub(crate) async fn remove(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        let handle = {
            let mut connections = self.inner.connections.write().expect("connections lock");
            connections.remove(&id)
        };
        if handle.is_some() {
            let mut players = self.inner.players.lock().await;
            players.retain(|_, bound| *bound != id);
        }
        handle
    }

    pub fn get(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.inner
            .connections
            .read()
            .expect("connections lock")
            .get(&id)
            .cloned()
    }

    /// The profile bound to `id`, for synchronous callers like the inbound
    /// handler.
    pub fn profile_of(&self, id: ConnectionId) -> Option<GameProfile> {
        self.get(id).and_then(|handle| handle.profile())
    }

    /// Live connections, bound or not.
    pub fn connection_count(&self) -> usize {
        self.inner
            .connections
            .read()
            .expect("connections lock")
            .len()
    }

    /// Players past LoginSuccess.
    pub async fn player_count(&self) -> usize {
        self.inner.players.lock().await.len()
    }

    /// Binds `profile` to connection `id`, enforcing the connection cap
    /// and the one-connection-per-player rule.
    ///
    /// A previous connection holding the same profile id is sent a
    /// Disconnect and detached before the new binding commits; both steps
    /// happen under the index lock, so two racing logins for one profile
    /// serialize cleanly.
    pub async fn bind_player(
        &self,
        id: ConnectionId,
        profile: &GameProfile,
    ) -> Result<(), BindError> {
        let mut players = self.inner.players.lock().await;

        let displaced = players.get(&profile.uuid).copied();
        if displaced.is_none() && players.len() >= self.inner.max_players as usize {
            return Err(BindError::Capacity);
        }

        if let Some(old_id) = displaced {
            if let Some(old) = self.get(old_id) {
                info!(
                    player = %profile.name,
                    old = old_id,
                    new = id,
                    "displacing previous login"
                );
                let farewell = ClientboundPacket::Play(ClientboundPlayPacket::Disconnect {
                    reason: Chat::text("Logged in from another location"),
                });
                if old.push(Outbound::DisconnectAfter(farewell)).await.is_err() {
                    debug!(old = old_id, "previous connection already closing");
                }
            }
        }

        players.insert(profile.uuid, id);
        if let Some(handle) = self.get(id) {
            *handle.shared.profile.lock().expect("profile lock") = Some(profile.clone());
        }
        Ok(())
    }

    /// Enqueues `packet` for connection `id`, awaiting capacity.
    pub async fn send(&self, id: ConnectionId, packet: ClientboundPacket) -> Result<(), SendError> {
        match self.get(id) {
            Some(handle) => handle.send(packet).await,
            None => Err(SendError::Closed),
        }
    }

    /// Enqueues `packet` for every connection matching `predicate`.
    ///
    /// Ordering holds per connection for this caller; nothing is implied
    /// across connections.
    pub async fn broadcast(
        &self,
        predicate: impl Fn(&ConnectionHandle) -> bool,
        packet: ClientboundPacket,
    ) {
        let targets: Vec<ConnectionHandle> = {
            let connections = self.inner.connections.read().expect("connections lock");
            connections
                .values()
                .filter(|handle| predicate(handle))
                .cloned()
                .collect()
        };
        for handle in targets {
            if handle.send(packet.clone()).await.is_err() {
                warn!(id = handle.id, "broadcast target closed mid-send");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::OUTBOUND_QUEUE_DEPTH;

    fn test_handle(
        sessions: &SessionManager,
    ) -> (ConnectionHandle, mpsc::Receiver<Outbound>) {
        let id = sessions.next_id();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let shared = Arc::new(ConnectionShared::new(id, "127.0.0.1:0".parse().unwrap()));
        let handle = ConnectionHandle::new(id, shared.addr, tx, shared);
        (handle, rx)
    }

    fn profile(name: &str) -> GameProfile {
        GameProfile::new(crate::auth::offline_uuid(name), name)
    }

    #[tokio::test]
    async fn test_register_and_remove_round_trip() {
        let sessions = SessionManager::new(10);
        let (handle, _rx) = test_handle(&sessions);
        let id = handle.id;
        sessions.register(handle);
        assert_eq!(sessions.connection_count(), 1);
        assert!(sessions.get(id).is_some());

        assert!(sessions.remove(id).await.is_some());
        assert_eq!(sessions.connection_count(), 0);
        assert!(sessions.remove(id).await.is_none());
    }

    #[tokio::test]
    async fn test_bind_player_populates_index_and_profile() {
        let sessions = SessionManager::new(10);
        let (handle, _rx) = test_handle(&sessions);
        let id = handle.id;
        sessions.register(handle);

        sessions.bind_player(id, &profile("Alice")).await.unwrap();
        assert_eq!(sessions.player_count().await, 1);
        assert_eq!(sessions.profile_of(id).unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn test_duplicate_login_displaces_previous_connection() {
        let sessions = SessionManager::new(10);
        let (first, mut first_rx) = test_handle(&sessions);
        let (second, _second_rx) = test_handle(&sessions);
        let (first_id, second_id) = (first.id, second.id);
        sessions.register(first);
        sessions.register(second);

        let alice = profile("Alice");
        sessions.bind_player(first_id, &alice).await.unwrap();
        sessions.bind_player(second_id, &alice).await.unwrap();

        // The first connection got the eviction disconnect.
        match first_rx.recv().await {
            Some(Outbound::DisconnectAfter(ClientboundPacket::Play(
                ClientboundPlayPacket::Disconnect { reason },
            ))) => assert!(reason.0.contains("another location")),
            other => panic!("expected eviction disconnect, got {other:?}"),
        }

        // The index points at the second connection only.
        assert_eq!(sessions.player_count().await, 1);
        assert_eq!(sessions.profile_of(second_id).unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn test_capacity_refuses_new_player_but_not_relogin() {
        let sessions = SessionManager::new(1);
        let (first, _rx1) = test_handle(&sessions);
        let (second, _rx2) = test_handle(&sessions);
        let (third, _rx3) = test_handle(&sessions);
        let (first_id, second_id, third_id) = (first.id, second.id, third.id);
        sessions.register(first);
        sessions.register(second);
        sessions.register(third);

        sessions.bind_player(first_id, &profile("Alice")).await.unwrap();
        assert_eq!(
            sessions.bind_player(second_id, &profile("Bob")).await,
            Err(BindError::Capacity)
        );
        // The same player logging in again is a displacement, not growth.
        assert!(sessions.bind_player(third_id, &profile("Alice")).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_unbinds_player_index() {
        let sessions = SessionManager::new(10);
        let (handle, _rx) = test_handle(&sessions);
        let id = handle.id;
        sessions.register(handle);
        sessions.bind_player(id, &profile("Alice")).await.unwrap();

        sessions.remove(id).await;
        assert_eq!(sessions.player_count().await, 0);
    }

    #[tokio::test]
    async fn test_send_to_unknown_connection_is_closed() {
        let sessions = SessionManager::new(10);
        let packet = ClientboundPacket::Play(ClientboundPlayPacket::KeepAlive { id: 1 });
        assert_eq!(sessions.send(999, packet).await, Err(SendError::Closed));
    }

    #[tokio::test]
    async fn test_send_lossy_drops_when_queue_full() {
        let sessions = SessionManager::new(10);
        let (handle, mut rx) = test_handle(&sessions);

        let packet = ClientboundPacket::Play(ClientboundPlayPacket::KeepAlive { id: 1 });
        for _ in 0..OUTBOUND_QUEUE_DEPTH {
            assert!(handle.send_lossy(packet.clone()));
        }
        // Queue is at the bound now.
        assert!(!handle.send_lossy(packet.clone()));

        // Draining one slot restores lossy delivery.
        rx.recv().await.unwrap();
        assert!(handle.send_lossy(packet));
    }

    #[tokio::test]
    async fn test_broadcast_respects_predicate() {
        let sessions = SessionManager::new(10);
        let (a, mut a_rx) = test_handle(&sessions);
        let (b, mut b_rx) = test_handle(&sessions);
        let a_id = a.id;
        sessions.register(a);
        sessions.register(b);

        let packet = ClientboundPacket::Play(ClientboundPlayPacket::KeepAlive { id: 9 });
        sessions.broadcast(|handle| handle.id == a_id, packet).await;

        assert!(matches!(a_rx.recv().await, Some(Outbound::Packet(_))));
        assert!(b_rx.try_recv().is_err());
    }
}
