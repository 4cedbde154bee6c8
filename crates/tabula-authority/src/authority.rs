//! Lock authority facade: room registry, connections and the lease sweeper

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tabula_api::{ClientMessage, DEFAULT_LEASE, ServerEvent};
use tabula_client::LockTransport;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::room::Room;

/// Per-connection event channel capacity.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for a `LockAuthority`.
#[derive(Clone, Debug)]
pub struct AuthorityConfig {
    /// Server-side lease granted with each lock; expired independently of
    /// client cooperation
    pub lease: Duration,
    /// How often the expiry sweeper runs
    pub sweep_interval: Duration,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            lease: DEFAULT_LEASE,
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// In-process lock authority serving any number of rooms.
///
/// Grants at most one active lock per element, denies conflicts to the
/// requesting connection only, and broadcasts every transition to all
/// participants currently in the room.
pub struct LockAuthority {
    config: AuthorityConfig,
    rooms: Arc<DashMap<String, Arc<Room>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl LockAuthority {
    pub fn new(config: AuthorityConfig) -> Self {
        let authority = Self {
            config,
            rooms: Arc::new(DashMap::new()),
            sweeper: Mutex::new(None),
        };
        authority.start_sweeper();
        authority
    }

    /// Connect a participant to a room.
    ///
    /// Returns the transport to hand to a `LockCoordinator` and the
    /// receiver carrying the room's lock events for this participant.
    pub fn connect(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> (Arc<AuthorityTransport>, mpsc::Receiver<ServerEvent>) {
        let room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Room::new(room_id)))
            .value()
            .clone();

        let connection_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        room.join(&connection_id, user_id, tx);

        info!(room_id, user_id, connection_id = %connection_id, "participant connected");

        let transport = Arc::new(AuthorityTransport {
            connection_id,
            room,
            lease: self.config.lease,
        });
        (transport, rx)
    }

    /// Detach a connection and release the locks its user held.
    ///
    /// Covers orderly socket teardown; a client that vanishes without
    /// disconnecting is handled by the lease sweeper instead.
    pub async fn disconnect(&self, room_id: &str, connection_id: &str) {
        let room = self.rooms.get(room_id).map(|r| r.value().clone());
        let Some(room) = room else { return };

        if let Some(participant) = room.leave(connection_id) {
            room.release_user_locks(&participant.user_id).await;
        }
    }

    /// Administratively revoke a lock. Idempotent; returns whether a lock
    /// was actually revoked.
    pub async fn force_unlock(&self, room_id: &str, element_id: &str, reason: &str) -> bool {
        let room = self.rooms.get(room_id).map(|r| r.value().clone());
        match room {
            Some(room) => room.force_unlock(element_id, reason).await,
            None => false,
        }
    }

    /// Stop the lease sweeper. Rooms and their state stay queryable.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }

    fn start_sweeper(&self) {
        let rooms = Arc::downgrade(&self.rooms);
        let interval = self.config.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(rooms) = rooms.upgrade() else { break };

                let room_list: Vec<Arc<Room>> = rooms.iter().map(|r| r.value().clone()).collect();
                for room in room_list {
                    let expired = room.sweep_expired().await;
                    if expired > 0 {
                        debug!(expired, "sweeper expired abandoned leases");
                    }
                }
            }
        });

        *self.sweeper.lock() = Some(handle);
    }
}

impl Default for LockAuthority {
    fn default() -> Self {
        Self::new(AuthorityConfig::default())
    }
}

impl Drop for LockAuthority {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Client-facing handle binding one connection to its room.
pub struct AuthorityTransport {
    connection_id: String,
    room: Arc<Room>,
    lease: Duration,
}

impl AuthorityTransport {
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }
}

#[async_trait]
impl LockTransport for AuthorityTransport {
    async fn send(&self, message: ClientMessage) -> tabula_client::Result<()> {
        self.room
            .handle_message(&self.connection_id, message, self.lease)
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_api::{ReleaseLock, RequestLock};

    fn request(room_id: &str, element_id: &str, user_id: &str) -> ClientMessage {
        ClientMessage::RequestLock(RequestLock {
            room_id: room_id.to_string(),
            element_id: element_id.to_string(),
            user_id: user_id.to_string(),
            username: format!("user-{user_id}"),
            color: "#123456".to_string(),
        })
    }

    fn release(room_id: &str, element_id: &str, user_id: &str, auto: bool) -> ClientMessage {
        ClientMessage::ReleaseLock(ReleaseLock {
            room_id: room_id.to_string(),
            element_id: element_id.to_string(),
            user_id: user_id.to_string(),
            is_auto_release: auto,
        })
    }

    #[tokio::test]
    async fn test_grant_broadcast_to_all_participants() {
        let authority = LockAuthority::default();
        let (alice, mut alice_rx) = authority.connect("room-1", "u-a");
        let (_bob, mut bob_rx) = authority.connect("room-1", "u-b");

        alice
            .send(request("room-1", "shape-1", "u-a"))
            .await
            .unwrap();

        for rx in [&mut alice_rx, &mut bob_rx] {
            match rx.recv().await.unwrap() {
                ServerEvent::LockGranted(granted) => {
                    assert_eq!(granted.element_id, "shape-1");
                    assert_eq!(granted.user_id, "u-a");
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_conflict_denied_to_requester_only() {
        let authority = LockAuthority::default();
        let (alice, mut alice_rx) = authority.connect("room-1", "u-a");
        let (bob, mut bob_rx) = authority.connect("room-1", "u-b");

        alice
            .send(request("room-1", "shape-1", "u-a"))
            .await
            .unwrap();
        alice_rx.recv().await.unwrap();
        bob_rx.recv().await.unwrap();

        bob.send(request("room-1", "shape-1", "u-b")).await.unwrap();

        match bob_rx.recv().await.unwrap() {
            ServerEvent::LockDenied(denied) => {
                assert_eq!(denied.element_id, "shape-1");
                assert_eq!(denied.reason, "locked");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        // The holder never hears about the denial.
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_regrant_by_holder_refreshes_lease() {
        let authority = LockAuthority::default();
        let (alice, mut alice_rx) = authority.connect("room-1", "u-a");

        alice
            .send(request("room-1", "shape-1", "u-a"))
            .await
            .unwrap();
        alice_rx.recv().await.unwrap();

        // Same holder requesting again gets a fresh grant, not a denial.
        alice
            .send(request("room-1", "shape-1", "u-a"))
            .await
            .unwrap();
        match alice_rx.recv().await.unwrap() {
            ServerEvent::LockGranted(granted) => assert_eq!(granted.user_id, "u-a"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stale_release_is_ignored() {
        let authority = LockAuthority::default();
        let (alice, mut alice_rx) = authority.connect("room-1", "u-a");
        let (bob, mut bob_rx) = authority.connect("room-1", "u-b");

        alice
            .send(request("room-1", "shape-1", "u-a"))
            .await
            .unwrap();
        alice_rx.recv().await.unwrap();
        bob_rx.recv().await.unwrap();

        // Bob never held the lock; his release must not unlock it.
        bob.send(release("room-1", "shape-1", "u-b", false))
            .await
            .unwrap();
        assert!(bob_rx.try_recv().is_err());

        // Releasing an already-unlocked element is equally silent.
        alice
            .send(release("room-1", "shape-2", "u-a", false))
            .await
            .unwrap();
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_release_broadcasts() {
        let authority = LockAuthority::default();
        let (alice, mut alice_rx) = authority.connect("room-1", "u-a");
        let (_bob, mut bob_rx) = authority.connect("room-1", "u-b");

        alice
            .send(request("room-1", "shape-1", "u-a"))
            .await
            .unwrap();
        alice_rx.recv().await.unwrap();
        bob_rx.recv().await.unwrap();

        alice
            .send(release("room-1", "shape-1", "u-a", false))
            .await
            .unwrap();
        match bob_rx.recv().await.unwrap() {
            ServerEvent::LockReleased(rel) => {
                assert_eq!(rel.element_id, "shape-1");
                assert!(!rel.is_auto_release);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_expires_abandoned_lease() {
        let authority = LockAuthority::new(AuthorityConfig {
            lease: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(1),
        });
        let (alice, mut alice_rx) = authority.connect("room-1", "u-a");
        let (_bob, mut bob_rx) = authority.connect("room-1", "u-b");

        alice
            .send(request("room-1", "shape-1", "u-a"))
            .await
            .unwrap();
        alice_rx.recv().await.unwrap();
        bob_rx.recv().await.unwrap();

        // Alice goes silent; the authority expires the lease on its own.
        tokio::time::advance(Duration::from_secs(32)).await;

        match bob_rx.recv().await.unwrap() {
            ServerEvent::LockReleased(rel) => {
                assert_eq!(rel.element_id, "shape-1");
                assert_eq!(rel.user_id, "u-a");
                assert!(rel.is_auto_release);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_force_unlock_broadcasts_and_is_idempotent() {
        let authority = LockAuthority::default();
        let (alice, mut alice_rx) = authority.connect("room-1", "u-a");

        alice
            .send(request("room-1", "shape-1", "u-a"))
            .await
            .unwrap();
        alice_rx.recv().await.unwrap();

        assert!(authority.force_unlock("room-1", "shape-1", "admin").await);
        match alice_rx.recv().await.unwrap() {
            ServerEvent::ForceUnlock(forced) => {
                assert_eq!(forced.element_id, "shape-1");
                assert_eq!(forced.reason, "admin");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // Nothing tracked anymore: revoking again is a silent no-op.
        assert!(!authority.force_unlock("room-1", "shape-1", "admin").await);
        assert!(alice_rx.try_recv().is_err());
        assert!(!authority.force_unlock("room-x", "shape-1", "admin").await);
    }

    #[tokio::test]
    async fn test_disconnect_releases_held_locks() {
        let authority = LockAuthority::default();
        let (alice, mut alice_rx) = authority.connect("room-1", "u-a");
        let (_bob, mut bob_rx) = authority.connect("room-1", "u-b");

        alice
            .send(request("room-1", "shape-1", "u-a"))
            .await
            .unwrap();
        alice_rx.recv().await.unwrap();
        bob_rx.recv().await.unwrap();

        authority
            .disconnect("room-1", alice.connection_id())
            .await;

        match bob_rx.recv().await.unwrap() {
            ServerEvent::LockReleased(rel) => {
                assert_eq!(rel.element_id, "shape-1");
                assert!(rel.is_auto_release);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
