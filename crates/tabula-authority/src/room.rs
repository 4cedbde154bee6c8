//! Per-room lock arbitration and participant registry

use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tabula_api::{
    ClientMessage, ForceUnlock, LockDenied, LockGranted, LockReleased, REASON_LOCKED, ReleaseLock,
    RequestLock, ServerEvent,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// An active grant held server-side, with its lease deadline.
pub(crate) struct GrantedLock {
    pub user_id: String,
    pub username: String,
    pub color: String,
    pub deadline: Instant,
}

pub(crate) struct Participant {
    pub user_id: String,
    pub events: mpsc::Sender<ServerEvent>,
}

/// One collaborative room: its lock table and connected participants.
pub(crate) struct Room {
    room_id: String,
    /// key = element id; at most one active grant per element
    locks: DashMap<String, GrantedLock>,
    /// key = connection id
    participants: DashMap<String, Participant>,
}

impl Room {
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            locks: DashMap::new(),
            participants: DashMap::new(),
        }
    }

    pub fn join(&self, connection_id: &str, user_id: &str, events: mpsc::Sender<ServerEvent>) {
        self.participants.insert(
            connection_id.to_string(),
            Participant {
                user_id: user_id.to_string(),
                events,
            },
        );
        debug!(room_id = %self.room_id, connection_id, user_id, "participant joined");
    }

    pub fn leave(&self, connection_id: &str) -> Option<Participant> {
        let left = self.participants.remove(connection_id).map(|(_, p)| p);
        if left.is_some() {
            debug!(room_id = %self.room_id, connection_id, "participant left");
        }
        left
    }

    pub async fn handle_message(
        &self,
        connection_id: &str,
        message: ClientMessage,
        lease: Duration,
    ) {
        match message {
            ClientMessage::RequestLock(req) => {
                if req.room_id != self.room_id {
                    warn!(
                        room_id = %self.room_id,
                        requested = %req.room_id,
                        "lock request for a different room, ignoring"
                    );
                    return;
                }
                self.handle_request(connection_id, req, lease).await;
            }
            ClientMessage::ReleaseLock(rel) => self.handle_release(rel).await,
        }
    }

    async fn handle_request(&self, connection_id: &str, req: RequestLock, lease: Duration) {
        let now = Instant::now();
        let granted = match self.locks.entry(req.element_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let lock = occupied.get_mut();
                // A re-request by the current holder refreshes the lease;
                // an expired grant is treated as free.
                if lock.user_id == req.user_id || lock.deadline <= now {
                    *lock = Self::grant_for(&req, now + lease);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Self::grant_for(&req, now + lease));
                true
            }
        };

        if granted {
            debug!(
                room_id = %self.room_id,
                element_id = %req.element_id,
                user_id = %req.user_id,
                "lock granted"
            );
            self.broadcast(ServerEvent::LockGranted(LockGranted {
                element_id: req.element_id,
                user_id: req.user_id,
                username: req.username,
                color: req.color,
            }))
            .await;
        } else {
            debug!(
                room_id = %self.room_id,
                element_id = %req.element_id,
                user_id = %req.user_id,
                "lock denied"
            );
            self.send_to(
                connection_id,
                ServerEvent::LockDenied(LockDenied {
                    element_id: req.element_id,
                    reason: REASON_LOCKED.to_string(),
                }),
            )
            .await;
        }
    }

    async fn handle_release(&self, rel: ReleaseLock) {
        // Stale releases (wrong owner, already unlocked) are dropped.
        if self
            .locks
            .remove_if(&rel.element_id, |_, lock| lock.user_id == rel.user_id)
            .is_none()
        {
            return;
        }

        debug!(
            room_id = %self.room_id,
            element_id = %rel.element_id,
            user_id = %rel.user_id,
            is_auto_release = rel.is_auto_release,
            "lock released"
        );
        self.broadcast(ServerEvent::LockReleased(LockReleased {
            element_id: rel.element_id,
            user_id: rel.user_id,
            is_auto_release: rel.is_auto_release,
        }))
        .await;
    }

    /// Expire every overdue grant, broadcasting an automatic release for
    /// each. Returns the number of leases expired.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let overdue: Vec<(String, String)> = self
            .locks
            .iter()
            .filter(|entry| entry.deadline <= now)
            .map(|entry| (entry.key().clone(), entry.user_id.clone()))
            .collect();

        let mut expired = 0;
        for (element_id, user_id) in overdue {
            if self
                .locks
                .remove_if(&element_id, |_, lock| lock.deadline <= now)
                .is_none()
            {
                continue;
            }
            expired += 1;
            warn!(
                room_id = %self.room_id,
                element_id = %element_id,
                user_id = %user_id,
                "lease expired server-side"
            );
            self.broadcast(ServerEvent::LockReleased(LockReleased {
                element_id,
                user_id,
                is_auto_release: true,
            }))
            .await;
        }
        expired
    }

    /// Revoke a lock without the holder's cooperation. Idempotent.
    pub async fn force_unlock(&self, element_id: &str, reason: &str) -> bool {
        if self.locks.remove(element_id).is_none() {
            return false;
        }

        self.broadcast(ServerEvent::ForceUnlock(ForceUnlock {
            element_id: element_id.to_string(),
            reason: reason.to_string(),
        }))
        .await;
        true
    }

    /// Release every lock held by the given user (disconnect path).
    pub async fn release_user_locks(&self, user_id: &str) {
        let held: Vec<String> = self
            .locks
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.key().clone())
            .collect();

        for element_id in held {
            if self
                .locks
                .remove_if(&element_id, |_, lock| lock.user_id == user_id)
                .is_none()
            {
                continue;
            }
            self.broadcast(ServerEvent::LockReleased(LockReleased {
                element_id,
                user_id: user_id.to_string(),
                is_auto_release: true,
            }))
            .await;
        }
    }

    async fn broadcast(&self, event: ServerEvent) {
        let senders: Vec<mpsc::Sender<ServerEvent>> = self
            .participants
            .iter()
            .map(|p| p.events.clone())
            .collect();

        for sender in senders {
            // A closed receiver just means the participant is gone.
            let _ = sender.send(event.clone()).await;
        }
    }

    async fn send_to(&self, connection_id: &str, event: ServerEvent) {
        let sender = self
            .participants
            .get(connection_id)
            .map(|p| p.events.clone());
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    fn grant_for(req: &RequestLock, deadline: Instant) -> GrantedLock {
        GrantedLock {
            user_id: req.user_id.clone(),
            username: req.username.clone(),
            color: req.color.clone(),
            deadline,
        }
    }
}
