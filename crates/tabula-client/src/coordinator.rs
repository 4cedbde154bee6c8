//! Client-side lock coordinator
//!
//! Maintains the local view of every lock known in the room and the subset
//! owned by the local actor, arms one lease timer per self-owned element,
//! and reconciles authority-pushed events into local state.
//!
//! State is private to one coordinator instance (one per connected
//! session). The authority-delivered order of transitions is authoritative
//! even when it contradicts local call order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tabula_api::{ClientMessage, LockInfo, ReleaseLock, RequestLock, ServerEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::listener::{LockEvent, LockEventListener};
use crate::transport::LockTransport;

/// Result of a `request_lock` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A claim was sent to the authority. This is an attempt-accepted
    /// signal, not a grant; local state changes only when the grant or
    /// denial event arrives.
    Requested,
    /// The element was already owned locally; the lease timer was reset
    /// without a network round-trip.
    Renewed,
}

/// Armed single-shot lease timer for one self-owned element.
///
/// An entry in the owned-lock map exists iff its timer is armed, so timer
/// bookkeeping can never drift from ownership bookkeeping.
struct LeaseHandle {
    task: JoinHandle<()>,
}

impl LeaseHandle {
    fn cancel(&self) {
        self.task.abort();
    }
}

/// Client-side lock coordinator for one room session.
pub struct LockCoordinator {
    inner: Arc<CoordinatorInner>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    transport: Arc<dyn LockTransport>,
    /// Every lock this client has been told about, keyed by element id
    locked_objects: DashMap<String, LockInfo>,
    /// Elements the local actor believes it owns, each with its armed
    /// lease timer
    my_locks: DashMap<String, LeaseHandle>,
    listeners: RwLock<Vec<Arc<dyn LockEventListener>>>,
    closed: AtomicBool,
    /// Self-handle for lease tasks; weak so an armed timer never keeps a
    /// torn-down coordinator alive
    weak_self: Weak<CoordinatorInner>,
}

impl LockCoordinator {
    /// Create a coordinator over the given transport.
    ///
    /// Call `start_dispatch` with the authority event receiver to begin
    /// reconciliation, or feed events directly via `handle_event`.
    pub fn new(config: CoordinatorConfig, transport: Arc<dyn LockTransport>) -> Self {
        Self {
            inner: Arc::new_cyclic(|weak| CoordinatorInner {
                config,
                transport,
                locked_objects: DashMap::new(),
                my_locks: DashMap::new(),
                listeners: RwLock::new(Vec::new()),
                closed: AtomicBool::new(false),
                weak_self: weak.clone(),
            }),
            dispatch: Mutex::new(None),
        }
    }

    /// Spawn the event pump feeding authority events into reconciliation.
    ///
    /// The task ends when the channel closes or the coordinator is closed.
    pub fn start_dispatch(&self, mut events: mpsc::Receiver<ServerEvent>) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if inner.is_closed() {
                    break;
                }
                inner.handle_event(event);
            }
            debug!("lock event dispatch ended");
        });

        if let Some(prev) = self.dispatch.lock().replace(handle) {
            prev.abort();
        }
    }

    /// Register a listener for lock change notifications.
    pub fn add_listener(&self, listener: Arc<dyn LockEventListener>) {
        self.inner.listeners.write().push(listener);
    }

    /// Claim an exclusive lock on the element, or renew an owned one.
    pub async fn request_lock(&self, element_id: &str) -> Result<RequestOutcome> {
        if self.inner.is_closed() {
            return Err(CoordinatorError::Closed);
        }

        if self.inner.my_locks.contains_key(element_id) {
            self.inner.arm_lease(element_id);
            debug!(element_id, "lease renewed locally");
            return Ok(RequestOutcome::Renewed);
        }

        let config = &self.inner.config;
        let msg = ClientMessage::RequestLock(RequestLock {
            room_id: config.room_id.clone(),
            element_id: element_id.to_string(),
            user_id: config.user_id.clone(),
            username: config.username.clone(),
            color: config.color.clone(),
        });
        self.inner.transport.send(msg).await?;

        debug!(element_id, "lock requested");
        Ok(RequestOutcome::Requested)
    }

    /// Release an owned lock. No-op if the element is not locally owned.
    ///
    /// The local claim is dropped optimistically; send failures are
    /// absorbed because the authority expires abandoned leases on its own.
    pub async fn release_lock(&self, element_id: &str) {
        if self.inner.is_closed() {
            return;
        }
        self.inner.release(element_id, false).await;
    }

    /// Release every element the local actor owns.
    pub async fn release_all_locks(&self) {
        if self.inner.is_closed() {
            return;
        }
        self.inner.release_all().await;
    }

    /// Whether any participant holds a lock on the element.
    pub fn is_locked(&self, element_id: &str) -> bool {
        self.inner.locked_objects.contains_key(element_id)
    }

    /// Whether the local actor holds the lock on the element.
    pub fn is_locked_by_me(&self, element_id: &str) -> bool {
        self.inner.my_locks.contains_key(element_id)
    }

    /// The cached lock record for the element, if any.
    pub fn get_lock_info(&self, element_id: &str) -> Option<LockInfo> {
        self.inner
            .locked_objects
            .get(element_id)
            .map(|e| e.clone())
    }

    /// Element ids of every lock known in the room.
    pub fn locked_elements(&self) -> Vec<String> {
        self.inner
            .locked_objects
            .iter()
            .map(|e| e.key().clone())
            .collect()
    }

    /// Element ids the local actor currently owns.
    pub fn owned_elements(&self) -> Vec<String> {
        self.inner.my_locks.iter().map(|e| e.key().clone()).collect()
    }

    /// Reconcile one authority event into local state.
    ///
    /// Exposed for wirings that pump events themselves instead of using
    /// `start_dispatch`.
    pub fn handle_event(&self, event: ServerEvent) {
        if self.inner.is_closed() {
            return;
        }
        self.inner.handle_event(event);
    }

    /// Tear the coordinator down: release every owned lock, cancel all
    /// lease timers and stop the event pump. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.release_all().await;

        if let Some(handle) = self.dispatch.lock().take() {
            handle.abort();
        }

        info!(room_id = %self.inner.config.room_id, "lock coordinator closed");
    }
}

impl Drop for LockCoordinator {
    fn drop(&mut self) {
        // `close()` is the proper teardown; this only stops the pump when
        // the owner forgot to call it.
        if let Some(handle) = self.dispatch.lock().take() {
            handle.abort();
        }
    }
}

impl CoordinatorInner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Arm (or rearm) the lease timer for an element the local actor owns.
    /// Any previous timer for the element is cancelled before the new one
    /// is armed, so two timers never reference the same element.
    fn arm_lease(&self, element_id: &str) {
        if let Some((_, prev)) = self.my_locks.remove(element_id) {
            prev.cancel();
        }

        let weak = self.weak_self.clone();
        let id = element_id.to_string();
        let lease = self.config.lease;
        let task = tokio::spawn(async move {
            tokio::time::sleep(lease).await;
            if let Some(inner) = weak.upgrade() {
                debug!(element_id = %id, "lease expired without renewal, auto-releasing");
                inner.release(&id, true).await;
            }
        });

        self.my_locks
            .insert(element_id.to_string(), LeaseHandle { task });
    }

    /// Drop the local claim on an element and notify the authority.
    async fn release(&self, element_id: &str, is_auto_release: bool) {
        let Some((_, lease)) = self.my_locks.remove(element_id) else {
            return;
        };
        if !is_auto_release {
            // The auto path runs inside the lease task itself; aborting it
            // here would cancel the release send below.
            lease.cancel();
        }

        self.locked_objects.remove(element_id);

        let msg = ClientMessage::ReleaseLock(ReleaseLock {
            room_id: self.config.room_id.clone(),
            element_id: element_id.to_string(),
            user_id: self.config.user_id.clone(),
            is_auto_release,
        });
        if let Err(e) = self.transport.send(msg).await {
            warn!(element_id, error = %e, "failed to send lock release");
        } else {
            debug!(element_id, is_auto_release, "lock released");
        }
    }

    async fn release_all(&self) {
        let owned: Vec<String> = self.my_locks.iter().map(|e| e.key().clone()).collect();
        for element_id in owned {
            self.release(&element_id, false).await;
        }
    }

    fn handle_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::LockGranted(granted) => {
                let info = LockInfo::from_grant(&granted);
                self.locked_objects
                    .insert(granted.element_id.clone(), info.clone());

                if granted.user_id == self.config.user_id {
                    self.arm_lease(&granted.element_id);
                    debug!(element_id = %granted.element_id, "lock granted to self");
                } else if let Some((_, lease)) = self.my_locks.remove(&granted.element_id) {
                    // Conflicting late grant: the authority's view wins
                    // over our optimistic ownership.
                    lease.cancel();
                    warn!(
                        element_id = %granted.element_id,
                        owner = %granted.user_id,
                        "lock re-granted to another participant, dropping local claim"
                    );
                }

                self.notify(LockEvent::Granted(info));
            }
            ServerEvent::LockReleased(released) => {
                self.locked_objects.remove(&released.element_id);

                if released.user_id == self.config.user_id
                    && let Some((_, lease)) = self.my_locks.remove(&released.element_id)
                {
                    lease.cancel();
                }

                debug!(
                    element_id = %released.element_id,
                    user_id = %released.user_id,
                    "lock released"
                );
                self.notify(LockEvent::Released {
                    element_id: released.element_id,
                    user_id: released.user_id,
                    is_auto_release: released.is_auto_release,
                });
            }
            ServerEvent::LockDenied(denied) => {
                // Advisory only; a denial leaves the element untracked.
                debug!(
                    element_id = %denied.element_id,
                    reason = %denied.reason,
                    "lock denied"
                );
                self.notify(LockEvent::Denied {
                    element_id: denied.element_id,
                    reason: denied.reason,
                });
            }
            ServerEvent::ForceUnlock(forced) => {
                self.locked_objects.remove(&forced.element_id);
                if let Some((_, lease)) = self.my_locks.remove(&forced.element_id) {
                    lease.cancel();
                    warn!(
                        element_id = %forced.element_id,
                        reason = %forced.reason,
                        "owned lock was force-unlocked"
                    );
                }

                self.notify(LockEvent::ForceUnlocked {
                    element_id: forced.element_id,
                    reason: forced.reason,
                });
            }
        }
    }

    fn notify(&self, event: LockEvent) {
        let listeners: Vec<Arc<dyn LockEventListener>> =
            self.listeners.read().iter().cloned().collect();
        for listener in listeners {
            listener.on_event(event.clone());
        }
    }
}

impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        for entry in self.my_locks.iter() {
            entry.value().cancel();
        }
    }
}
