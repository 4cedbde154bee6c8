//! Lock event listener trait and notification types

use tabula_api::LockInfo;

/// Notification delivered to listeners after the coordinator has
/// reconciled an authority event into local state.
#[derive(Clone, Debug)]
pub enum LockEvent {
    /// A lock was granted (to anyone in the room).
    Granted(LockInfo),
    /// A lock was released by its holder or by lease expiry.
    Released {
        element_id: String,
        user_id: String,
        is_auto_release: bool,
    },
    /// The local actor's request was denied. Advisory; no state changed.
    Denied { element_id: String, reason: String },
    /// A lock was revoked without the holder's release call.
    ForceUnlocked { element_id: String, reason: String },
}

/// Trait for receiving lock change notifications.
///
/// Implement this to reflect lock ownership in a UI layer. Denials reach
/// the caller only through this surface.
pub trait LockEventListener: Send + Sync + 'static {
    fn on_event(&self, event: LockEvent);
}

/// A simple listener that invokes a closure.
pub struct FnLockEventListener<F>
where
    F: Fn(LockEvent) + Send + Sync + 'static,
{
    f: F,
}

impl<F> FnLockEventListener<F>
where
    F: Fn(LockEvent) + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> LockEventListener for FnLockEventListener<F>
where
    F: Fn(LockEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: LockEvent) {
        (self.f)(event);
    }
}
