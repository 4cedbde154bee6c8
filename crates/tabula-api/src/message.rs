//! Messages exchanged between clients and the lock authority
//!
//! Every message travels as a JSON envelope with an `event` tag and a
//! `payload` body. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// Message sent from a client to the room's lock authority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ClientMessage {
    RequestLock(RequestLock),
    ReleaseLock(ReleaseLock),
}

impl ClientMessage {
    /// The element this message refers to.
    pub fn element_id(&self) -> &str {
        match self {
            ClientMessage::RequestLock(m) => &m.element_id,
            ClientMessage::ReleaseLock(m) => &m.element_id,
        }
    }
}

/// Claim request for an exclusive, time-bounded lock on one element.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLock {
    pub room_id: String,
    pub element_id: String,
    pub user_id: String,
    pub username: String,
    pub color: String,
}

/// Release of a held lock.
///
/// `is_auto_release` is true when the release was emitted by the holder's
/// lease timer rather than an explicit user action.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseLock {
    pub room_id: String,
    pub element_id: String,
    pub user_id: String,
    pub is_auto_release: bool,
}

/// Event pushed from the lock authority to clients.
///
/// Grants, releases and force-unlocks are broadcast to every participant
/// in the room; denials are delivered to the requesting client only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ServerEvent {
    LockGranted(LockGranted),
    LockReleased(LockReleased),
    LockDenied(LockDenied),
    ForceUnlock(ForceUnlock),
}

impl ServerEvent {
    /// The element this event refers to.
    pub fn element_id(&self) -> &str {
        match self {
            ServerEvent::LockGranted(e) => &e.element_id,
            ServerEvent::LockReleased(e) => &e.element_id,
            ServerEvent::LockDenied(e) => &e.element_id,
            ServerEvent::ForceUnlock(e) => &e.element_id,
        }
    }
}

/// A lock was granted to `user_id`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockGranted {
    pub element_id: String,
    pub user_id: String,
    pub username: String,
    pub color: String,
}

/// A lock held by `user_id` was released.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockReleased {
    pub element_id: String,
    pub user_id: String,
    pub is_auto_release: bool,
}

/// A lock request was denied. Advisory only; denials never mutate
/// client-side lock state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockDenied {
    pub element_id: String,
    pub reason: String,
}

/// Administrative or expiry-driven revocation not initiated by the holder.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceUnlock {
    pub element_id: String,
    pub reason: String,
}
