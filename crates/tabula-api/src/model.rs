//! Shared lock model types and protocol constants

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::LockGranted;

/// Default lease duration for a granted lock.
///
/// Clients rearm their lease timer on renewal; the authority expires
/// abandoned leases on its own schedule as the correctness backstop.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(30);

/// Deny reason when the element is already locked by another participant.
pub const REASON_LOCKED: &str = "locked";

/// A currently granted lock on one shared element.
///
/// Replaced wholesale on re-grant, never partially mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    pub element_id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub owner_color: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    /// Build a lock record from a grant event, stamped with the local
    /// receive time.
    pub fn from_grant(grant: &LockGranted) -> Self {
        Self {
            element_id: grant.element_id.clone(),
            owner_id: grant.user_id.clone(),
            owner_name: grant.username.clone(),
            owner_color: grant.color.clone(),
            acquired_at: Utc::now(),
        }
    }

    /// Check whether the given actor owns this lock.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}
