//! Coordinator configuration

use std::time::Duration;

use tabula_api::DEFAULT_LEASE;

/// Configuration for a `LockCoordinator`.
///
/// One coordinator serves exactly one connected session in one room.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Room the session participates in
    pub room_id: String,
    /// Local actor identity
    pub user_id: String,
    /// Display name shown to other participants
    pub username: String,
    /// Presence color shown to other participants
    pub color: String,
    /// Lease duration for self-owned locks; on expiry without renewal the
    /// coordinator emits an automatic release
    pub lease: Duration,
}

impl CoordinatorConfig {
    /// Create a configuration for the given room with a random actor id.
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            ..Default::default()
        }
    }

    pub fn with_identity(
        mut self,
        user_id: impl Into<String>,
        username: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        self.user_id = user_id.into();
        self.username = username.into();
        self.color = color.into();
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            room_id: "default".to_string(),
            user_id: uuid::Uuid::new_v4().to_string(),
            username: "anonymous".to_string(),
            color: "#888888".to_string(),
            lease: DEFAULT_LEASE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.room_id, "default");
        assert_eq!(config.username, "anonymous");
        assert_eq!(config.lease, DEFAULT_LEASE);
        assert!(!config.user_id.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = CoordinatorConfig::new("room-7")
            .with_identity("u-1", "alice", "#ff0000")
            .with_lease(Duration::from_secs(10));

        assert_eq!(config.room_id, "room-7");
        assert_eq!(config.user_id, "u-1");
        assert_eq!(config.username, "alice");
        assert_eq!(config.color, "#ff0000");
        assert_eq!(config.lease, Duration::from_secs(10));
    }

    #[test]
    fn test_config_random_identity_is_unique() {
        let a = CoordinatorConfig::new("room");
        let b = CoordinatorConfig::new("room");
        assert_ne!(a.user_id, b.user_id);
    }
}
