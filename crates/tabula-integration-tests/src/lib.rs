//! Shared harness for end-to-end lock coordination scenarios
//!
//! Wires `LockCoordinator` instances to an embedded `LockAuthority`
//! through the in-process transport, one coordinator per simulated
//! participant.

use std::sync::Arc;
use std::time::Duration;

use tabula_authority::{AuthorityTransport, LockAuthority};
use tabula_client::{CoordinatorConfig, LockCoordinator};

/// A connected participant: its coordinator plus the raw connection
/// handle (needed to simulate socket-level disconnects).
pub struct Participant {
    pub coordinator: LockCoordinator,
    pub transport: Arc<AuthorityTransport>,
}

/// Connect a participant to a room and start its event pump.
pub fn connect_participant(
    authority: &LockAuthority,
    room_id: &str,
    user_id: &str,
    lease: Duration,
) -> Participant {
    let (transport, events) = authority.connect(room_id, user_id);
    let config = CoordinatorConfig::new(room_id)
        .with_identity(user_id, format!("user-{user_id}"), "#336699")
        .with_lease(lease);

    let coordinator = LockCoordinator::new(config, transport.clone());
    coordinator.start_dispatch(events);

    Participant {
        coordinator,
        transport,
    }
}

/// Let in-flight messages and events drain.
///
/// Scenario tests run with a paused clock, so this advances simulated
/// time deterministically instead of really sleeping.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
