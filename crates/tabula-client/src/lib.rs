//! Tabula Client - lock coordination SDK for collaborative rooms
//!
//! This crate provides:
//! - `LockCoordinator`, the client-side view of every lock in a room and
//!   the subset owned by the local actor
//! - Per-element lease timers with automatic release on expiry
//! - Reconciliation of authority-pushed lock events into local state
//! - A transport seam (`LockTransport`) so the coordinator stays agnostic
//!   of the messaging link carrying the protocol
//!
//! The authority is the single source of truth: whatever it broadcasts is
//! accepted unconditionally, even when it contradicts an optimistic local
//! assumption.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod listener;
pub mod transport;

pub use config::CoordinatorConfig;
pub use coordinator::{LockCoordinator, RequestOutcome};
pub use error::{CoordinatorError, Result};
pub use listener::{FnLockEventListener, LockEvent, LockEventListener};
pub use transport::{ChannelTransport, LockTransport};
