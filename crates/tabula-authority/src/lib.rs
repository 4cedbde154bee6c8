//! Tabula Authority - in-process reference arbiter for lock coordination
//!
//! The authority is the single source of truth for lock state in a room:
//! it grants at most one active lock per element, denies conflicting
//! requests (to the requester only), expires abandoned leases on its own
//! schedule, and broadcasts every transition to all room participants.
//!
//! This implementation is embeddable and in-process. It backs the
//! integration test suite and serves as the executable form of the
//! collaborator contract clients are written against.

pub mod authority;
mod room;

pub use authority::{AuthorityConfig, AuthorityTransport, LockAuthority};
