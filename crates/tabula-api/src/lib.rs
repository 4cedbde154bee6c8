//! Tabula API - wire protocol definitions for lock coordination
//!
//! This crate provides:
//! - Client-to-authority messages (`request-lock`, `release-lock`)
//! - Authority-to-client events (`lock-granted`, `lock-released`,
//!   `lock-denied`, `force-unlock`)
//! - The `LockInfo` record cached by clients for every granted lock

pub mod message;
pub mod model;

pub use message::*;
pub use model::*;
