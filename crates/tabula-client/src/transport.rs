//! Transport seam between the coordinator and the room's lock authority
//!
//! The coordinator only ever fires messages at the link; it never awaits a
//! reply in-band. Grants, denials and releases come back asynchronously as
//! `ServerEvent`s on a separate receiver. No delivery guarantee is assumed
//! from the link — the authority's independent lease expiry covers drops.

use async_trait::async_trait;
use tabula_api::ClientMessage;
use tokio::sync::mpsc;

use crate::error::{CoordinatorError, Result};

/// Outbound half of the bidirectional messaging link to the authority.
#[async_trait]
pub trait LockTransport: Send + Sync + 'static {
    /// Send a message toward the authority. Fire-and-forget.
    async fn send(&self, message: ClientMessage) -> Result<()>;
}

/// In-process transport backed by a bounded channel.
///
/// Used by tests and by in-process wiring against an embedded authority.
pub struct ChannelTransport {
    tx: mpsc::Sender<ClientMessage>,
}

impl ChannelTransport {
    /// Create a transport and the receiver for the messages it carries.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ClientMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl LockTransport for ChannelTransport {
    async fn send(&self, message: ClientMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)
    }
}
