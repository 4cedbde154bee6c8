//! Error types for the lock coordinator
//!
//! Denied requests, stale or duplicate events and conflicting grants are
//! protocol conditions, not errors; they are reconciled inside the
//! coordinator and never surface through this type.

/// Error type for lock coordinator operations
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("transport channel closed")]
    ChannelClosed,

    #[error("coordinator is closed")]
    Closed,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoordinatorError::ChannelClosed;
        assert_eq!(err.to_string(), "transport channel closed");

        let err = CoordinatorError::Closed;
        assert_eq!(err.to_string(), "coordinator is closed");

        let err: CoordinatorError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
    }
}
