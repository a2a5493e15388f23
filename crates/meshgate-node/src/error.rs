//! Error types for the gateway runtime.

use meshgate_interfaces::AdapterError;
use meshgate_transport::RouterError;

/// Errors raised while configuring, starting or stopping a gateway.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
    #[error("gateway not started")]
    NotStarted,
    #[error("gateway already running")]
    AlreadyRunning,
}

/// Errors returned to API callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("message rejected: {0}")]
    Rejected(#[from] RouterError),
    #[error("gateway is shutting down")]
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_text_is_actionable() {
        let err = GatewayError::from(RouterError::QueueFull { limit: 8 });
        assert_eq!(
            err.to_string(),
            "message rejected: gateway is holding 8 messages; try again later"
        );
        assert_eq!(GatewayError::Stopped.to_string(), "gateway is shutting down");
    }

    #[test]
    fn config_error_display() {
        let err = NodeError::Config("unknown framing \"slip\"".into());
        assert_eq!(
            err.to_string(),
            "configuration error: unknown framing \"slip\""
        );
    }
}
