//! Error types for the adapter layer.

use meshgate_core::FramingError;

/// Errors that can occur during adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    #[error("adapter not connected")]
    NotConnected,
    #[error("adapter stopped")]
    Stopped,
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("transmit failed: {0}")]
    TransmitFailed(String),
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AdapterError {
    /// Whether a later attempt on the same adapter could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdapterError::Io(_)
                | AdapterError::NotConnected
                | AdapterError::Timeout(_)
                | AdapterError::TransmitFailed(_)
                | AdapterError::ReceiveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display_variants() {
        let io_err = AdapterError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "broken pipe",
        ));
        assert!(io_err.to_string().contains("I/O error"));

        assert_eq!(AdapterError::NotConnected.to_string(), "adapter not connected");
        assert_eq!(AdapterError::Stopped.to_string(), "adapter stopped");

        let timeout = AdapterError::Timeout(Duration::from_secs(5));
        assert!(timeout.to_string().contains("5s"));

        let tx = AdapterError::TransmitFailed("buffer full".into());
        assert!(tx.to_string().contains("buffer full"));

        let cfg = AdapterError::Configuration("bad target".into());
        assert!(cfg.to_string().contains("configuration error"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: AdapterError = io_err.into();
        assert!(matches!(err, AdapterError::Io(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(AdapterError::NotConnected.is_transient());
        assert!(AdapterError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!AdapterError::Stopped.is_transient());
        assert!(!AdapterError::Configuration("x".into()).is_transient());
        assert!(!AdapterError::Framing(FramingError::MissingDelimiter).is_transient());
    }
}
