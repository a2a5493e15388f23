//! Transport layer error types.

use core::fmt;

use meshgate_core::{CryptoIdentity, RadioNodeId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("payload of {size} bytes needs {needed} fragments, limit is {max}")]
    PayloadTooLarge {
        size: usize,
        needed: usize,
        max: usize,
    },

    #[error("frame size {frame_size} leaves no room for a body after a {header}-byte header")]
    FrameSizeTooSmall { frame_size: usize, header: usize },

    #[error("fragment checksum mismatch: header says {expected:04x}, body hashes to {computed:04x}")]
    ChecksumMismatch { expected: u16, computed: u16 },

    #[error("fragment {sequence}/{total} disagrees with assembly of {expected} fragments")]
    InconsistentFragment {
        sequence: u8,
        total: u8,
        expected: u8,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslatorError {
    #[error(
        "mapping {crypto} <-> {radio} conflicts with existing mapping {existing_crypto} <-> {existing_radio}"
    )]
    MappingConflict {
        crypto: CryptoIdentity,
        radio: RadioNodeId,
        existing_crypto: CryptoIdentity,
        existing_radio: RadioNodeId,
    },
}

/// Structural rejection of a submission. Retrying the same request cannot help.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("message too large: {0}")]
    PayloadTooLarge(#[from] CodecError),

    #[error("gateway is holding {limit} messages; try again later")]
    QueueFull { limit: usize },

    #[error("destination is the gateway itself")]
    LocalDestination,

    #[error("payload is empty")]
    EmptyPayload,
}

/// Why a delivery attempt sequence gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionCause {
    RetriesExhausted,
    DeadlineExceeded,
    AddressUnresolved,
    AckTimeout,
}

impl fmt::Display for ExhaustionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustionCause::RetriesExhausted => write!(f, "every send attempt failed"),
            ExhaustionCause::DeadlineExceeded => {
                write!(f, "the delivery deadline passed while retrying")
            }
            ExhaustionCause::AddressUnresolved => {
                write!(f, "no route to the destination became known in time")
            }
            ExhaustionCause::AckTimeout => {
                write!(f, "the destination never acknowledged the message")
            }
        }
    }
}

/// Terminal failure reported to a submitter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    #[error("delivery failed after {attempts} attempt(s): {cause}")]
    DeliveryExhausted { attempts: u32, cause: ExhaustionCause },

    #[error("message could not be encoded for its route: {0}")]
    Encoding(CodecError),

    #[error("gateway shut down before the message was delivered")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::PayloadTooLarge {
            size: 9000,
            needed: 45,
            max: 32,
        };
        assert_eq!(
            err.to_string(),
            "payload of 9000 bytes needs 45 fragments, limit is 32"
        );

        let err = CodecError::ChecksumMismatch {
            expected: 0xbeef,
            computed: 0x1234,
        };
        assert_eq!(
            err.to_string(),
            "fragment checksum mismatch: header says beef, body hashes to 1234"
        );
    }

    #[test]
    fn test_router_error_from_codec_error() {
        let ce = CodecError::FrameSizeTooSmall {
            frame_size: 10,
            header: 19,
        };
        let re: RouterError = ce.into();
        assert!(matches!(re, RouterError::PayloadTooLarge(_)));
    }

    #[test]
    fn test_failure_reason_is_actionable_text() {
        let reason = FailureReason::DeliveryExhausted {
            attempts: 0,
            cause: ExhaustionCause::AddressUnresolved,
        };
        assert_eq!(
            reason.to_string(),
            "delivery failed after 0 attempt(s): no route to the destination became known in time"
        );
        assert_eq!(
            FailureReason::Shutdown.to_string(),
            "gateway shut down before the message was delivered"
        );
    }

    #[test]
    fn test_mapping_conflict_display() {
        let err = TranslatorError::MappingConflict {
            crypto: CryptoIdentity::new([0x11; 16]),
            radio: RadioNodeId::new(2),
            existing_crypto: CryptoIdentity::new([0x11; 16]),
            existing_radio: RadioNodeId::new(1),
        };
        assert_eq!(
            err.to_string(),
            "mapping 11111111111111111111111111111111 <-> !00000002 conflicts with existing mapping 11111111111111111111111111111111 <-> !00000001"
        );
    }
}
