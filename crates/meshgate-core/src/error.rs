//! Error types for the meshgate-core crate.

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    TooShort { min: usize, actual: usize },
    UnsupportedVersion(u8),
    InvalidKind(u8),
    InvalidFlags(u8),
    InvalidFragmentIndex { sequence: u8, total: u8 },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooShort { min, actual } => {
                write!(f, "frame too short: need at least {min} bytes, got {actual}")
            }
            FrameError::UnsupportedVersion(v) => write!(f, "unsupported frame version: {v}"),
            FrameError::InvalidKind(v) => write!(f, "invalid frame kind: {v}"),
            FrameError::InvalidFlags(v) => write!(f, "invalid frame flags: 0x{v:02x}"),
            FrameError::InvalidFragmentIndex { sequence, total } => {
                write!(f, "invalid fragment index {sequence} of {total}")
            }
        }
    }
}

impl std::error::Error for FrameError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    MissingDelimiter,
    IncompleteEscape,
    InvalidEscapeSequence(u8),
    FrameTooLarge { max: usize, actual: usize },
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::MissingDelimiter => write!(f, "missing frame delimiter"),
            FramingError::IncompleteEscape => write!(f, "incomplete escape sequence"),
            FramingError::InvalidEscapeSequence(v) => {
                write!(f, "invalid escape sequence: 0x{v:02x}")
            }
            FramingError::FrameTooLarge { max, actual } => {
                write!(f, "frame too large for stream framing: max {max}, got {actual}")
            }
        }
    }
}

impl std::error::Error for FramingError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceError {
    TooShort { min: usize, actual: usize },
    NoIdentity,
    InvalidDisplayName,
    TrailingBytes(usize),
}

impl fmt::Display for AnnounceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnounceError::TooShort { min, actual } => {
                write!(
                    f,
                    "announce body too short: need at least {min} bytes, got {actual}"
                )
            }
            AnnounceError::NoIdentity => {
                write!(f, "announce carries neither a crypto identity nor a radio node id")
            }
            AnnounceError::InvalidDisplayName => write!(f, "announce display name is not UTF-8"),
            AnnounceError::TrailingBytes(n) => write!(f, "{n} trailing bytes after announce body"),
        }
    }
}

impl std::error::Error for AnnounceError {}

/// Failure to parse a textual address (config files, CLI, UI input).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAddressError {
    InvalidHex(String),
    InvalidLength { expected: usize, actual: usize },
    InvalidNodeId(String),
}

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAddressError::InvalidHex(s) => {
                write!(f, "'{s}' is not a hex crypto identity")
            }
            ParseAddressError::InvalidLength { expected, actual } => {
                write!(
                    f,
                    "crypto identity must be {expected} bytes ({} hex chars), got {actual} bytes",
                    expected * 2
                )
            }
            ParseAddressError::InvalidNodeId(s) => {
                write!(
                    f,
                    "'{s}' is not a radio node id (expected '!xxxxxxxx' or a decimal number)"
                )
            }
        }
    }
}

impl std::error::Error for ParseAddressError {}
