//! Wire-format sizes and protocol defaults.

/// Current gateway frame version.
pub const FRAME_VERSION: u8 = 1;

/// Length of a crypto-mesh identity (truncated destination hash).
pub const IDENTITY_LENGTH: usize = 16;

/// Length of a radio-mesh node number on the wire.
pub const RADIO_ID_LENGTH: usize = 4;

/// Fixed part of the frame header: version, kind, flags, message id,
/// sequence, total, checksum.
pub const FIXED_HEADER_SIZE: usize = 1 + 1 + 1 + 4 + 1 + 1 + 2;

/// Smallest possible header (two radio addresses).
pub const HEADER_MINSIZE: usize = FIXED_HEADER_SIZE + 2 * RADIO_ID_LENGTH;

/// Largest possible header (two crypto identities).
pub const HEADER_MAXSIZE: usize = FIXED_HEADER_SIZE + 2 * IDENTITY_LENGTH;

/// Default radio-mesh frame size, header included.
pub const DEFAULT_RADIO_FRAME_SIZE: usize = 220;

/// Crypto-mesh daemon MTU.
pub const DEFAULT_CRYPTO_FRAME_SIZE: usize = 500;

/// Default cap on fragments per message.
pub const DEFAULT_MAX_FRAGMENTS: usize = 32;

/// Hard cap imposed by the single-byte sequence/total fields.
pub const MAX_FRAGMENTS_LIMIT: usize = u8::MAX as usize;

/// Maximum display name carried in an announce body.
pub const MAX_DISPLAY_NAME: usize = 64;

// Flag bits
pub const FLAG_SOURCE_CRYPTO: u8 = 0x01;
pub const FLAG_DEST_CRYPTO: u8 = 0x02;
pub const FLAG_WANT_ACK: u8 = 0x04;
pub const FLAG_MASK: u8 = FLAG_SOURCE_CRYPTO | FLAG_DEST_CRYPTO | FLAG_WANT_ACK;
