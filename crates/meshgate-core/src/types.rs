//! Identity newtypes shared by both meshes.
//!
//! A crypto-mesh destination is a 16-byte truncated hash; a radio-mesh node is
//! a 32-bit node number. Keeping them as distinct types means a radio id can
//! never be passed where a crypto identity is expected.

use core::fmt;
use core::str::FromStr;

use sha2::{Digest, Sha256};

use crate::constants::{IDENTITY_LENGTH, RADIO_ID_LENGTH};
use crate::error::ParseAddressError;

fn fmt_hex(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

/// A crypto-mesh destination identity (first 128 bits of the destination hash).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use]
pub struct CryptoIdentity([u8; IDENTITY_LENGTH]);

impl CryptoIdentity {
    pub const fn new(bytes: [u8; IDENTITY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; IDENTITY_LENGTH] {
        self.0
    }
}

impl AsRef<[u8]> for CryptoIdentity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for CryptoIdentity {
    type Error = InvalidLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; IDENTITY_LENGTH] = bytes.try_into().map_err(|_| InvalidLength {
            expected: IDENTITY_LENGTH,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl FromStr for CryptoIdentity {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|_| ParseAddressError::InvalidHex(s.into()))?;
        CryptoIdentity::try_from(bytes.as_slice()).map_err(|e| ParseAddressError::InvalidLength {
            expected: e.expected,
            actual: e.actual,
        })
    }
}

impl fmt::Display for CryptoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(&self.0, f)
    }
}

impl fmt::Debug for CryptoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CryptoIdentity(")?;
        fmt_hex(&self.0[..4], f)?;
        write!(f, "..)")
    }
}

/// A radio-mesh node number.
///
/// Displayed the way radio firmware prints node ids: `!` followed by eight
/// lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use]
pub struct RadioNodeId(u32);

impl RadioNodeId {
    /// Radio-mesh broadcast address.
    pub const BROADCAST: RadioNodeId = RadioNodeId(0xFFFF_FFFF);

    pub const fn new(num: u32) -> Self {
        Self(num)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::BROADCAST.0
    }

    pub const fn to_be_bytes(self) -> [u8; RADIO_ID_LENGTH] {
        self.0.to_be_bytes()
    }
}

impl From<u32> for RadioNodeId {
    fn from(num: u32) -> Self {
        Self(num)
    }
}

impl FromStr for RadioNodeId {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed.strip_prefix('!') {
            Some(hex_part) => u32::from_str_radix(hex_part, 16),
            None => trimmed.parse::<u32>(),
        };
        parsed
            .map(RadioNodeId)
            .map_err(|_| ParseAddressError::InvalidNodeId(s.into()))
    }
}

impl fmt::Display for RadioNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{:08x}", self.0)
    }
}

impl fmt::Debug for RadioNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RadioNodeId(!{:08x})", self.0)
    }
}

/// Identifier of one logical message, stable across retransmissions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use]
pub struct MessageId(u32);

impl MessageId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Content-derived id: first four bytes of SHA-256(source ‖ destination ‖ payload).
    pub fn derive(source: &Address, destination: &Address, payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.to_bytes());
        hasher.update(destination.to_bytes());
        hasher.update(payload);
        let digest = hasher.finalize();
        Self(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({:08x})", self.0)
    }
}

/// One of the two bridged networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Network {
    CryptoMesh,
    RadioMesh,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::CryptoMesh, Network::RadioMesh];

    pub const fn opposite(self) -> Network {
        match self {
            Network::CryptoMesh => Network::RadioMesh,
            Network::RadioMesh => Network::CryptoMesh,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Network::CryptoMesh => "crypto_mesh",
            Network::RadioMesh => "radio_mesh",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source or destination on either mesh.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Address {
    Crypto(CryptoIdentity),
    Radio(RadioNodeId),
}

impl Address {
    /// The network this address is native to.
    pub const fn network(&self) -> Network {
        match self {
            Address::Crypto(_) => Network::CryptoMesh,
            Address::Radio(_) => Network::RadioMesh,
        }
    }

    pub const fn is_crypto(&self) -> bool {
        matches!(self, Address::Crypto(_))
    }

    /// Number of bytes this address occupies in a frame header.
    pub const fn encoded_len(&self) -> usize {
        match self {
            Address::Crypto(_) => IDENTITY_LENGTH,
            Address::Radio(_) => RADIO_ID_LENGTH,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Address::Crypto(c) => c.as_ref().to_vec(),
            Address::Radio(r) => r.to_be_bytes().to_vec(),
        }
    }
}

impl From<CryptoIdentity> for Address {
    fn from(id: CryptoIdentity) -> Self {
        Address::Crypto(id)
    }
}

impl From<RadioNodeId> for Address {
    fn from(id: RadioNodeId) -> Self {
        Address::Radio(id)
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    /// `!xxxxxxxx` or a decimal number parses as a radio node; 32 hex digits
    /// parse as a crypto identity.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let decimal = !trimmed.is_empty()
            && trimmed.len() < IDENTITY_LENGTH * 2
            && trimmed.bytes().all(|b| b.is_ascii_digit());
        if trimmed.starts_with('!') || decimal {
            return trimmed.parse::<RadioNodeId>().map(Address::Radio);
        }
        trimmed.parse::<CryptoIdentity>().map(Address::Crypto)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Crypto(c) => fmt::Display::fmt(c, f),
            Address::Radio(r) => fmt::Display::fmt(r, f),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Crypto(c) => write!(f, "{c:?}"),
            Address::Radio(r) => write!(f, "{r:?}"),
        }
    }
}

/// Error returned when a byte slice has the wrong length for a newtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLength {
    pub expected: usize,
    pub actual: usize,
}

impl fmt::Display for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid length: expected {} bytes, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for InvalidLength {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_identity_try_from_invalid() {
        let err = CryptoIdentity::try_from([3u8; 15].as_ref()).unwrap_err();
        assert_eq!(err.expected, 16);
        assert_eq!(err.actual, 15);
    }

    #[test]
    fn test_crypto_identity_display_and_parse() {
        let id = CryptoIdentity::new([
            0x65, 0x0b, 0x5d, 0x76, 0xb6, 0xbe, 0xc0, 0x39, 0x0d, 0x1f, 0x8c, 0xfc, 0xa5, 0xbd,
            0x33, 0xf9,
        ]);
        let text = format!("{id}");
        assert_eq!(text, "650b5d76b6bec0390d1f8cfca5bd33f9");
        assert_eq!(text.parse::<CryptoIdentity>().unwrap(), id);
        assert_eq!(format!("{id:?}"), "CryptoIdentity(650b5d76..)");
    }

    #[test]
    fn test_crypto_identity_parse_errors() {
        assert!(matches!(
            "zz".parse::<CryptoIdentity>(),
            Err(ParseAddressError::InvalidHex(_))
        ));
        assert_eq!(
            "abcd".parse::<CryptoIdentity>(),
            Err(ParseAddressError::InvalidLength {
                expected: 16,
                actual: 2
            })
        );
    }

    #[test]
    fn test_radio_node_id_display_and_parse() {
        let id = RadioNodeId::new(0xdeadbeef);
        assert_eq!(format!("{id}"), "!deadbeef");
        assert_eq!("!deadbeef".parse::<RadioNodeId>().unwrap(), id);
        assert_eq!("42".parse::<RadioNodeId>().unwrap(), RadioNodeId::new(42));
        assert!("!xyz".parse::<RadioNodeId>().is_err());
        assert!(RadioNodeId::BROADCAST.is_broadcast());
    }

    #[test]
    fn test_address_parse_picks_network() {
        assert_eq!(
            "!0000002a".parse::<Address>().unwrap(),
            Address::Radio(RadioNodeId::new(42))
        );
        assert_eq!(
            "1234".parse::<Address>().unwrap(),
            Address::Radio(RadioNodeId::new(1234))
        );
        let crypto = "00112233445566778899aabbccddeeff".parse::<Address>().unwrap();
        assert_eq!(crypto.network(), Network::CryptoMesh);
        assert_eq!(crypto.encoded_len(), 16);
    }

    #[test]
    fn test_message_id_derive_is_stable() {
        let src = Address::Radio(RadioNodeId::new(1));
        let dst = Address::Crypto(CryptoIdentity::new([7; 16]));
        let a = MessageId::derive(&src, &dst, b"hello");
        let b = MessageId::derive(&src, &dst, b"hello");
        let c = MessageId::derive(&src, &dst, b"hellp");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_network_opposite() {
        assert_eq!(Network::CryptoMesh.opposite(), Network::RadioMesh);
        assert_eq!(Network::RadioMesh.opposite(), Network::CryptoMesh);
        assert_eq!(Network::RadioMesh.to_string(), "radio_mesh");
    }
}
