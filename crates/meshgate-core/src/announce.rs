//! Presence announcements.
//!
//! An announce frame body tells the gateway which identities a node owns.
//! Nodes on the crypto mesh announce a destination identity, radio nodes
//! announce their node number, and bridge-aware nodes announce both at once.
//!
//! # Body layout
//!
//! ```text
//! tag(1) [+ crypto(16)] [+ radio(4)] [+ quality(2)] + name_len(1) + name
//! ```
//!
//! Tag bit 0 marks a crypto identity, bit 1 a radio node id, bit 2 a link
//! quality sample (SNR in hundredths of a dB, signed big-endian).

use crate::constants::{IDENTITY_LENGTH, MAX_DISPLAY_NAME, RADIO_ID_LENGTH};
use crate::error::AnnounceError;
use crate::types::{CryptoIdentity, RadioNodeId};

const TAG_CRYPTO: u8 = 0x01;
const TAG_RADIO: u8 = 0x02;
const TAG_QUALITY: u8 = 0x04;

/// Which identities an announce carries, with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnounceEvent {
    Crypto {
        identity: CryptoIdentity,
        display_name: String,
        link_quality: Option<f32>,
    },
    Radio {
        node: RadioNodeId,
        display_name: String,
        link_quality: Option<f32>,
    },
    Bridged {
        identity: CryptoIdentity,
        node: RadioNodeId,
        display_name: String,
        link_quality: Option<f32>,
    },
}

impl AnnounceEvent {
    pub fn crypto_identity(&self) -> Option<CryptoIdentity> {
        match self {
            AnnounceEvent::Crypto { identity, .. } | AnnounceEvent::Bridged { identity, .. } => {
                Some(*identity)
            }
            AnnounceEvent::Radio { .. } => None,
        }
    }

    pub fn radio_node(&self) -> Option<RadioNodeId> {
        match self {
            AnnounceEvent::Radio { node, .. } | AnnounceEvent::Bridged { node, .. } => Some(*node),
            AnnounceEvent::Crypto { .. } => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            AnnounceEvent::Crypto { display_name, .. }
            | AnnounceEvent::Radio { display_name, .. }
            | AnnounceEvent::Bridged { display_name, .. } => display_name,
        }
    }

    pub fn link_quality(&self) -> Option<f32> {
        match self {
            AnnounceEvent::Crypto { link_quality, .. }
            | AnnounceEvent::Radio { link_quality, .. }
            | AnnounceEvent::Bridged { link_quality, .. } => *link_quality,
        }
    }

    pub fn is_bridged(&self) -> bool {
        matches!(self, AnnounceEvent::Bridged { .. })
    }

    /// Replace the link quality, e.g. with the SNR the adapter measured on receipt.
    #[must_use]
    pub fn with_link_quality(mut self, quality: Option<f32>) -> Self {
        match &mut self {
            AnnounceEvent::Crypto { link_quality, .. }
            | AnnounceEvent::Radio { link_quality, .. }
            | AnnounceEvent::Bridged { link_quality, .. } => *link_quality = quality,
        }
        self
    }

    /// Assemble an event from optional parts; `None` if neither identity is present.
    pub fn from_parts(
        identity: Option<CryptoIdentity>,
        node: Option<RadioNodeId>,
        display_name: String,
        link_quality: Option<f32>,
    ) -> Option<Self> {
        match (identity, node) {
            (Some(identity), Some(node)) => Some(AnnounceEvent::Bridged {
                identity,
                node,
                display_name,
                link_quality,
            }),
            (Some(identity), None) => Some(AnnounceEvent::Crypto {
                identity,
                display_name,
                link_quality,
            }),
            (None, Some(node)) => Some(AnnounceEvent::Radio {
                node,
                display_name,
                link_quality,
            }),
            (None, None) => None,
        }
    }

    /// Encode the announce body. Names longer than the limit are cut at a
    /// character boundary.
    pub fn encode(&self) -> Vec<u8> {
        let name = truncate_name(self.display_name());
        let mut tag = 0u8;
        if self.crypto_identity().is_some() {
            tag |= TAG_CRYPTO;
        }
        if self.radio_node().is_some() {
            tag |= TAG_RADIO;
        }
        if self.link_quality().is_some() {
            tag |= TAG_QUALITY;
        }

        let mut out = Vec::with_capacity(1 + IDENTITY_LENGTH + RADIO_ID_LENGTH + 3 + name.len());
        out.push(tag);
        if let Some(identity) = self.crypto_identity() {
            out.extend_from_slice(identity.as_ref());
        }
        if let Some(node) = self.radio_node() {
            out.extend_from_slice(&node.to_be_bytes());
        }
        if let Some(quality) = self.link_quality() {
            out.extend_from_slice(&quality_to_centi(quality).to_be_bytes());
        }
        out.push(name.len() as u8);
        out.extend_from_slice(name.as_bytes());
        out
    }

    pub fn decode(body: &[u8]) -> Result<Self, AnnounceError> {
        let mut reader = Reader { body, offset: 0 };
        let tag = reader.take(1)?[0];

        let identity = if tag & TAG_CRYPTO != 0 {
            let bytes = reader.take(IDENTITY_LENGTH)?;
            let mut arr = [0u8; IDENTITY_LENGTH];
            arr.copy_from_slice(bytes);
            Some(CryptoIdentity::new(arr))
        } else {
            None
        };
        let node = if tag & TAG_RADIO != 0 {
            let b = reader.take(RADIO_ID_LENGTH)?;
            Some(RadioNodeId::new(u32::from_be_bytes([b[0], b[1], b[2], b[3]])))
        } else {
            None
        };
        let link_quality = if tag & TAG_QUALITY != 0 {
            let b = reader.take(2)?;
            Some(f32::from(i16::from_be_bytes([b[0], b[1]])) / 100.0)
        } else {
            None
        };
        let name_len = usize::from(reader.take(1)?[0]);
        let name_bytes = reader.take(name_len)?;
        let display_name = core::str::from_utf8(name_bytes)
            .map_err(|_| AnnounceError::InvalidDisplayName)?
            .to_string();

        let trailing = body.len() - reader.offset;
        if trailing > 0 {
            return Err(AnnounceError::TrailingBytes(trailing));
        }

        AnnounceEvent::from_parts(identity, node, display_name, link_quality)
            .ok_or(AnnounceError::NoIdentity)
    }
}

struct Reader<'a> {
    body: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], AnnounceError> {
        let end = self.offset + n;
        let slice = self.body.get(self.offset..end).ok_or(AnnounceError::TooShort {
            min: end,
            actual: self.body.len(),
        })?;
        self.offset = end;
        Ok(slice)
    }
}

fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_DISPLAY_NAME {
        return name;
    }
    let mut end = MAX_DISPLAY_NAME;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

fn quality_to_centi(quality: f32) -> i16 {
    (quality * 100.0)
        .round()
        .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridged_roundtrip() {
        let event = AnnounceEvent::Bridged {
            identity: CryptoIdentity::new([0x42; 16]),
            node: RadioNodeId::new(0x1234_5678),
            display_name: "base camp".into(),
            link_quality: Some(-7.25),
        };
        let body = event.encode();
        assert_eq!(body[0], TAG_CRYPTO | TAG_RADIO | TAG_QUALITY);
        assert_eq!(body.len(), 1 + 16 + 4 + 2 + 1 + 9);
        assert_eq!(AnnounceEvent::decode(&body).unwrap(), event);
    }

    #[test]
    fn test_radio_only_without_quality() {
        let event = AnnounceEvent::Radio {
            node: RadioNodeId::new(9),
            display_name: String::new(),
            link_quality: None,
        };
        let body = event.encode();
        assert_eq!(body, vec![TAG_RADIO, 0, 0, 0, 9, 0]);
        let decoded = AnnounceEvent::decode(&body).unwrap();
        assert_eq!(decoded.radio_node(), Some(RadioNodeId::new(9)));
        assert_eq!(decoded.crypto_identity(), None);
        assert!(!decoded.is_bridged());
    }

    #[test]
    fn test_no_identity_rejected() {
        assert_eq!(
            AnnounceEvent::decode(&[0, 0]),
            Err(AnnounceError::NoIdentity)
        );
    }

    #[test]
    fn test_truncated_body_rejected() {
        let err = AnnounceEvent::decode(&[TAG_CRYPTO, 1, 2, 3]).unwrap_err();
        assert_eq!(err, AnnounceError::TooShort { min: 17, actual: 4 });
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        assert_eq!(
            AnnounceEvent::decode(&[TAG_RADIO, 0, 0, 0, 1, 0, 0xAA]),
            Err(AnnounceError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_invalid_utf8_name() {
        assert_eq!(
            AnnounceEvent::decode(&[TAG_RADIO, 0, 0, 0, 1, 2, 0xFF, 0xFE]),
            Err(AnnounceError::InvalidDisplayName)
        );
    }

    #[test]
    fn test_long_name_truncated_on_char_boundary() {
        let event = AnnounceEvent::Crypto {
            identity: CryptoIdentity::new([1; 16]),
            display_name: "é".repeat(40),
            link_quality: None,
        };
        let decoded = AnnounceEvent::decode(&event.encode()).unwrap();
        assert_eq!(decoded.display_name(), "é".repeat(32));
    }
}
