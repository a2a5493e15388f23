//! Gateway frame wire format.
//!
//! Every frame exchanged with an adapter is self-describing so that the
//! receiver can reassemble fragments arriving out of order:
//!
//! ```text
//! version:u8 | kind:u8 | flags:u8 | message_id:u32 | sequence:u8 | total:u8 |
//! checksum:u16 | source | destination | body
//! ```
//!
//! Addresses are 16 bytes for a crypto identity and 4 bytes (big-endian) for
//! a radio node, selected by the flag bits. The checksum covers the body only.

use crate::checksum::crc16;
use crate::constants::{
    FIXED_HEADER_SIZE, FLAG_DEST_CRYPTO, FLAG_MASK, FLAG_SOURCE_CRYPTO, FLAG_WANT_ACK,
    FRAME_VERSION, HEADER_MINSIZE, IDENTITY_LENGTH, MAX_FRAGMENTS_LIMIT, RADIO_ID_LENGTH,
};
use crate::error::FrameError;
use crate::types::{Address, CryptoIdentity, MessageId, RadioNodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    Data = 0,
    Ack = 1,
    Announce = 2,
}

impl TryFrom<u8> for FrameKind {
    type Error = FrameError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(FrameKind::Data),
            1 => Ok(FrameKind::Ack),
            2 => Ok(FrameKind::Announce),
            other => Err(FrameError::InvalidKind(other)),
        }
    }
}

/// One gateway frame: a fragment of a data message, an ack, or an announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub want_ack: bool,
    pub message_id: MessageId,
    pub sequence: u8,
    pub total: u8,
    pub checksum: u16,
    pub source: Address,
    pub destination: Address,
    pub body: Vec<u8>,
}

impl Frame {
    /// Build a data fragment, computing its checksum.
    pub fn data(
        message_id: MessageId,
        sequence: u8,
        total: u8,
        source: Address,
        destination: Address,
        body: Vec<u8>,
    ) -> Self {
        Frame {
            kind: FrameKind::Data,
            want_ack: false,
            message_id,
            sequence,
            total,
            checksum: crc16(&body),
            source,
            destination,
            body,
        }
    }

    /// Build an ack for `message_id`, sent from `source` back to `destination`.
    pub fn ack(message_id: MessageId, source: Address, destination: Address) -> Self {
        Frame {
            kind: FrameKind::Ack,
            want_ack: false,
            message_id,
            sequence: 0,
            total: 1,
            checksum: crc16(&[]),
            source,
            destination,
            body: Vec::new(),
        }
    }

    /// Build an announce frame carrying an encoded announce body.
    pub fn announce(
        message_id: MessageId,
        source: Address,
        destination: Address,
        body: Vec<u8>,
    ) -> Self {
        Frame {
            kind: FrameKind::Announce,
            want_ack: false,
            message_id,
            sequence: 0,
            total: 1,
            checksum: crc16(&body),
            source,
            destination,
            body,
        }
    }

    #[must_use]
    pub fn with_want_ack(mut self, want_ack: bool) -> Self {
        self.want_ack = want_ack;
        self
    }

    /// Header length for a given address pair.
    pub const fn header_len(source: &Address, destination: &Address) -> usize {
        FIXED_HEADER_SIZE + source.encoded_len() + destination.encoded_len()
    }

    pub fn encoded_len(&self) -> usize {
        Self::header_len(&self.source, &self.destination) + self.body.len()
    }

    pub fn verify_checksum(&self) -> bool {
        crc16(&self.body) == self.checksum
    }

    fn flags_byte(&self) -> u8 {
        let mut flags = 0u8;
        if self.source.is_crypto() {
            flags |= FLAG_SOURCE_CRYPTO;
        }
        if self.destination.is_crypto() {
            flags |= FLAG_DEST_CRYPTO;
        }
        if self.want_ack {
            flags |= FLAG_WANT_ACK;
        }
        flags
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(FRAME_VERSION);
        out.push(self.kind as u8);
        out.push(self.flags_byte());
        out.extend_from_slice(&self.message_id.get().to_be_bytes());
        out.push(self.sequence);
        out.push(self.total);
        out.extend_from_slice(&self.checksum.to_be_bytes());
        out.extend_from_slice(&self.source.to_bytes());
        out.extend_from_slice(&self.destination.to_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    /// Parse a frame from wire bytes.
    ///
    /// The body checksum is carried through but not verified here; callers
    /// decide whether a mismatch drops the frame.
    pub fn decode(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() < HEADER_MINSIZE {
            return Err(FrameError::TooShort {
                min: HEADER_MINSIZE,
                actual: raw.len(),
            });
        }
        if raw[0] != FRAME_VERSION {
            return Err(FrameError::UnsupportedVersion(raw[0]));
        }
        let kind = FrameKind::try_from(raw[1])?;
        let flags = raw[2];
        if flags & !FLAG_MASK != 0 {
            return Err(FrameError::InvalidFlags(flags));
        }
        let message_id = MessageId::new(u32::from_be_bytes([raw[3], raw[4], raw[5], raw[6]]));
        let sequence = raw[7];
        let total = raw[8];
        if total == 0 || sequence >= total || usize::from(total) > MAX_FRAGMENTS_LIMIT {
            return Err(FrameError::InvalidFragmentIndex { sequence, total });
        }
        let checksum = u16::from_be_bytes([raw[9], raw[10]]);

        let mut offset = FIXED_HEADER_SIZE;
        let source = read_address(raw, &mut offset, flags & FLAG_SOURCE_CRYPTO != 0)?;
        let destination = read_address(raw, &mut offset, flags & FLAG_DEST_CRYPTO != 0)?;

        Ok(Frame {
            kind,
            want_ack: flags & FLAG_WANT_ACK != 0,
            message_id,
            sequence,
            total,
            checksum,
            source,
            destination,
            body: raw[offset..].to_vec(),
        })
    }
}

fn read_address(raw: &[u8], offset: &mut usize, crypto: bool) -> Result<Address, FrameError> {
    let len = if crypto { IDENTITY_LENGTH } else { RADIO_ID_LENGTH };
    let end = *offset + len;
    let bytes = raw.get(*offset..end).ok_or(FrameError::TooShort {
        min: end,
        actual: raw.len(),
    })?;
    *offset = end;
    let address = if crypto {
        let id = CryptoIdentity::try_from(bytes).map_err(|_| FrameError::TooShort {
            min: end,
            actual: raw.len(),
        })?;
        Address::Crypto(id)
    } else {
        Address::Radio(RadioNodeId::new(u32::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ])))
    };
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HEADER_MAXSIZE;

    fn radio(n: u32) -> Address {
        Address::Radio(RadioNodeId::new(n))
    }

    fn crypto(b: u8) -> Address {
        Address::Crypto(CryptoIdentity::new([b; 16]))
    }

    #[test]
    fn test_header_sizes() {
        assert_eq!(Frame::header_len(&radio(1), &radio(2)), 19);
        assert_eq!(Frame::header_len(&crypto(1), &radio(2)), 31);
        assert_eq!(Frame::header_len(&crypto(1), &crypto(2)), HEADER_MAXSIZE);
    }

    #[test]
    fn test_encode_layout() {
        let frame = Frame::data(
            MessageId::new(0x0102_0304),
            1,
            3,
            radio(0xAABB_CCDD),
            crypto(0x11),
            vec![9, 8, 7],
        )
        .with_want_ack(true);
        let raw = frame.encode();
        assert_eq!(raw[0], FRAME_VERSION);
        assert_eq!(raw[1], FrameKind::Data as u8);
        assert_eq!(raw[2], FLAG_DEST_CRYPTO | FLAG_WANT_ACK);
        assert_eq!(&raw[3..7], &[1, 2, 3, 4]);
        assert_eq!(raw[7], 1);
        assert_eq!(raw[8], 3);
        assert_eq!(&raw[11..15], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(&raw[15..31], &[0x11; 16]);
        assert_eq!(&raw[31..], &[9, 8, 7]);
        assert_eq!(raw.len(), frame.encoded_len());
    }

    #[test]
    fn test_decode_matches_encode() {
        let frame = Frame::data(MessageId::new(7), 0, 1, crypto(3), radio(4), b"hi".to_vec());
        let decoded = Frame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
        assert!(decoded.verify_checksum());
    }

    #[test]
    fn test_decode_keeps_bad_checksum() {
        let frame = Frame::data(MessageId::new(7), 0, 1, radio(3), radio(4), b"hi".to_vec());
        let mut raw = frame.encode();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let decoded = Frame::decode(&raw).unwrap();
        assert!(!decoded.verify_checksum());
    }

    #[test]
    fn test_decode_too_short() {
        let err = Frame::decode(&[1u8; 10]).unwrap_err();
        assert_eq!(err, FrameError::TooShort { min: 19, actual: 10 });
    }

    #[test]
    fn test_decode_truncated_crypto_address() {
        let frame = Frame::ack(MessageId::new(1), crypto(1), crypto(2));
        let raw = frame.encode();
        let err = Frame::decode(&raw[..30]).unwrap_err();
        assert!(matches!(err, FrameError::TooShort { min: 43, .. }));
    }

    #[test]
    fn test_decode_rejects_bad_header_fields() {
        let mut raw = Frame::ack(MessageId::new(1), radio(1), radio(2)).encode();
        raw[0] = 9;
        assert_eq!(Frame::decode(&raw), Err(FrameError::UnsupportedVersion(9)));
        raw[0] = FRAME_VERSION;
        raw[1] = 7;
        assert_eq!(Frame::decode(&raw), Err(FrameError::InvalidKind(7)));
        raw[1] = 0;
        raw[2] = 0x80;
        assert_eq!(Frame::decode(&raw), Err(FrameError::InvalidFlags(0x80)));
        raw[2] = 0;
        raw[7] = 1;
        raw[8] = 1;
        assert_eq!(
            Frame::decode(&raw),
            Err(FrameError::InvalidFragmentIndex {
                sequence: 1,
                total: 1
            })
        );
        raw[7] = 0;
        raw[8] = 0;
        assert!(Frame::decode(&raw).is_err());
    }
}
