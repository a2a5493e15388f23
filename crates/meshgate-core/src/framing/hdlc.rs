//! HDLC byte-stuffing framing.
//!
//! Used on links to the crypto-mesh daemon. ESC bytes must be escaped before
//! FLAG bytes.

use crate::error::FramingError;

pub const FLAG: u8 = 0x7E;
pub const ESC: u8 = 0x7D;
pub const ESC_MASK: u8 = 0x20;

/// Escape special bytes in data using HDLC byte-stuffing.
pub fn hdlc_escape(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    for &byte in data {
        match byte {
            ESC | FLAG => {
                result.push(ESC);
                result.push(byte ^ ESC_MASK);
            }
            _ => result.push(byte),
        }
    }
    result
}

/// Frame data with HDLC delimiters: FLAG + escape(data) + FLAG.
pub fn hdlc_frame(data: &[u8]) -> Vec<u8> {
    let escaped = hdlc_escape(data);
    let mut framed = Vec::with_capacity(escaped.len() + 2);
    framed.push(FLAG);
    framed.extend_from_slice(&escaped);
    framed.push(FLAG);
    framed
}

/// Unescape the bytes between two FLAG delimiters.
pub fn hdlc_unescape(inner: &[u8]) -> Result<Vec<u8>, FramingError> {
    let mut result = Vec::with_capacity(inner.len());
    let mut bytes = inner.iter();
    while let Some(&byte) = bytes.next() {
        if byte == ESC {
            let &next = bytes.next().ok_or(FramingError::IncompleteEscape)?;
            let unescaped = next ^ ESC_MASK;
            if unescaped != ESC && unescaped != FLAG {
                return Err(FramingError::InvalidEscapeSequence(next));
            }
            result.push(unescaped);
        } else {
            result.push(byte);
        }
    }
    Ok(result)
}

/// Remove HDLC framing: strip delimiters and unescape data.
pub fn hdlc_unframe(framed: &[u8]) -> Result<Vec<u8>, FramingError> {
    if framed.len() < 2 || framed[0] != FLAG || framed[framed.len() - 1] != FLAG {
        return Err(FramingError::MissingDelimiter);
    }
    hdlc_unescape(&framed[1..framed.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_vectors() {
        assert_eq!(hdlc_escape(&[0x01, 0x7E, 0x02]), vec![0x01, 0x7D, 0x5E, 0x02]);
        assert_eq!(hdlc_escape(&[0x7D]), vec![0x7D, 0x5D]);
        assert_eq!(hdlc_frame(&[]), vec![FLAG, FLAG]);
    }

    #[test]
    fn test_hdlc_roundtrip() {
        let data = vec![0x00, 0x7D, 0x7E, 0xFF, 0x7D, 0x7E, 0x01];
        let framed = hdlc_frame(&data);
        assert!(!framed[1..framed.len() - 1].contains(&FLAG));
        assert_eq!(hdlc_unframe(&framed).unwrap(), data);
    }

    #[test]
    fn test_hdlc_missing_delimiter() {
        assert_eq!(hdlc_unframe(&[]), Err(FramingError::MissingDelimiter));
        assert_eq!(hdlc_unframe(&[FLAG]), Err(FramingError::MissingDelimiter));
        assert_eq!(hdlc_unframe(&[0x00, FLAG]), Err(FramingError::MissingDelimiter));
    }

    #[test]
    fn test_hdlc_incomplete_escape() {
        assert_eq!(
            hdlc_unframe(&[FLAG, ESC, FLAG]),
            Err(FramingError::IncompleteEscape)
        );
    }

    #[test]
    fn test_hdlc_invalid_escape() {
        assert_eq!(
            hdlc_unescape(&[ESC, 0x00]),
            Err(FramingError::InvalidEscapeSequence(0x00))
        );
    }
}
