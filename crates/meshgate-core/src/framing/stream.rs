//! Length-prefixed stream framing used by radio-mesh firmware on serial and
//! TCP links: `0x94 0xC3 len_hi len_lo payload`.

use crate::error::FramingError;

pub const START1: u8 = 0x94;
pub const START2: u8 = 0xC3;
pub const STREAM_HEADER_SIZE: usize = 4;

/// Largest payload accepted on the stream; anything declaring more is treated
/// as line noise.
pub const MAX_STREAM_PAYLOAD: usize = 4096;

pub fn stream_frame(data: &[u8]) -> Result<Vec<u8>, FramingError> {
    if data.len() > MAX_STREAM_PAYLOAD {
        return Err(FramingError::FrameTooLarge {
            max: MAX_STREAM_PAYLOAD,
            actual: data.len(),
        });
    }
    let mut out = Vec::with_capacity(STREAM_HEADER_SIZE + data.len());
    out.push(START1);
    out.push(START2);
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
    Ok(out)
}

/// Parse exactly one framed payload.
pub fn stream_unframe(framed: &[u8]) -> Result<Vec<u8>, FramingError> {
    if framed.len() < STREAM_HEADER_SIZE || framed[0] != START1 || framed[1] != START2 {
        return Err(FramingError::MissingDelimiter);
    }
    let declared = usize::from(u16::from_be_bytes([framed[2], framed[3]]));
    if declared > MAX_STREAM_PAYLOAD {
        return Err(FramingError::FrameTooLarge {
            max: MAX_STREAM_PAYLOAD,
            actual: declared,
        });
    }
    let payload = &framed[STREAM_HEADER_SIZE..];
    if payload.len() != declared {
        return Err(FramingError::MissingDelimiter);
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let framed = stream_frame(&[0xAA; 300]).unwrap();
        assert_eq!(&framed[..4], &[0x94, 0xC3, 0x01, 0x2C]);
        assert_eq!(framed.len(), 304);
        assert_eq!(stream_unframe(&framed).unwrap(), vec![0xAA; 300]);
    }

    #[test]
    fn test_too_large_rejected() {
        assert_eq!(
            stream_frame(&vec![0u8; MAX_STREAM_PAYLOAD + 1]),
            Err(FramingError::FrameTooLarge {
                max: MAX_STREAM_PAYLOAD,
                actual: MAX_STREAM_PAYLOAD + 1
            })
        );
    }

    #[test]
    fn test_bad_header_and_length() {
        assert_eq!(
            stream_unframe(&[0x94, 0x00, 0, 0]),
            Err(FramingError::MissingDelimiter)
        );
        assert_eq!(
            stream_unframe(&[0x94, 0xC3, 0, 3, 1]),
            Err(FramingError::MissingDelimiter)
        );
    }
}
