//! Streaming frame accumulators for byte-stream transports.
//!
//! Two framings are supported: HDLC (`0x7E` delimited, byte-stuffed) as used
//! by crypto-mesh daemons, and the radio firmware's length-prefixed stream
//! framing (`0x94 0xC3 len_hi len_lo`). Both accumulators buffer partial
//! input across reads and yield every complete frame they can find.

use meshgate_core::FramingError;
use meshgate_core::constants::HEADER_MINSIZE;
use meshgate_core::framing::hdlc::{FLAG, hdlc_frame, hdlc_unescape};
use meshgate_core::framing::stream::{
    MAX_STREAM_PAYLOAD, START1, START2, STREAM_HEADER_SIZE, stream_frame,
};

/// Which byte-stream framing an adapter uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFraming {
    #[default]
    Hdlc,
    Stream,
}

impl StreamFraming {
    /// Wrap one gateway frame for the wire.
    pub fn frame(self, data: &[u8]) -> Result<Vec<u8>, FramingError> {
        match self {
            StreamFraming::Hdlc => Ok(hdlc_frame(data)),
            StreamFraming::Stream => stream_frame(data),
        }
    }

    pub fn accumulator(self) -> FrameAccumulator {
        match self {
            StreamFraming::Hdlc => FrameAccumulator::Hdlc(Vec::with_capacity(4096)),
            StreamFraming::Stream => FrameAccumulator::Stream(Vec::with_capacity(4096)),
        }
    }
}

/// Stateful buffer that extracts complete frames from a byte stream.
///
/// Frames shorter than the smallest gateway header are discarded; they can
/// only be keepalives or noise.
#[derive(Debug)]
pub enum FrameAccumulator {
    Hdlc(Vec<u8>),
    Stream(Vec<u8>),
}

impl FrameAccumulator {
    /// Feed new data from the stream and extract all complete frames.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        match self {
            FrameAccumulator::Hdlc(buffer) => feed_hdlc(buffer, data),
            FrameAccumulator::Stream(buffer) => feed_stream(buffer, data),
        }
    }

    /// Bytes currently held waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        match self {
            FrameAccumulator::Hdlc(b) | FrameAccumulator::Stream(b) => b.len(),
        }
    }
}

fn feed_hdlc(buffer: &mut Vec<u8>, data: &[u8]) -> Vec<Vec<u8>> {
    buffer.extend_from_slice(data);
    let mut frames = Vec::new();

    while let Some(frame_start) = buffer.iter().position(|&b| b == FLAG) {
        let Some(offset) = buffer[frame_start + 1..].iter().position(|&b| b == FLAG) else {
            // Nothing before the opening flag can ever complete.
            buffer.drain(..frame_start);
            break;
        };
        let frame_end = frame_start + 1 + offset;

        match hdlc_unescape(&buffer[frame_start + 1..frame_end]) {
            Ok(unescaped) if unescaped.len() >= HEADER_MINSIZE => frames.push(unescaped),
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "dropping badly escaped hdlc frame"),
        }

        // The closing flag may open the next frame.
        buffer.drain(..frame_end);
    }

    if !buffer.contains(&FLAG) {
        buffer.clear();
    }
    frames
}

fn feed_stream(buffer: &mut Vec<u8>, data: &[u8]) -> Vec<Vec<u8>> {
    buffer.extend_from_slice(data);
    let mut frames = Vec::new();

    loop {
        // Realign to a header.
        match buffer.iter().position(|&b| b == START1) {
            Some(0) => {}
            Some(pos) => {
                buffer.drain(..pos);
            }
            None => {
                buffer.clear();
                break;
            }
        }
        if buffer.len() < STREAM_HEADER_SIZE {
            break;
        }
        if buffer[1] != START2 {
            buffer.drain(..1);
            continue;
        }
        let declared = usize::from(u16::from_be_bytes([buffer[2], buffer[3]]));
        if declared == 0 || declared > MAX_STREAM_PAYLOAD {
            buffer.drain(..1);
            continue;
        }
        let end = STREAM_HEADER_SIZE + declared;
        if buffer.len() < end {
            break;
        }
        let frame: Vec<u8> = buffer[STREAM_HEADER_SIZE..end].to_vec();
        buffer.drain(..end);
        if frame.len() >= HEADER_MINSIZE {
            frames.push(frame);
        }
    }

    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgate_core::framing::hdlc::{ESC, hdlc_escape};

    fn fake_frame(n: usize) -> Vec<u8> {
        vec![0xAA; n]
    }

    #[test]
    fn hdlc_frame_split_across_reads() {
        let mut acc = StreamFraming::Hdlc.accumulator();
        let payload = fake_frame(HEADER_MINSIZE);
        let framed = StreamFraming::Hdlc.frame(&payload).unwrap();
        let mid = framed.len() / 2;

        assert!(acc.feed(&framed[..mid]).is_empty());
        assert_eq!(acc.feed(&framed[mid..]), vec![payload]);
    }

    #[test]
    fn hdlc_shared_flag_between_frames() {
        let p1 = fake_frame(HEADER_MINSIZE);
        let p2 = fake_frame(HEADER_MINSIZE + 5);
        let mut data = vec![FLAG];
        data.extend_from_slice(&hdlc_escape(&p1));
        data.push(FLAG);
        data.extend_from_slice(&hdlc_escape(&p2));
        data.push(FLAG);

        let mut acc = StreamFraming::Hdlc.accumulator();
        assert_eq!(acc.feed(&data), vec![p1, p2]);
    }

    #[test]
    fn hdlc_escapes_and_short_frames() {
        let mut payload = fake_frame(HEADER_MINSIZE - 2);
        payload.push(FLAG);
        payload.push(ESC);

        let mut acc = StreamFraming::Hdlc.accumulator();
        assert_eq!(acc.feed(&hdlc_frame(&payload)), vec![payload]);
        assert!(acc.feed(&hdlc_frame(&fake_frame(HEADER_MINSIZE - 1))).is_empty());
        assert!(acc.feed(&[FLAG, FLAG, FLAG]).is_empty());
    }

    #[test]
    fn hdlc_bad_escape_dropped_next_frame_survives() {
        let good = fake_frame(HEADER_MINSIZE);
        let mut data = vec![FLAG, ESC, 0x00, 0x01, FLAG];
        data.extend_from_slice(&hdlc_frame(&good));

        let mut acc = StreamFraming::Hdlc.accumulator();
        assert_eq!(acc.feed(&data), vec![good]);
    }

    #[test]
    fn hdlc_garbage_without_flag_not_buffered() {
        let mut acc = StreamFraming::Hdlc.accumulator();
        acc.feed(&[0x01; 1000]);
        assert_eq!(acc.buffered(), 0);
    }

    #[test]
    fn stream_frame_split_across_reads() {
        let payload = fake_frame(300);
        let framed = StreamFraming::Stream.frame(&payload).unwrap();
        let mut acc = StreamFraming::Stream.accumulator();

        assert!(acc.feed(&framed[..3]).is_empty());
        assert!(acc.feed(&framed[3..100]).is_empty());
        assert_eq!(acc.feed(&framed[100..]), vec![payload]);
        assert_eq!(acc.buffered(), 0);
    }

    #[test]
    fn stream_resyncs_after_noise() {
        let p1 = fake_frame(HEADER_MINSIZE);
        let p2 = fake_frame(40);
        let mut data = b"debug log line\r\n".to_vec();
        data.extend_from_slice(&stream_frame(&p1).unwrap());
        // A stray start byte followed by a bogus length.
        data.extend_from_slice(&[START1, START2, 0xFF, 0xFF]);
        data.extend_from_slice(&stream_frame(&p2).unwrap());

        let mut acc = StreamFraming::Stream.accumulator();
        assert_eq!(acc.feed(&data), vec![p1, p2]);
    }

    #[test]
    fn stream_oversize_payload_rejected_on_write() {
        assert!(
            StreamFraming::Stream
                .frame(&vec![0u8; MAX_STREAM_PAYLOAD + 1])
                .is_err()
        );
    }
}
