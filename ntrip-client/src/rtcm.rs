//! RTCM3 byte-stream framing
//!
//! Extracts complete, CRC-valid RTCM3 frames from an arbitrary,
//! non-frame-aligned byte stream. The parser keeps a residual buffer
//! across calls so frames split over any number of reads are reassembled,
//! and resynchronises one byte at a time after a CRC mismatch so a false
//! preamble inside payload data never swallows a genuine frame behind it.
//!
//! Transport framing per the public RTCM3 convention: preamble `0xD3`, a
//! 10-bit big-endian payload length in the low bits of the next two bytes,
//! the payload, and a 3-byte big-endian CRC-24Q trailer over header and
//! payload.

use bytes::{Buf, BytesMut};
use log::{debug, warn};
use ntrip_core::settings::DEFAULT_RESIDUAL_BUFFER_MAX;

/// RTCM3 frame preamble byte
pub const RTCM3_PREAMBLE: u8 = 0xD3;

/// Header length: preamble plus the two length bytes
const HEADER_LENGTH: usize = 3;

/// Trailer length: the 24-bit CRC
const CRC_LENGTH: usize = 3;

/// CRC-24Q polynomial, as used by RTCM3
const CRC24Q_KEY: u32 = 0x0186_4CFB;

/// Precomputed CRC-24Q table
static CRC24Q_TABLE: once_cell::sync::Lazy<[u32; 256]> = once_cell::sync::Lazy::new(|| {
    let mut table = [0u32; 256];
    for b in 0..=0xFFu32 {
        let mut v = b << 16;
        for _ in 0..8 {
            v <<= 1;
            if (v & 0x0100_0000) != 0 {
                v ^= CRC24Q_KEY;
            }
        }
        table[b as usize] = v & 0x00FF_FFFF;
    }
    table
});

/// Compute the CRC-24Q checksum of a byte slice
pub fn crc24q(data: &[u8]) -> u32 {
    let mut crc = 0u32;
    for &byte in data {
        crc = ((crc << 8) & 0x00FF_FFFF) ^ CRC24Q_TABLE[(((crc >> 16) ^ byte as u32) & 0xFF) as usize];
    }
    crc
}

/// A single extracted RTCM3 frame
///
/// Owns its payload; the header and CRC trailer are already stripped and
/// verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcmFrame {
    message_type: u16,
    payload: Vec<u8>,
    frame_length: usize,
}

impl RtcmFrame {
    fn new(payload: Vec<u8>, frame_length: usize) -> Self {
        // Message type is the first 12 bits of the payload
        let message_type = if payload.len() >= 2 {
            ((payload[0] as u16) << 4) | ((payload[1] as u16) >> 4)
        } else {
            0
        };
        Self {
            message_type,
            payload,
            frame_length,
        }
    }

    /// RTCM message type identifier (e.g. 1005, 1074)
    pub fn message_type(&self) -> u16 {
        self.message_type
    }

    /// Frame payload, excluding header and CRC trailer
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Length of the frame as originally framed on the wire
    pub fn frame_length(&self) -> usize {
        self.frame_length
    }
}

/// Stateful RTCM3 stream parser
pub struct RtcmParser {
    buffer: BytesMut,
    max_residual: usize,
}

impl RtcmParser {
    /// Create a parser with the default residual-buffer cap
    pub fn new() -> Self {
        Self::with_max_residual(DEFAULT_RESIDUAL_BUFFER_MAX)
    }

    /// Create a parser that retains at most `max_residual` unresolved bytes
    pub fn with_max_residual(max_residual: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_residual,
        }
    }

    /// Number of bytes held back as a possible partial frame
    pub fn residual_len(&self) -> usize {
        self.buffer.len()
    }

    /// Append newly received bytes and extract every complete frame
    ///
    /// Returns the frames in stream order. Bytes that cannot begin a frame
    /// are discarded; a trailing possible frame start is retained for the
    /// next call.
    pub fn feed(&mut self, data: &[u8]) -> Vec<RtcmFrame> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            // Scan for the next preamble, dropping everything before it
            match self.buffer.iter().position(|&b| b == RTCM3_PREAMBLE) {
                Some(0) => {}
                Some(skipped) => {
                    debug!("Discarding {} bytes before RTCM preamble", skipped);
                    self.buffer.advance(skipped);
                }
                None => {
                    if !self.buffer.is_empty() {
                        debug!("Discarding {} bytes without RTCM preamble", self.buffer.len());
                        self.buffer.clear();
                    }
                    break;
                }
            }

            if self.buffer.len() < HEADER_LENGTH {
                break;
            }
            let payload_length =
                (((self.buffer[1] as usize) & 0x03) << 8) | self.buffer[2] as usize;
            let frame_length = HEADER_LENGTH + payload_length + CRC_LENGTH;
            if self.buffer.len() < frame_length {
                break;
            }

            let crc_offset = HEADER_LENGTH + payload_length;
            let expected_crc = ((self.buffer[crc_offset] as u32) << 16)
                | ((self.buffer[crc_offset + 1] as u32) << 8)
                | self.buffer[crc_offset + 2] as u32;
            let computed_crc = crc24q(&self.buffer[..crc_offset]);

            if computed_crc == expected_crc {
                let payload = self.buffer[HEADER_LENGTH..crc_offset].to_vec();
                frames.push(RtcmFrame::new(payload, frame_length));
                self.buffer.advance(frame_length);
            } else {
                // False preamble: a data byte happened to equal 0xD3. Drop
                // only that byte so a genuine frame starting one byte later
                // is not lost.
                warn!(
                    "RTCM CRC mismatch (expected 0x{:06X}, computed 0x{:06X}), skipping preamble byte",
                    expected_crc, computed_crc
                );
                self.buffer.advance(1);
            }
        }

        if self.buffer.len() > self.max_residual {
            let excess = self.buffer.len() - self.max_residual;
            warn!(
                "RTCM residual buffer exceeded {} bytes, discarding {} oldest bytes",
                self.max_residual, excess
            );
            self.buffer.advance(excess);
        }

        frames
    }
}

impl Default for RtcmParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a well-formed frame for the given message type; the first two
    /// payload bytes carry the 12-bit type, `tail` fills the rest.
    fn build_frame(message_type: u16, tail: &[u8]) -> Vec<u8> {
        let mut payload = vec![(message_type >> 4) as u8, ((message_type & 0x0F) as u8) << 4];
        payload.extend_from_slice(tail);

        let mut frame = vec![
            RTCM3_PREAMBLE,
            ((payload.len() >> 8) & 0x03) as u8,
            (payload.len() & 0xFF) as u8,
        ];
        frame.extend_from_slice(&payload);
        let crc = crc24q(&frame);
        frame.extend_from_slice(&[(crc >> 16) as u8, (crc >> 8) as u8, crc as u8]);
        frame
    }

    #[test]
    fn test_crc24q_reference_value() {
        // Catalogue check value for CRC-24/Q
        assert_eq!(crc24q(b"123456789"), 0xCDE703);
        assert_eq!(crc24q(&[]), 0);
    }

    #[test]
    fn test_single_frame() {
        let frame = build_frame(1005, &[0x01, 0x02, 0x03, 0x04]);
        let mut parser = RtcmParser::new();
        let frames = parser.feed(&frame);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type(), 1005);
        assert_eq!(frames[0].frame_length(), frame.len());
        assert_eq!(frames[0].payload().len(), 6);
        assert_eq!(parser.residual_len(), 0);
    }

    #[test]
    fn test_noise_and_junk_between_frames() {
        let frame1 = build_frame(1074, &[0xAA; 20]);
        let frame2 = build_frame(1084, &[0xBB; 12]);

        let mut stream = Vec::new();
        stream.extend_from_slice(b"noise");
        stream.extend_from_slice(&frame1);
        stream.extend_from_slice(b"junk");
        stream.extend_from_slice(&frame2);

        let mut parser = RtcmParser::new();
        let frames = parser.feed(&stream);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].message_type(), 1074);
        assert_eq!(frames[1].message_type(), 1084);
    }

    #[test]
    fn test_split_at_every_byte_boundary() {
        let frame1 = build_frame(1074, &[0xAA; 20]);
        let frame2 = build_frame(1084, &[0xBB; 12]);

        let mut stream = Vec::new();
        stream.extend_from_slice(b"noise");
        stream.extend_from_slice(&frame1);
        stream.extend_from_slice(b"junk");
        stream.extend_from_slice(&frame2);

        for split in 0..=stream.len() {
            let mut parser = RtcmParser::new();
            let mut frames = parser.feed(&stream[..split]);
            frames.extend(parser.feed(&stream[split..]));
            assert_eq!(frames.len(), 2, "split at {}", split);
            assert_eq!(frames[0].message_type(), 1074, "split at {}", split);
            assert_eq!(frames[1].message_type(), 1084, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time_feed() {
        let frame = build_frame(1005, &[0x10, 0x20, 0x30]);
        let mut parser = RtcmParser::new();
        let mut frames = Vec::new();
        for &byte in &frame {
            frames.extend(parser.feed(&[byte]));
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type(), 1005);
    }

    #[test]
    fn test_corrupt_payload_resynchronises_on_next_frame() {
        let frame1 = build_frame(1074, &[0xAA; 20]);
        let frame2 = build_frame(1084, &[0xBB; 12]);

        let mut stream = frame1.clone();
        // Corrupt one payload byte of frame1, header and length untouched
        stream[HEADER_LENGTH + 5] ^= 0xFF;
        stream.extend_from_slice(&frame2);

        let mut parser = RtcmParser::new();
        let frames = parser.feed(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type(), 1084);
    }

    #[test]
    fn test_false_preamble_inside_payload() {
        // Payload full of preamble bytes must not derail framing
        let frame1 = build_frame(1005, &[RTCM3_PREAMBLE; 16]);
        let frame2 = build_frame(1033, &[0x42; 8]);

        let mut stream = frame1.clone();
        stream.extend_from_slice(&frame2);

        let mut parser = RtcmParser::new();
        let frames = parser.feed(&stream);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].message_type(), 1005);
        assert_eq!(frames[1].message_type(), 1033);
    }

    #[test]
    fn test_partial_frame_retained() {
        let frame = build_frame(1005, &[0x01; 10]);
        let mut parser = RtcmParser::new();
        let frames = parser.feed(&frame[..frame.len() - 1]);
        assert!(frames.is_empty());
        assert_eq!(parser.residual_len(), frame.len() - 1);

        let frames = parser.feed(&frame[frame.len() - 1..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(parser.residual_len(), 0);
    }

    #[test]
    fn test_non_preamble_garbage_is_dropped() {
        let mut parser = RtcmParser::new();
        let frames = parser.feed(&[0x00, 0x01, 0x02, 0x7F, 0xFF]);
        assert!(frames.is_empty());
        assert_eq!(parser.residual_len(), 0);
    }

    #[test]
    fn test_residual_buffer_cap() {
        let mut parser = RtcmParser::with_max_residual(64);
        // A preamble followed by a length that never completes
        let mut stream = vec![RTCM3_PREAMBLE, 0x03, 0xFF];
        stream.resize(256, 0xD3);
        parser.feed(&stream);
        assert!(parser.residual_len() <= 64);
    }
}
