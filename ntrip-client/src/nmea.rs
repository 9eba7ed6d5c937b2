//! NMEA sentence validation
//!
//! Gates every position report before it is sent to the caster. The
//! validator is a pure predicate; each rejected sentence is reported
//! through a warning diagnostic, never an error return.

use log::warn;
use ntrip_core::settings::{NMEA_DEFAULT_MAX_LENGTH, NMEA_DEFAULT_MIN_LENGTH};

const CHECKSUM_SEPARATOR: char = '*';

/// NMEA sentence validator
#[derive(Debug, Clone)]
pub struct NmeaValidator {
    min_length: usize,
    max_length: usize,
}

impl NmeaValidator {
    /// Create a validator with the given length bounds
    pub fn new(min_length: usize, max_length: usize) -> Self {
        Self {
            min_length,
            max_length,
        }
    }

    /// Check whether a sentence is valid NMEA, including its checksum
    ///
    /// A sentence is a single line including its terminating CRLF pair.
    /// The checks short-circuit in order: maximum length, minimum length,
    /// `$`/`!` sentinel, CRLF terminator, checksum separator presence, and
    /// finally the XOR checksum over everything between the sentinel and
    /// the last `*` (neither included).
    pub fn is_valid(&self, sentence: &str) -> bool {
        if sentence.len() > self.max_length {
            warn!(
                "Received invalid NMEA sentence. Max length is {}, but sentence was {} bytes",
                self.max_length,
                sentence.len()
            );
            warn!("Sentence: {}", sentence);
            return false;
        }
        if sentence.len() < self.min_length {
            warn!(
                "Received invalid NMEA sentence. We need at least {} bytes to parse but got {} bytes",
                self.min_length,
                sentence.len()
            );
            warn!("Sentence: {}", sentence);
            return false;
        }
        if !sentence.starts_with('$') && !sentence.starts_with('!') {
            // char-based so a multi-byte first character cannot split a
            // UTF-8 boundary when the diagnostic is formatted
            warn!(
                "Received invalid NMEA sentence. Sentence should begin with \"$\" or \"!\", but instead begins with {}",
                sentence.chars().next().unwrap_or_default()
            );
            warn!("Sentence: {}", sentence);
            return false;
        }
        if !sentence.ends_with("\r\n") {
            warn!("Received invalid NMEA sentence. Sentence should end with \\r\\n");
            warn!("Sentence: {}", sentence);
            return false;
        }
        let Some(separator) = sentence.rfind(CHECKSUM_SEPARATOR) else {
            warn!(
                "Received invalid NMEA sentence. Sentence should have a \"{}\" character to separate the checksum, but we could not find it",
                CHECKSUM_SEPARATOR
            );
            warn!("Sentence: {}", sentence);
            return false;
        };

        // Split on the last separator; the checksum field carries the CRLF.
        let data = &sentence[..separator];
        let checksum_hex = sentence[separator + 1..].trim_end();
        let expected_checksum = match u8::from_str_radix(checksum_hex, 16) {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "Received invalid NMEA sentence. Checksum \"{}\" is not valid hex",
                    checksum_hex
                );
                warn!("Sentence: {}", sentence);
                return false;
            }
        };

        let calculated_checksum = data
            .bytes()
            .skip(1)
            .fold(0u8, |checksum, byte| checksum ^ byte);
        if expected_checksum != calculated_checksum {
            warn!("Received invalid NMEA sentence. Checksum mismatch");
            warn!("Expected Checksum:   0x{:X}", expected_checksum);
            warn!("Calculated Checksum: 0x{:X}", calculated_checksum);
            return false;
        }

        true
    }
}

impl Default for NmeaValidator {
    fn default() -> Self {
        Self::new(NMEA_DEFAULT_MIN_LENGTH, NMEA_DEFAULT_MAX_LENGTH)
    }
}
