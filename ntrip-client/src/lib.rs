//! NTRIP client session engine
//!
//! Streams RTCM3 correction frames from an NTRIP caster and reports rover
//! positions back as NMEA sentences. The host drives a single
//! [`NtripClient`] from its control loop:
//!
//! 1. [`NtripClient::connect`] performs the HTTP-style handshake once.
//! 2. [`NtripClient::poll_corrections`] is called repeatedly; it never
//!    blocks and returns the RTCM frames extracted so far.
//! 3. [`NtripClient::send_position`] forwards validated NMEA sentences to
//!    the caster.
//!
//! Stale streams, server-side closes, and send failures are recovered via
//! an internal reconnect loop with a bounded attempt ceiling; only ceiling
//! exhaustion surfaces as a fatal error.

pub mod client;
pub mod error;
pub mod nmea;
pub mod rtcm;

pub use client::{ConnectionState, NtripClient};
pub use error::{NtripError, NtripResult};
pub use nmea::NmeaValidator;
pub use rtcm::{RtcmFrame, RtcmParser, RTCM3_PREAMBLE};
