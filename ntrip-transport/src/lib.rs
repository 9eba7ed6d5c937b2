//! Transport layer module for the NTRIP client
//!
//! This crate provides the byte-oriented duplex stream the session engine
//! talks to: plain TCP, a TLS-wrapped variant, and an enum dispatching
//! between the two based on settings.

pub mod caster;
pub mod error;
pub mod stream;
pub mod tcp;
pub mod tls;

pub use caster::CasterTransport;
pub use error::{NtripError, NtripResult};
pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::{TcpSettings, TcpTransport};
pub use tls::{TlsSettings, TlsTransport};
