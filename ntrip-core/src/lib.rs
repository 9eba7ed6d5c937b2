//! Core types for the NTRIP client
//!
//! This crate provides the shared error type and the configuration surface
//! consumed by the transport and client crates.

pub mod error;
pub mod settings;

pub use error::{NtripError, NtripResult};
pub use settings::{NtripSettings, TlsConfig};
