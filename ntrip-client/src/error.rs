//! Error re-exports for the client crate

pub use ntrip_core::error::{NtripError, NtripResult};
