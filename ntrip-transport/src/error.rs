//! Error re-exports for the transport layer

pub use ntrip_core::error::{NtripError, NtripResult};
