//! Stream accessor trait for the transport layer

use crate::error::{NtripError, NtripResult};
use async_trait::async_trait;
use std::time::Duration;

/// Stream accessor interface to access the byte stream to a caster
#[async_trait]
pub trait StreamAccessor: Send + Sync {
    /// Set the read timeout
    ///
    /// # Arguments
    ///
    /// * `timeout` - The timeout duration. None means infinite timeout.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> NtripResult<()>;

    /// Read data from the stream, waiting until data arrives or the
    /// configured timeout elapses
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if EOF
    async fn read(&mut self, buf: &mut [u8]) -> NtripResult<usize>;

    /// Read data from the stream without blocking
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - no data is currently available
    /// * `Ok(Some(0))` - the peer closed the connection
    /// * `Ok(Some(n))` - `n` bytes were read
    async fn try_read(&mut self, buf: &mut [u8]) -> NtripResult<Option<usize>>;

    /// Write data to the stream
    ///
    /// # Returns
    ///
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> NtripResult<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> NtripResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(NtripError::Connection(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "Failed to write all data",
                )));
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> NtripResult<()>;

    /// Probe whether the remote end still holds the connection open
    ///
    /// Peeks at the socket without consuming any bytes. A probe that would
    /// block means the connection is open; a zero-byte peek means the peer
    /// closed it.
    async fn is_open(&mut self) -> bool;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    async fn close(&mut self) -> NtripResult<()>;
}

/// Transport layer trait that extends StreamAccessor
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Open the connection to the caster
    async fn open(&mut self) -> NtripResult<()>;
}
