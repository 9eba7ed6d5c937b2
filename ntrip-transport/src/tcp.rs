//! TCP transport implementation

use crate::error::{NtripError, NtripResult};
use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use log::warn;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub host: String,
    pub port: u16,
    pub timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Some(Duration::from_secs(5)),
        }
    }

    /// Create TCP settings with timeout
    pub fn with_timeout(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Some(timeout),
        }
    }
}

/// TCP transport layer implementation
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    settings: TcpSettings,
    closed: bool,
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    fn stream_mut(&mut self) -> NtripResult<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            NtripError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> NtripResult<()> {
        if !self.closed {
            return Err(NtripError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let address = (self.settings.host.clone(), self.settings.port);
        let stream = if let Some(timeout) = self.settings.timeout {
            tokio::time::timeout(timeout, TcpStream::connect(address))
                .await
                .map_err(|_| NtripError::Timeout)?
                .map_err(NtripError::Connection)?
        } else {
            TcpStream::connect(address)
                .await
                .map_err(NtripError::Connection)?
        };

        self.stream = Some(stream);
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> NtripResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> NtripResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;

        let result = if let Some(timeout) = timeout {
            tokio::time::timeout(timeout, stream.read(buf))
                .await
                .map_err(|_| NtripError::Timeout)?
                .map_err(NtripError::Connection)
        } else {
            stream.read(buf).await.map_err(NtripError::Connection)
        };

        match result {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }

    async fn try_read(&mut self, buf: &mut [u8]) -> NtripResult<Option<usize>> {
        let stream = self.stream_mut()?;

        match stream.try_read(buf) {
            Ok(0) => {
                self.closed = true;
                Ok(Some(0))
            }
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => {
                self.closed = true;
                Err(NtripError::Connection(e))
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> NtripResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;

        if let Some(timeout) = timeout {
            tokio::time::timeout(timeout, stream.write(buf))
                .await
                .map_err(|_| NtripError::Timeout)?
                .map_err(NtripError::Connection)
        } else {
            stream.write(buf).await.map_err(NtripError::Connection)
        }
    }

    async fn flush(&mut self) -> NtripResult<()> {
        let stream = self.stream_mut()?;
        stream.flush().await.map_err(NtripError::Connection)
    }

    async fn is_open(&mut self) -> bool {
        let Some(stream) = self.stream.as_ref() else {
            return false;
        };

        // A zero-duration peek: would-block means the connection is open and
        // idle, a zero-byte result means the peer closed it.
        let mut probe = [0u8; 1];
        match tokio::time::timeout(Duration::ZERO, stream.peek(&mut probe)).await {
            Ok(Ok(0)) => {
                self.closed = true;
                false
            }
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!("Connection to the caster appears to be closed: {}", e);
                self.closed = true;
                false
            }
            Err(_) => true,
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> NtripResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}
