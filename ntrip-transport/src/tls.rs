//! TLS transport implementation
//!
//! Wraps the TCP connection to the caster in TLS. Supports an optional
//! client identity (PEM certificate and PKCS#8 key) and an optional extra
//! CA root on top of the system trust store. The server name is verified
//! against the configured caster host.

use crate::error::{NtripError, NtripResult};
use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use log::warn;
use ntrip_core::settings::TlsConfig;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;

/// TLS transport layer settings
#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub host: String,
    pub port: u16,
    pub timeout: Option<Duration>,
    pub config: TlsConfig,
}

impl TlsSettings {
    /// Create new TLS settings
    pub fn new(host: impl Into<String>, port: u16, config: TlsConfig) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Some(Duration::from_secs(5)),
            config,
        }
    }
}

/// TLS transport layer implementation
pub struct TlsTransport {
    stream: Option<TlsStream<TcpStream>>,
    settings: TlsSettings,
    closed: bool,
}

impl TlsTransport {
    /// Create a new TLS transport layer
    pub fn new(settings: TlsSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    fn stream_mut(&mut self) -> NtripResult<&mut TlsStream<TcpStream>> {
        self.stream.as_mut().ok_or_else(|| {
            NtripError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TLS stream not connected",
            ))
        })
    }

    fn build_connector(config: &TlsConfig) -> NtripResult<tokio_native_tls::TlsConnector> {
        let mut builder = native_tls::TlsConnector::builder();

        if let (Some(cert), Some(key)) = (&config.cert, &config.key) {
            let cert_pem = std::fs::read(cert)?;
            let key_pem = std::fs::read(key)?;
            let identity = native_tls::Identity::from_pkcs8(&cert_pem, &key_pem)
                .map_err(|e| NtripError::Tls(format!("Invalid client identity: {}", e)))?;
            builder.identity(identity);
        }

        if let Some(ca_cert) = &config.ca_cert {
            let ca_pem = std::fs::read(ca_cert)?;
            let ca = native_tls::Certificate::from_pem(&ca_pem)
                .map_err(|e| NtripError::Tls(format!("Invalid CA certificate: {}", e)))?;
            builder.add_root_certificate(ca);
        }

        let connector = builder
            .build()
            .map_err(|e| NtripError::Tls(e.to_string()))?;
        Ok(tokio_native_tls::TlsConnector::from(connector))
    }
}

#[async_trait]
impl TransportLayer for TlsTransport {
    async fn open(&mut self) -> NtripResult<()> {
        if !self.closed {
            return Err(NtripError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let connector = Self::build_connector(&self.settings.config)?;
        let address = (self.settings.host.clone(), self.settings.port);

        let tcp = if let Some(timeout) = self.settings.timeout {
            tokio::time::timeout(timeout, TcpStream::connect(address))
                .await
                .map_err(|_| NtripError::Timeout)?
                .map_err(NtripError::Connection)?
        } else {
            TcpStream::connect(address)
                .await
                .map_err(NtripError::Connection)?
        };

        let handshake = connector.connect(&self.settings.host, tcp);
        let stream = if let Some(timeout) = self.settings.timeout {
            tokio::time::timeout(timeout, handshake)
                .await
                .map_err(|_| NtripError::Timeout)?
                .map_err(|e| NtripError::Tls(e.to_string()))?
        } else {
            handshake
                .await
                .map_err(|e| NtripError::Tls(e.to_string()))?
        };

        self.stream = Some(stream);
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for TlsTransport {
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

        // The TLS layer has no non-blocking read, so poll the read exactly
        // once with a zero-duration timeout.
        match tokio::time::timeout(Duration::ZERO, stream.read(buf)).await {
            Ok(Ok(0)) => {
                self.closed = true;
                Ok(Some(0))
            }
            Ok(Ok(n)) => Ok(Some(n)),
            Ok(Err(e)) => {
                self.closed = true;
                Err(NtripError::Connection(e))
            }
            Err(_) => Ok(None),
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

        // Peek the raw socket beneath the TLS wrapper so no ciphertext is
        // consumed by the probe.
        let tcp = stream.get_ref().get_ref().get_ref();
        let mut probe = [0u8; 1];
        match tokio::time::timeout(Duration::ZERO, tcp.peek(&mut probe)).await {
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
            // Best effort: send the TLS close_notify and shut the socket down.
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}
