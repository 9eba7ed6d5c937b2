//! Caster transport selection
//!
//! The session engine owns exactly one connection to one caster; which
//! medium it uses (plain TCP or TLS) is a configuration decision, so this
//! enum dispatches between the two concrete transports.

use crate::error::NtripResult;
use crate::stream::{StreamAccessor, TransportLayer};
use crate::tcp::{TcpSettings, TcpTransport};
use crate::tls::{TlsSettings, TlsTransport};
use async_trait::async_trait;
use ntrip_core::settings::NtripSettings;
use std::time::Duration;

/// Transport to an NTRIP caster, plain or TLS-wrapped
pub enum CasterTransport {
    Tcp(TcpTransport),
    Tls(TlsTransport),
}

impl CasterTransport {
    /// Build the transport described by the client settings
    pub fn from_settings(settings: &NtripSettings) -> Self {
        match &settings.tls {
            Some(tls) => {
                let mut tls_settings =
                    TlsSettings::new(settings.host.clone(), settings.port, tls.clone());
                tls_settings.timeout = Some(settings.connect_timeout);
                CasterTransport::Tls(TlsTransport::new(tls_settings))
            }
            None => {
                let tcp_settings = TcpSettings::with_timeout(
                    settings.host.clone(),
                    settings.port,
                    settings.connect_timeout,
                );
                CasterTransport::Tcp(TcpTransport::new(tcp_settings))
            }
        }
    }
}

#[async_trait]
impl StreamAccessor for CasterTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> NtripResult<()> {
        match self {
            CasterTransport::Tcp(t) => t.set_timeout(timeout).await,
            CasterTransport::Tls(t) => t.set_timeout(timeout).await,
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> NtripResult<usize> {
        match self {
            CasterTransport::Tcp(t) => t.read(buf).await,
            CasterTransport::Tls(t) => t.read(buf).await,
        }
    }

    async fn try_read(&mut self, buf: &mut [u8]) -> NtripResult<Option<usize>> {
        match self {
            CasterTransport::Tcp(t) => t.try_read(buf).await,
            CasterTransport::Tls(t) => t.try_read(buf).await,
        }
    }

    async fn write(&mut self, buf: &[u8]) -> NtripResult<usize> {
        match self {
            CasterTransport::Tcp(t) => t.write(buf).await,
            CasterTransport::Tls(t) => t.write(buf).await,
        }
    }

    async fn flush(&mut self) -> NtripResult<()> {
        match self {
            CasterTransport::Tcp(t) => t.flush().await,
            CasterTransport::Tls(t) => t.flush().await,
        }
    }

    async fn is_open(&mut self) -> bool {
        match self {
            CasterTransport::Tcp(t) => t.is_open().await,
            CasterTransport::Tls(t) => t.is_open().await,
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            CasterTransport::Tcp(t) => t.is_closed(),
            CasterTransport::Tls(t) => t.is_closed(),
        }
    }

    async fn close(&mut self) -> NtripResult<()> {
        match self {
            CasterTransport::Tcp(t) => t.close().await,
            CasterTransport::Tls(t) => t.close().await,
        }
    }
}

#[async_trait]
impl TransportLayer for CasterTransport {
    async fn open(&mut self) -> NtripResult<()> {
        match self {
            CasterTransport::Tcp(t) => t.open().await,
            CasterTransport::Tls(t) => t.open().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntrip_core::settings::TlsConfig;

    #[test]
    fn test_transport_selection() {
        let settings = NtripSettings::new("caster.example.com", 2101, "VRS_3_4G");
        assert!(matches!(
            CasterTransport::from_settings(&settings),
            CasterTransport::Tcp(_)
        ));

        let settings = settings.with_tls(TlsConfig::default());
        assert!(matches!(
            CasterTransport::from_settings(&settings),
            CasterTransport::Tls(_)
        ));
    }
}
