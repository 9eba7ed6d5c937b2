//! Configuration surface for the NTRIP client
//!
//! All failure thresholds live here as explicit fields so the session never
//! reaches for module-level state. The config-loading layer that fills this
//! struct in is outside this workspace; `serde` derives keep it easy to
//! deserialize from whatever format that layer uses.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default maximum number of reconnect attempts before giving up
pub const DEFAULT_RECONNECT_ATTEMPT_MAX: u32 = 10;

/// Default wait between reconnect attempts
pub const DEFAULT_RECONNECT_ATTEMPT_WAIT: Duration = Duration::from_secs(5);

/// Default time without RTCM data before the watchdog reconnects
pub const DEFAULT_RTCM_TIMEOUT: Duration = Duration::from_secs(4);

/// Default timeout for the connect handshake (socket connect and response read)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default minimum NMEA sentence length in bytes
pub const NMEA_DEFAULT_MIN_LENGTH: usize = 3;

/// Default maximum NMEA sentence length in bytes
pub const NMEA_DEFAULT_MAX_LENGTH: usize = 82;

/// Default number of NMEA send failures tolerated before reconnecting
pub const DEFAULT_NMEA_SEND_FAILED_MAX: u32 = 5;

/// Default number of zero-byte reads tolerated before reconnecting
pub const DEFAULT_READ_ZERO_BYTES_MAX: u32 = 5;

/// Default cap on the RTCM parser's residual buffer
pub const DEFAULT_RESIDUAL_BUFFER_MAX: usize = 16 * 1024;

/// TLS configuration for connections to casters that require it
///
/// All paths are PEM files. `cert` and `key` configure a client identity,
/// `ca_cert` adds an extra trusted root on top of the system store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub ca_cert: Option<PathBuf>,
}

/// NTRIP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NtripSettings {
    /// Caster hostname
    pub host: String,
    /// Caster port
    pub port: u16,
    /// Mountpoint identifying the correction stream
    pub mountpoint: String,
    /// Value for the `Ntrip-Version` request header. `None` or an empty
    /// string omits the header, which also arms the ambiguous-version
    /// handshake heuristic.
    pub ntrip_version: Option<String>,
    /// Username for HTTP Basic authentication
    pub username: Option<String>,
    /// Password for HTTP Basic authentication
    pub password: Option<String>,
    /// Maximum reconnect attempts before `reconnect` reports exhaustion
    pub reconnect_attempt_max: u32,
    /// Wait between reconnect attempts
    pub reconnect_attempt_wait: Duration,
    /// Watchdog: time without RTCM data before reconnecting
    pub rtcm_timeout: Duration,
    /// Timeout for socket connect and the handshake response read
    pub connect_timeout: Duration,
    /// Minimum accepted NMEA sentence length
    pub nmea_min_length: usize,
    /// Maximum accepted NMEA sentence length
    pub nmea_max_length: usize,
    /// NMEA send failures tolerated before reconnecting
    pub nmea_send_failed_max: u32,
    /// Zero-byte reads tolerated before treating the connection as closed
    pub read_zero_bytes_max: u32,
    /// Cap on the RTCM parser's residual buffer
    pub residual_buffer_max: usize,
    /// TLS configuration; `None` connects over plain TCP
    pub tls: Option<TlsConfig>,
}

impl NtripSettings {
    /// Create settings for the given caster with all defaults applied
    pub fn new(host: impl Into<String>, port: u16, mountpoint: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            mountpoint: mountpoint.into(),
            ntrip_version: None,
            username: None,
            password: None,
            reconnect_attempt_max: DEFAULT_RECONNECT_ATTEMPT_MAX,
            reconnect_attempt_wait: DEFAULT_RECONNECT_ATTEMPT_WAIT,
            rtcm_timeout: DEFAULT_RTCM_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            nmea_min_length: NMEA_DEFAULT_MIN_LENGTH,
            nmea_max_length: NMEA_DEFAULT_MAX_LENGTH,
            nmea_send_failed_max: DEFAULT_NMEA_SEND_FAILED_MAX,
            read_zero_bytes_max: DEFAULT_READ_ZERO_BYTES_MAX,
            residual_buffer_max: DEFAULT_RESIDUAL_BUFFER_MAX,
            tls: None,
        }
    }

    /// Set the `Ntrip-Version` header value
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.ntrip_version = Some(version.into());
        self
    }

    /// Set HTTP Basic credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Enable TLS with the given certificate configuration
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Whether a usable protocol version was configured
    pub fn has_version(&self) -> bool {
        self.ntrip_version.as_deref().is_some_and(|v| !v.is_empty())
    }
}
