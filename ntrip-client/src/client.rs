//! NTRIP session state machine
//!
//! Owns the transport, drives the HTTP-style handshake against the caster,
//! gates outbound NMEA sentences, and feeds inbound bytes to the RTCM
//! framer. Recoverable failures (stale stream, server-side close, repeated
//! send failures) are handled by a bounded reconnect loop; only exhausting
//! the reconnect ceiling is surfaced as fatal.

use crate::error::{NtripError, NtripResult};
use crate::nmea::NmeaValidator;
use crate::rtcm::{RtcmFrame, RtcmParser};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, error, info, warn};
use ntrip_core::settings::NtripSettings;
use ntrip_transport::{CasterTransport, StreamAccessor, TransportLayer};
use std::time::Instant;
use tokio::time::sleep;

/// Read chunk size for the handshake response and correction stream
const CHUNK_SIZE: usize = 1024;

const SOURCETABLE_RESPONSES: [&str; 1] = ["SOURCETABLE 200 OK"];
const SUCCESS_RESPONSES: [&str; 3] = ["ICY 200 OK", "HTTP/1.0 200 OK", "HTTP/1.1 200 OK"];
const UNAUTHORIZED_RESPONSES: [&str; 1] = ["401"];

/// Connection state of the NTRIP session
///
/// `ShuttingDown` is terminal: it suppresses any further reconnect attempt
/// and no operation can leave it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    ShuttingDown,
}

/// NTRIP client session
///
/// Single-task by design: the host calls [`connect`](Self::connect) once,
/// then drives [`poll_corrections`](Self::poll_corrections) and
/// [`send_position`](Self::send_position) from one control loop. The only
/// calls that wait for longer than the connect timeout are the sleeps
/// inside the reconnect backoff loop.
pub struct NtripClient<T: TransportLayer> {
    settings: NtripSettings,
    transport: T,
    state: ConnectionState,
    basic_credentials: Option<String>,
    nmea_validator: NmeaValidator,
    rtcm_parser: RtcmParser,
    reconnect_attempt_count: u32,
    nmea_send_failed_count: u32,
    read_zero_bytes_count: u32,
    first_rtcm_received: bool,
    last_packet_at: Option<Instant>,
}

impl NtripClient<CasterTransport> {
    /// Create a client with the transport described by the settings
    pub fn from_settings(settings: NtripSettings) -> Self {
        let transport = CasterTransport::from_settings(&settings);
        Self::new(settings, transport)
    }
}

impl<T: TransportLayer> NtripClient<T> {
    /// Create a client that talks to the caster over the given transport
    pub fn new(settings: NtripSettings, transport: T) -> Self {
        let basic_credentials = match (&settings.username, &settings.password) {
            (Some(username), Some(password)) => {
                Some(STANDARD.encode(format!("{}:{}", username, password)))
            }
            _ => None,
        };
        let nmea_validator = NmeaValidator::new(settings.nmea_min_length, settings.nmea_max_length);
        let rtcm_parser = RtcmParser::with_max_residual(settings.residual_buffer_max);

        Self {
            settings,
            transport,
            state: ConnectionState::Disconnected,
            basic_credentials,
            nmea_validator,
            rtcm_parser,
            reconnect_attempt_count: 0,
            nmea_send_failed_count: 0,
            read_zero_bytes_count: 0,
            first_rtcm_received: false,
            last_packet_at: None,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the session is currently connected
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Open the transport and perform the NTRIP handshake
    ///
    /// The response is classified by substring presence only. A sourcetable
    /// or unauthorized marker is a failure even when a success marker is
    /// also present. When no NTRIP version is configured, any response
    /// without a recognised success marker is also treated as a known
    /// error; some casters legitimately answer this way, but the heuristic
    /// is kept because a missing `Ntrip-Version` header is the most common
    /// cause.
    pub async fn connect(&mut self) -> NtripResult<()> {
        if self.state == ConnectionState::ShuttingDown {
            return Err(NtripError::InvalidData(
                "Client has been shut down".to_string(),
            ));
        }

        if let Err(e) = self.transport.open().await {
            error!(
                "Unable to connect to the caster at http://{}:{}",
                self.settings.host, self.settings.port
            );
            error!("Error: {}", e);
            return Err(e);
        }

        self.transport
            .set_timeout(Some(self.settings.connect_timeout))
            .await?;

        let request = self.form_request();
        let sent = match self.transport.write_all(request.as_bytes()).await {
            Ok(()) => self.transport.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            error!(
                "Unable to send request to the caster at http://{}:{}",
                self.settings.host, self.settings.port
            );
            error!("Error: {}", e);
            let _ = self.transport.close().await;
            return Err(e);
        }

        let mut response_buf = vec![0u8; CHUNK_SIZE];
        let read = match self.transport.read(&mut response_buf).await {
            Ok(read) => read,
            Err(e) => {
                error!(
                    "Unable to read response from the caster at http://{}:{}",
                    self.settings.host, self.settings.port
                );
                error!("Error: {}", e);
                let _ = self.transport.close().await;
                return Err(e);
            }
        };
        let response = String::from_utf8_lossy(&response_buf[..read]).to_string();

        let connected = SUCCESS_RESPONSES.iter().any(|m| response.contains(m));

        // Some casters return both a success and an error in the response;
        // any known error makes the handshake a failure regardless.
        let mut known_error = None;
        if SOURCETABLE_RESPONSES.iter().any(|m| response.contains(m)) {
            warn!("Received sourcetable response from the caster. This probably means the mountpoint specified is not valid");
            known_error = Some("sourcetable response (mountpoint is probably not valid)");
        } else if UNAUTHORIZED_RESPONSES.iter().any(|m| response.contains(m)) {
            warn!("Received unauthorized response from the caster. Check your username, password, and mountpoint to make sure they are correct.");
            known_error = Some("unauthorized (check username, password, and mountpoint)");
        } else if !connected && !self.settings.has_version() {
            warn!("Received unknown response from the caster. No NTRIP version was configured; check whether your caster requires an Ntrip-Version header.");
            known_error = Some("unrecognized response and no NTRIP version configured");
        }

        if known_error.is_some() || !connected {
            let reason = known_error.unwrap_or("no success response").to_string();
            error!(
                "Invalid response received from http://{}:{}/{}",
                self.settings.host, self.settings.port, self.settings.mountpoint
            );
            error!("Response: {}", response);
            let _ = self.transport.close().await;
            return Err(NtripError::Handshake {
                host: self.settings.host.clone(),
                port: self.settings.port,
                mountpoint: self.settings.mountpoint.clone(),
                reason,
            });
        }

        self.state = ConnectionState::Connected;
        self.reconnect_attempt_count = 0;
        info!(
            "Connected to http://{}:{}/{}",
            self.settings.host, self.settings.port, self.settings.mountpoint
        );
        Ok(())
    }

    /// Best-effort orderly shutdown of the transport
    ///
    /// Never fails the caller; close errors are logged at debug level.
    pub async fn disconnect(&mut self) {
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Disconnected;
        }
        if let Err(e) = self.transport.close().await {
            debug!(
                "Encountered error when closing the connection to the caster. This can likely be ignored: {}",
                e
            );
        }
    }

    /// Tear the connection down and dial again, with bounded retries
    ///
    /// Waits `reconnect_attempt_wait` between attempts. After
    /// `reconnect_attempt_max` consecutive failures the attempt counter is
    /// reset and [`NtripError::ReconnectExhausted`] is returned; the caller
    /// decides whether that terminates the session. A no-op unless the
    /// session is currently connected.
    pub async fn reconnect(&mut self) -> NtripResult<()> {
        if self.state != ConnectionState::Connected {
            debug!("Reconnect called while not connected, ignoring");
            return Ok(());
        }

        while self.state != ConnectionState::ShuttingDown {
            self.reconnect_attempt_count += 1;
            self.disconnect().await;
            match self.connect().await {
                Ok(()) => {
                    self.reconnect_attempt_count = 0;
                    return Ok(());
                }
                Err(e) if self.reconnect_attempt_count < self.settings.reconnect_attempt_max => {
                    error!(
                        "Reconnect to http://{}:{} failed: {}. Retrying in {} seconds",
                        self.settings.host,
                        self.settings.port,
                        e,
                        self.settings.reconnect_attempt_wait.as_secs()
                    );
                    sleep(self.settings.reconnect_attempt_wait).await;
                }
                Err(_) => {
                    let attempts = self.reconnect_attempt_count;
                    self.reconnect_attempt_count = 0;
                    return Err(NtripError::ReconnectExhausted { attempts });
                }
            }
        }
        Ok(())
    }

    /// Validate a position report and forward it to the caster
    ///
    /// Drops the sentence (with a warning) if the session is not connected
    /// or the sentence fails validation. Transport failures are counted;
    /// when `nmea_send_failed_max` is reached the session reconnects and
    /// retries the same sentence exactly once more.
    pub async fn send_position(&mut self, sentence: &str) -> NtripResult<()> {
        if self.state != ConnectionState::Connected {
            warn!("NMEA sent before client was connected, discarding NMEA");
            return Ok(());
        }

        let sentence = Self::normalize_line_ending(sentence);
        if !self.nmea_validator.is_valid(&sentence) {
            warn!("Invalid NMEA sentence, not sending to the caster");
            return Ok(());
        }

        if let Err(e) = self.transport.write_all(sentence.as_bytes()).await {
            warn!("Unable to send NMEA sentence to the caster.");
            warn!("Error: {}", e);
            self.nmea_send_failed_count += 1;
            if self.nmea_send_failed_count >= self.settings.nmea_send_failed_max {
                warn!(
                    "NMEA sentence failed to send to the caster {} times, reconnecting",
                    self.nmea_send_failed_count
                );
                self.reconnect().await?;
                self.nmea_send_failed_count = 0;
                // One bounded retry after the reconnect, never a recursive
                // resend loop.
                if let Err(e) = self.transport.write_all(sentence.as_bytes()).await {
                    warn!("Unable to send NMEA sentence after reconnecting: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Drain available correction bytes and return the frames they complete
    ///
    /// Non-blocking: returns an empty list when no data is pending. Also
    /// runs the liveness checks: the RTCM watchdog timeout, transport
    /// errors with a closed socket, and repeated zero-byte reads all
    /// trigger a reconnect.
    pub async fn poll_corrections(&mut self) -> NtripResult<Vec<RtcmFrame>> {
        if self.state != ConnectionState::Connected {
            warn!("RTCM requested before client was connected, returning empty list");
            return Ok(Vec::new());
        }

        // Watchdog: if the correction stream has gone quiet, reconnect
        if self.first_rtcm_received {
            if let Some(last_packet_at) = self.last_packet_at {
                if last_packet_at.elapsed() >= self.settings.rtcm_timeout {
                    error!(
                        "RTCM data not received for {} seconds, reconnecting",
                        self.settings.rtcm_timeout.as_secs()
                    );
                    self.reconnect().await?;
                    self.first_rtcm_received = false;
                }
            }
        }

        let mut data = Vec::new();
        let mut chunk = [0u8; CHUNK_SIZE];
        let mut closed_by_peer = false;
        loop {
            match self.transport.try_read(&mut chunk).await {
                Ok(None) => break,
                Ok(Some(0)) => {
                    closed_by_peer = true;
                    break;
                }
                Ok(Some(read)) => {
                    data.extend_from_slice(&chunk[..read]);
                    // A short read means the available data is drained
                    if read < CHUNK_SIZE {
                        break;
                    }
                }
                Err(e) => {
                    error!("Error while reading {} bytes from the caster: {}", CHUNK_SIZE, e);
                    if !self.transport.is_open().await {
                        error!("Connection appears to be closed. Reconnecting");
                        self.reconnect().await?;
                        return Ok(Vec::new());
                    }
                    break;
                }
            }
        }
        debug!("Read {} bytes", data.len());

        if data.is_empty() {
            // A zero-byte read from a socket that reported data available
            // means the caster closed the connection on its side.
            if closed_by_peer {
                self.read_zero_bytes_count += 1;
                if self.read_zero_bytes_count >= self.settings.read_zero_bytes_max {
                    warn!(
                        "Reconnecting because we received 0 bytes from the caster even though it said there was data available {} times",
                        self.read_zero_bytes_count
                    );
                    self.reconnect().await?;
                    self.read_zero_bytes_count = 0;
                }
            }
            return Ok(Vec::new());
        }

        self.read_zero_bytes_count = 0;
        self.last_packet_at = Some(Instant::now());
        self.first_rtcm_received = true;
        Ok(self.rtcm_parser.feed(&data))
    }

    /// Terminally shut the session down
    ///
    /// Suppresses any future reconnect loop, then disconnects.
    pub async fn shutdown(&mut self) {
        self.state = ConnectionState::ShuttingDown;
        self.reconnect_attempt_count = 0;
        self.disconnect().await;
    }

    fn form_request(&self) -> String {
        let mut request = format!("GET /{} HTTP/1.0\r\n", self.settings.mountpoint);
        if self.settings.has_version() {
            request.push_str(&format!(
                "Ntrip-Version: {}\r\n",
                self.settings.ntrip_version.as_deref().unwrap_or_default()
            ));
        }
        request.push_str("User-Agent: NTRIP ntrip-client-rs\r\n");
        if let Some(credentials) = &self.basic_credentials {
            request.push_str(&format!("Authorization: Basic {}\r\n", credentials));
        }
        request.push_str("\r\n");
        request
    }

    /// Ensure the sentence ends with a literal CRLF, tolerating sentences
    /// supplied with the escape-sequence form of those characters
    fn normalize_line_ending(sentence: &str) -> String {
        if let Some(stripped) = sentence.strip_suffix("\\r\\n") {
            format!("{}\r\n", stripped)
        } else if !sentence.ends_with("\r\n") {
            format!("{}\r\n", sentence)
        } else {
            sentence.to_string()
        }
    }
}
