use thiserror::Error;

/// Main error type for NTRIP client operations
#[derive(Error, Debug)]
pub enum NtripError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid response received from http://{host}:{port}/{mountpoint}: {reason}")]
    Handshake {
        host: String,
        port: u16,
        mountpoint: String,
        reason: String,
    },

    #[error("Reconnect was attempted {attempts} times, but never succeeded")]
    ReconnectExhausted { attempts: u32 },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias for NTRIP client operations
pub type NtripResult<T> = Result<T, NtripError>;
