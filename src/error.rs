//! WolfMask Error Types

use thiserror::Error;

/// Result type alias for WolfMask operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfMask error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to encode configuration: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("Invalid obfuscation parameters: {0}")]
    Params(#[from] crate::obfuscation::ParamsError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Duplicate peer {0} in device configuration")]
    DuplicatePeer(String),

    // Control protocol errors
    #[error("UAPI write failed: {0}")]
    Uapi(#[source] std::io::Error),

    #[error("UAPI device rejected configuration (errno={0})")]
    UapiRejected(i64),

    // Peer request errors
    #[error("Peer {0} did not respond in time")]
    PeerTimeout(String),

    #[error("Peer {peer} request failed: {reason}")]
    PeerRequest { peer: String, reason: String },

    #[error("Unexpected response from peer {0}")]
    UnexpectedResponse(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    #[error("Message serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionTimeout(_)
                | Error::PeerTimeout(_)
                | Error::Network(_)
                | Error::ConnectionFailed { .. }
        )
    }

    /// Check if this error only concerns a single peer and must not abort a discovery pass
    pub fn is_peer_scoped(&self) -> bool {
        matches!(
            self,
            Error::PeerTimeout(_)
                | Error::PeerRequest { .. }
                | Error::UnexpectedResponse(_)
                | Error::ConnectionFailed { .. }
                | Error::ConnectionTimeout(_)
                | Error::Network(_)
                | Error::Serialization(_)
                | Error::Cancelled
        )
    }
}
