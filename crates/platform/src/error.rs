//! Error types for retrossh

use std::fmt;

/// Unified error type for all retrossh operations.
///
/// Every variant except [`RetroError::AuthenticationFailed`] is fatal for the
/// connection it came from. Callers decide what to do next with
/// [`RetroError::is_retryable`] and [`RetroError::is_host_key_failure`].
#[derive(Debug)]
pub enum RetroError {
    /// I/O error (socket failure, short read, timeout)
    Io(std::io::Error),

    /// The server does not speak protocol major version 1
    Version(String),

    /// A packet of the wrong type arrived
    UnexpectedPacket {
        /// What the protocol state machine was waiting for
        expected: &'static str,
        /// Type code actually received
        actual: u8,
    },

    /// None of the client's ciphers is offered by the server
    CipherNegotiation {
        /// Server's supported-ciphers bitmask
        offered: u32,
    },

    /// The host key does not match the one on record (possible tampering)
    HostKeyMismatch {
        /// Host whose key was rejected
        host: String,
    },

    /// The server rejected the password
    AuthenticationFailed,

    /// Packet failed its CRC check or is malformed at the framing level
    Integrity(String),

    /// The server closed the session, carrying its diagnostic text
    Disconnected(String),

    /// Malformed payload content
    Protocol(String),

    /// Blocking I/O was aborted by the cancellation flag
    Cancelled,

    /// Configuration error
    Config(String),
}

impl RetroError {
    /// Whether the caller may retry with different credentials.
    ///
    /// Only a rejected password is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetroError::AuthenticationFailed)
    }

    /// Whether this error reports a host key that failed verification.
    pub fn is_host_key_failure(&self) -> bool {
        matches!(self, RetroError::HostKeyMismatch { .. })
    }
}

impl fmt::Display for RetroError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetroError::Io(e) => write!(f, "IO error: {}", e),
            RetroError::Version(line) => {
                write!(f, "Unsupported protocol version: '{}'", line)
            }
            RetroError::UnexpectedPacket { expected, actual } => write!(
                f,
                "Protocol error: expected {} packet, received type {}",
                expected, actual
            ),
            RetroError::CipherNegotiation { offered } => write!(
                f,
                "Cipher negotiation failed: no supported cipher in server mask {:#x}",
                offered
            ),
            RetroError::HostKeyMismatch { host } => write!(
                f,
                "Host key verification failed for '{}': key differs from the recorded one",
                host
            ),
            RetroError::AuthenticationFailed => write!(f, "Authentication failed"),
            RetroError::Integrity(msg) => write!(f, "Integrity error: {}", msg),
            RetroError::Disconnected(reason) => write!(f, "Server disconnected: {}", reason),
            RetroError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            RetroError::Cancelled => write!(f, "Operation cancelled"),
            RetroError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for RetroError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetroError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RetroError {
    fn from(err: std::io::Error) -> Self {
        RetroError::Io(err)
    }
}

/// Result type for retrossh operations
pub type RetroResult<T> = Result<T, RetroError>;
