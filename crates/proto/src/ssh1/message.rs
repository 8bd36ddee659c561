//! SSH-1.5 packet type codes.
//!
//! The protocol uses a single byte after the padding to identify each packet.
//! Codes prefixed `SMSG` travel server to client, `CMSG` client to server,
//! `MSG` in either direction.
//!
//! # Example
//!
//! ```rust
//! use retrossh_proto::ssh1::message::MessageType;
//!
//! let msg_type = MessageType::PublicKey;
//! assert_eq!(msg_type as u8, 2);
//! ```

/// SSH-1.5 packet types understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Either side is closing the connection, payload is a reason string.
    Disconnect = 1,
    /// Server and host public keys plus the anti-spoofing cookie.
    PublicKey = 2,
    /// Client's double-RSA-encrypted session key.
    SessionKey = 3,
    /// Login name.
    User = 4,
    /// Password authentication attempt.
    AuthPassword = 9,
    /// Pseudo-terminal allocation request.
    RequestPty = 10,
    /// Start an interactive shell.
    ExecShell = 12,
    /// Start a remote command.
    ExecCmd = 13,
    /// Generic success reply.
    Success = 14,
    /// Generic failure reply.
    Failure = 15,
    /// Data for the remote process' stdin.
    StdinData = 16,
    /// Data from the remote process' stdout.
    StdoutData = 17,
    /// Data from the remote process' stderr.
    StderrData = 18,
    /// Remote process exited, payload is the exit status.
    ExitStatus = 20,
    /// Client acknowledges the exit status.
    ExitConfirmation = 33,
    /// Diagnostic text, never interpreted.
    Debug = 36,
}

impl MessageType {
    /// Converts a byte to a message type.
    ///
    /// # Example
    ///
    /// ```rust
    /// use retrossh_proto::ssh1::message::MessageType;
    ///
    /// assert_eq!(MessageType::from_u8(14), Some(MessageType::Success));
    /// assert_eq!(MessageType::from_u8(255), None);
    /// ```
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MessageType::Disconnect),
            2 => Some(MessageType::PublicKey),
            3 => Some(MessageType::SessionKey),
            4 => Some(MessageType::User),
            9 => Some(MessageType::AuthPassword),
            10 => Some(MessageType::RequestPty),
            12 => Some(MessageType::ExecShell),
            13 => Some(MessageType::ExecCmd),
            14 => Some(MessageType::Success),
            15 => Some(MessageType::Failure),
            16 => Some(MessageType::StdinData),
            17 => Some(MessageType::StdoutData),
            18 => Some(MessageType::StderrData),
            20 => Some(MessageType::ExitStatus),
            33 => Some(MessageType::ExitConfirmation),
            36 => Some(MessageType::Debug),
            _ => None,
        }
    }

    /// Returns the protocol name of this packet type.
    pub fn name(&self) -> &'static str {
        match self {
            MessageType::Disconnect => "SSH_MSG_DISCONNECT",
            MessageType::PublicKey => "SSH_SMSG_PUBLIC_KEY",
            MessageType::SessionKey => "SSH_CMSG_SESSION_KEY",
            MessageType::User => "SSH_CMSG_USER",
            MessageType::AuthPassword => "SSH_CMSG_AUTH_PASSWORD",
            MessageType::RequestPty => "SSH_CMSG_REQUEST_PTY",
            MessageType::ExecShell => "SSH_CMSG_EXEC_SHELL",
            MessageType::ExecCmd => "SSH_CMSG_EXEC_CMD",
            MessageType::Success => "SSH_SMSG_SUCCESS",
            MessageType::Failure => "SSH_SMSG_FAILURE",
            MessageType::StdinData => "SSH_CMSG_STDIN_DATA",
            MessageType::StdoutData => "SSH_SMSG_STDOUT_DATA",
            MessageType::StderrData => "SSH_SMSG_STDERR_DATA",
            MessageType::ExitStatus => "SSH_SMSG_EXITSTATUS",
            MessageType::ExitConfirmation => "SSH_CMSG_EXIT_CONFIRMATION",
            MessageType::Debug => "SSH_MSG_DEBUG",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8)
    }
}
