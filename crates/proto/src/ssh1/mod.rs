//! SSH-1.5 protocol client.
//!
//! # Architecture
//!
//! Bottom up:
//!
//! 1. **Framing** ([`packet`], [`message`]) - length, padding, type, CRC32
//! 2. **Crypto** ([`crypto`], [`rsa`]) - Blowfish-CBC, PKCS#1 session key wrap
//! 3. **Trust** ([`known_hosts`]) - trust-on-first-use host key store
//! 4. **Transport** ([`stream`], [`cancel`]) - packet halves of the socket and
//!    the byte streams of the remote process
//! 5. **Client** ([`client`], [`connection`]) - handshake state machine and
//!    the wrapper handed to callers
//!
//! # Security Considerations
//!
//! SSH-1.5 is obsolete and has known weaknesses (CRC32 instead of a MAC,
//! unauthenticated trust-on-first-use host keys). It exists here to reach
//! servers that speak nothing newer.
//!
//! - Host keys that differ from the recorded one are always rejected
//! - Passwords and session keys are never logged
//! - Packet lengths are bounded before any allocation
//!
//! # Example
//!
//! ```rust,no_run
//! use retrossh_proto::ssh1::{ClientConfig, Connection};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = ClientConfig::new("legacy.example.com", "alice", "secret");
//! config.command = Some("uname -a".to_string());
//!
//! let result = Connection::execute(config).await?;
//! println!("{}", String::from_utf8_lossy(&result.output));
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod client;
pub mod connection;
pub mod crypto;
pub mod known_hosts;
pub mod message;
pub mod packet;
pub mod rsa;
pub mod stream;
pub mod version;

pub use cancel::CancelToken;
pub use client::{Client, ClientConfig, ClientState};
pub use connection::{CommandOutput, Connection};
pub use known_hosts::{HostKeyStatus, KnownHostsFile};
pub use message::MessageType;
pub use packet::{ClientPacket, ServerPacket};
pub use stream::{SessionReader, SessionWriter};
pub use version::Version;
