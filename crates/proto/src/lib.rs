//! Client implementation of the legacy SSH-1.5 protocol.
//!
//! The crate connects to an SSH-1.5 server, logs in with a password, starts
//! one remote command and hands its stdio back as async byte streams. Framing,
//! padding, CRC32, the RSA session key exchange and Blowfish-CBC are all done
//! here at the byte level.
//!
//! # Features
//!
//! - `ssh1` (default) - SSH-1.5 client
//!
//! # Example
//!
//! ```rust
//! use retrossh_proto::ssh1::{ClientPacket, MessageType, ServerPacket};
//!
//! // Frame a packet and parse it back
//! let packet = ClientPacket::new(MessageType::Success, b"", None).unwrap();
//! let parsed = ServerPacket::decode(packet.as_bytes(), None).unwrap();
//! assert!(parsed.is(MessageType::Success));
//! ```
//!
//! # Non-goals
//!
//! SSH protocol version 2, multiple channels, public key authentication,
//! compression and rekeying.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

#[cfg(feature = "ssh1")]
pub mod ssh1;
