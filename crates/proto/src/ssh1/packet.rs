//! SSH-1.5 binary packet protocol.
//!
//! # Packet Format
//!
//! ```text
//! uint32    length          (type + payload + crc, padding excluded)
//! byte[p]   padding         (p = 8 - length % 8, so 1..=8 bytes)
//! byte      type
//! byte[n]   payload         (n = length - 5)
//! uint32    crc32           (over padding + type + payload)
//! ```
//!
//! Everything after the length field is `length + p` bytes, always a multiple
//! of 8, and is the region the session cipher encrypts. The CRC is computed on
//! the plaintext before encryption and checked after decryption.
//!
//! Padding is random once a cipher is installed and zero before that.
//!
//! # Payload Encoding
//!
//! - `uint32`: 4 bytes big-endian
//! - `string`: uint32 length followed by the bytes
//! - `mp-int`: uint16 bit count followed by the big-endian magnitude
//!
//! # Example
//!
//! ```rust
//! use retrossh_proto::ssh1::message::MessageType;
//! use retrossh_proto::ssh1::packet::{ClientPacket, ServerPacket};
//!
//! let packet = ClientPacket::new(MessageType::User, b"\0\0\0\x05alice", None).unwrap();
//! assert_eq!((packet.len() - 4) % 8, 0);
//!
//! let mut parsed = ServerPacket::decode(packet.as_bytes(), None).unwrap();
//! assert_eq!(parsed.message(), Some(MessageType::User));
//! assert_eq!(&parsed.read_string().unwrap()[..], b"alice");
//! parsed.close(true).unwrap();
//! ```

use crate::ssh1::crypto::{Cipher, BLOCK_SIZE};
use crate::ssh1::message::MessageType;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_bigint::BigUint;
use rand::RngCore;
use retrossh_platform::{RetroError, RetroResult};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Maximum accepted value of the length field.
pub const MAX_PACKET_LENGTH: usize = 256 * 1024;

/// Smallest legal length field: type byte plus CRC.
pub const MIN_PACKET_LENGTH: usize = 5;

/// Size of the trailing CRC32.
pub const CRC_LEN: usize = 4;

/// Inbound data is read and decrypted in chunks of this many bytes.
const READ_CHUNK: usize = 64 * BLOCK_SIZE;

/// Returns the number of padding bytes for a given length field.
pub fn padding_len(length: usize) -> usize {
    BLOCK_SIZE - (length % BLOCK_SIZE)
}

/// Outbound packet, immutable once encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPacket {
    bytes: Bytes,
}

impl ClientPacket {
    /// Encodes a packet, encrypting it when a cipher is given.
    ///
    /// # Errors
    ///
    /// Returns [`RetroError::Protocol`] if the payload exceeds
    /// [`MAX_PACKET_LENGTH`].
    pub fn new(
        msg_type: MessageType,
        payload: &[u8],
        cipher: Option<&mut Cipher>,
    ) -> RetroResult<Self> {
        let length = payload.len() + MIN_PACKET_LENGTH;
        if length > MAX_PACKET_LENGTH {
            return Err(RetroError::Protocol(format!(
                "Packet too large: {} bytes (maximum {})",
                length, MAX_PACKET_LENGTH
            )));
        }
        let padding = padding_len(length);

        let mut buf = BytesMut::with_capacity(4 + padding + length);
        buf.put_u32(length as u32);

        let mut pad = [0u8; BLOCK_SIZE];
        if cipher.is_some() {
            rand::thread_rng().fill_bytes(&mut pad[..padding]);
        }
        buf.put_slice(&pad[..padding]);
        buf.put_u8(msg_type as u8);
        buf.put_slice(payload);

        let crc = crc32fast::hash(&buf[4..]);
        buf.put_u32(crc);

        if let Some(cipher) = cipher {
            cipher.encipher(&mut buf[4..])?;
        }

        Ok(Self {
            bytes: buf.freeze(),
        })
    }

    /// Returns the wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the wire size, length field included.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; a packet carries at least its type and CRC.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Inbound packet with a bounded reader over its payload.
///
/// The packet is fully decrypted when constructed; the payload accessors
/// consume it front to back and fail instead of reading past its end.
/// [`ServerPacket::close`] drains what is left and validates the CRC.
#[derive(Debug)]
pub struct ServerPacket {
    msg_type: u8,
    payload: Bytes,
    expected_crc: u32,
    computed_crc: u32,
}

impl ServerPacket {
    /// Reads one packet from `reader`, decrypting as data arrives.
    ///
    /// # Errors
    ///
    /// Returns [`RetroError::Io`] on a short read and
    /// [`RetroError::Integrity`] on an impossible length field.
    pub async fn read<R>(reader: &mut R, mut cipher: Option<&mut Cipher>) -> RetroResult<Self>
    where
        R: AsyncRead + Unpin,
    {
        let length = reader.read_u32().await? as usize;
        check_length(length)?;

        let total = length + padding_len(length);
        let mut body = BytesMut::zeroed(total);
        let mut filled = 0;
        while filled < total {
            let end = (filled + READ_CHUNK).min(total);
            reader.read_exact(&mut body[filled..end]).await?;
            if let Some(cipher) = cipher.as_deref_mut() {
                cipher.decipher(&mut body[filled..end])?;
            }
            filled = end;
        }

        Ok(Self::from_plaintext(length, body))
    }

    /// Decodes one packet from a complete wire buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RetroError::Integrity`] if the buffer is truncated or the
    /// length field is out of range.
    pub fn decode(data: &[u8], cipher: Option<&mut Cipher>) -> RetroResult<Self> {
        if data.len() < 4 {
            return Err(RetroError::Integrity(format!(
                "Packet too short: {} bytes",
                data.len()
            )));
        }
        let mut buf = data;
        let length = buf.get_u32() as usize;
        check_length(length)?;

        let total = length + padding_len(length);
        if buf.len() < total {
            return Err(RetroError::Integrity(format!(
                "Incomplete packet: expected {} bytes, got {} bytes",
                total,
                buf.len()
            )));
        }

        let mut body = BytesMut::from(&buf[..total]);
        if let Some(cipher) = cipher {
            cipher.decipher(&mut body)?;
        }

        Ok(Self::from_plaintext(length, body))
    }

    fn from_plaintext(length: usize, mut body: BytesMut) -> Self {
        let padding = body.len() - length;
        let crc_at = body.len() - CRC_LEN;
        let computed_crc = crc32fast::hash(&body[..crc_at]);
        let expected_crc = u32::from_be_bytes([
            body[crc_at],
            body[crc_at + 1],
            body[crc_at + 2],
            body[crc_at + 3],
        ]);

        body.truncate(crc_at);
        body.advance(padding);
        let msg_type = body.get_u8();

        Self {
            msg_type,
            payload: body.freeze(),
            expected_crc,
            computed_crc,
        }
    }

    /// Returns the raw type code.
    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    /// Returns the type code as a known message, if it is one.
    pub fn message(&self) -> Option<MessageType> {
        MessageType::from_u8(self.msg_type)
    }

    /// Whether the packet is of type `msg_type`.
    pub fn is(&self, msg_type: MessageType) -> bool {
        self.msg_type == msg_type as u8
    }

    /// Returns the number of unread payload bytes.
    pub fn remaining(&self) -> usize {
        self.payload.len()
    }

    fn need(&self, n: usize, what: &str) -> RetroResult<()> {
        if self.payload.len() < n {
            return Err(RetroError::Protocol(format!(
                "Truncated {} in packet type {}: need {} bytes, {} left",
                what,
                self.msg_type,
                n,
                self.payload.len()
            )));
        }
        Ok(())
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> RetroResult<u8> {
        self.need(1, "byte")?;
        Ok(self.payload.get_u8())
    }

    /// Reads a big-endian `uint16`.
    pub fn read_u16(&mut self) -> RetroResult<u16> {
        self.need(2, "uint16")?;
        Ok(self.payload.get_u16())
    }

    /// Reads a big-endian `uint32`.
    pub fn read_u32(&mut self) -> RetroResult<u32> {
        self.need(4, "uint32")?;
        Ok(self.payload.get_u32())
    }

    /// Reads exactly `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> RetroResult<Bytes> {
        self.need(n, "bytes")?;
        Ok(self.payload.split_to(n))
    }

    /// Reads a length-prefixed `string`.
    pub fn read_string(&mut self) -> RetroResult<Bytes> {
        let len = self.read_u32()? as usize;
        self.need(len, "string")?;
        Ok(self.payload.split_to(len))
    }

    /// Reads an `mp-int`.
    pub fn read_mp_int(&mut self) -> RetroResult<BigUint> {
        let bits = self.read_u16()? as usize;
        let len = (bits + 7) / 8;
        self.need(len, "mp-int")?;
        Ok(BigUint::from_bytes_be(&self.payload.split_to(len)))
    }

    /// Consumes the rest of the payload.
    pub fn read_to_end(&mut self) -> Bytes {
        self.payload.split_off(0)
    }

    /// Drains unread payload and, if `check_crc`, validates the checksum.
    ///
    /// Pass `false` only when the connection is already being torn down.
    ///
    /// # Errors
    ///
    /// Returns [`RetroError::Integrity`] on CRC mismatch.
    pub fn close(mut self, check_crc: bool) -> RetroResult<()> {
        self.payload.clear();
        if check_crc && self.expected_crc != self.computed_crc {
            return Err(RetroError::Integrity(format!(
                "CRC mismatch in packet type {}: expected {:08x}, computed {:08x}",
                self.msg_type, self.expected_crc, self.computed_crc
            )));
        }
        Ok(())
    }

    /// Validates the CRC and returns the type with the whole unread payload.
    pub fn into_verified(mut self) -> RetroResult<(u8, Bytes)> {
        let msg_type = self.msg_type;
        let payload = self.read_to_end();
        self.close(true)?;
        Ok((msg_type, payload))
    }
}

fn check_length(length: usize) -> RetroResult<()> {
    if length < MIN_PACKET_LENGTH {
        return Err(RetroError::Integrity(format!(
            "Packet too small: length field {} (minimum {})",
            length, MIN_PACKET_LENGTH
        )));
    }
    if length > MAX_PACKET_LENGTH {
        return Err(RetroError::Integrity(format!(
            "Packet too large: length field {} (maximum {})",
            length, MAX_PACKET_LENGTH
        )));
    }
    Ok(())
}

/// Appends a `string` to an outbound payload.
pub fn put_string(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}

/// Appends an `mp-int` to an outbound payload.
pub fn put_mp_int(buf: &mut BytesMut, value: &BigUint) {
    let bits = value.bits();
    buf.put_u16(bits as u16);
    if bits > 0 {
        buf.put_slice(&value.to_bytes_be());
    }
}
