//! SSH-1.5 symmetric ciphers and cipher negotiation.
//!
//! The server advertises its ciphers as a bitmask where bit `n` stands for
//! cipher id `n`. The client walks a fixed preference list and takes the
//! first cipher the server also supports.
//!
//! Supported ciphers form a closed set:
//! - `none` (id 0) - identity transform
//! - `blowfish` (id 6) - Blowfish-CBC with a zero IV, keyed with the full
//!   32-byte session key, 32-bit words in little-endian order as the
//!   reference implementation does it
//!
//! Each direction keeps its own CBC chain, so the inbound and outbound halves
//! of a connection each hold their own [`Cipher`] built from the same key.
//!
//! # Example
//!
//! ```rust
//! use retrossh_proto::ssh1::crypto::{select_cipher, Cipher, CipherKind, PREFERRED_CIPHERS};
//!
//! let offered = CipherKind::Blowfish.mask_bit() | (1 << 3);
//! let kind = select_cipher(PREFERRED_CIPHERS, offered).unwrap();
//! assert_eq!(kind, CipherKind::Blowfish);
//!
//! let key = [7u8; 32];
//! let mut outbound = Cipher::new(kind, &key).unwrap();
//! let mut inbound = Cipher::new(kind, &key).unwrap();
//!
//! let mut data = *b"sixteen byte msg";
//! outbound.encipher(&mut data).unwrap();
//! inbound.decipher(&mut data).unwrap();
//! assert_eq!(&data, b"sixteen byte msg");
//! ```

use blowfish::BlowfishLE;
use cbc::{Decryptor, Encryptor};
use cipher::generic_array::GenericArray;
use cipher::{BlockDecryptMut, BlockEncryptMut, InnerIvInit, KeyInit};
use retrossh_platform::{RetroError, RetroResult};

type BlowfishCbcEnc = Encryptor<BlowfishLE>;
type BlowfishCbcDec = Decryptor<BlowfishLE>;

/// Cipher block size; every encrypted region is a multiple of this.
pub const BLOCK_SIZE: usize = 8;

/// Length of the negotiated session key.
pub const SESSION_KEY_LEN: usize = 32;

/// Ciphers the client offers, most preferred first.
///
/// Only Blowfish is offered, so negotiation is a presence check.
pub const PREFERRED_CIPHERS: &[CipherKind] = &[CipherKind::Blowfish];

/// SSH-1.5 cipher identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CipherKind {
    /// No encryption.
    None = 0,
    /// Blowfish in CBC mode.
    Blowfish = 6,
}

impl CipherKind {
    /// Returns the wire identifier.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Parses a wire identifier.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(CipherKind::None),
            6 => Some(CipherKind::Blowfish),
            _ => None,
        }
    }

    /// Returns the conventional cipher name.
    pub fn name(self) -> &'static str {
        match self {
            CipherKind::None => "none",
            CipherKind::Blowfish => "blowfish",
        }
    }

    /// Returns this cipher's bit in a supported-ciphers mask.
    pub fn mask_bit(self) -> u32 {
        1u32 << self.id()
    }
}

/// Picks the first cipher of `preferred` present in the server's mask.
///
/// # Errors
///
/// Returns [`RetroError::CipherNegotiation`] if no preferred cipher is offered.
pub fn select_cipher(preferred: &[CipherKind], supported_mask: u32) -> RetroResult<CipherKind> {
    preferred
        .iter()
        .copied()
        .find(|kind| supported_mask & kind.mask_bit() != 0)
        .ok_or(RetroError::CipherNegotiation {
            offered: supported_mask,
        })
}

/// Stateful cipher bound to a session key.
pub enum Cipher {
    /// Identity transform.
    None,
    /// Blowfish-CBC, one chain per direction.
    Blowfish {
        /// Outbound chain
        enc: Box<BlowfishCbcEnc>,
        /// Inbound chain
        dec: Box<BlowfishCbcDec>,
    },
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("kind", &self.kind())
            .field("state", &"<redacted>")
            .finish()
    }
}

impl Cipher {
    /// Creates a cipher of the given kind keyed with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RetroError::Config`] if the key is shorter than
    /// [`SESSION_KEY_LEN`].
    pub fn new(kind: CipherKind, key: &[u8]) -> RetroResult<Self> {
        if key.len() < SESSION_KEY_LEN {
            return Err(RetroError::Config(format!(
                "Insufficient key material: expected {}, got {}",
                SESSION_KEY_LEN,
                key.len()
            )));
        }

        match kind {
            CipherKind::None => Ok(Cipher::None),
            CipherKind::Blowfish => {
                let key = &key[..SESSION_KEY_LEN];
                let enc_inner = BlowfishLE::new_from_slice(key)
                    .map_err(|_| RetroError::Config("Invalid Blowfish key".to_string()))?;
                let dec_inner = BlowfishLE::new_from_slice(key)
                    .map_err(|_| RetroError::Config("Invalid Blowfish key".to_string()))?;
                Ok(Cipher::Blowfish {
                    enc: Box::new(BlowfishCbcEnc::inner_iv_init(
                        enc_inner,
                        &Default::default(),
                    )),
                    dec: Box::new(BlowfishCbcDec::inner_iv_init(
                        dec_inner,
                        &Default::default(),
                    )),
                })
            }
        }
    }

    /// Returns the cipher kind.
    pub fn kind(&self) -> CipherKind {
        match self {
            Cipher::None => CipherKind::None,
            Cipher::Blowfish { .. } => CipherKind::Blowfish,
        }
    }

    /// Encrypts `data` in place, continuing the outbound chain.
    ///
    /// # Errors
    ///
    /// Returns [`RetroError::Integrity`] if `data` is not block aligned.
    pub fn encipher(&mut self, data: &mut [u8]) -> RetroResult<()> {
        check_aligned(data)?;
        if let Cipher::Blowfish { enc, .. } = self {
            for block in data.chunks_exact_mut(BLOCK_SIZE) {
                enc.encrypt_block_mut(GenericArray::from_mut_slice(block));
            }
        }
        Ok(())
    }

    /// Decrypts `data` in place, continuing the inbound chain.
    ///
    /// # Errors
    ///
    /// Returns [`RetroError::Integrity`] if `data` is not block aligned.
    pub fn decipher(&mut self, data: &mut [u8]) -> RetroResult<()> {
        check_aligned(data)?;
        if let Cipher::Blowfish { dec, .. } = self {
            for block in data.chunks_exact_mut(BLOCK_SIZE) {
                dec.decrypt_block_mut(GenericArray::from_mut_slice(block));
            }
        }
        Ok(())
    }
}

fn check_aligned(data: &[u8]) -> RetroResult<()> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(RetroError::Integrity(format!(
            "Cipher input of {} bytes is not a multiple of {}",
            data.len(),
            BLOCK_SIZE
        )));
    }
    Ok(())
}
