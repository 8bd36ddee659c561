//! RSA public-key operations used by the SSH-1.5 key exchange.
//!
//! The server sends two RSA public keys: a short-lived *server key* that is
//! regenerated periodically and a long-lived *host key* that identifies the
//! machine. The client proves nothing with them; it only encrypts the
//! session key twice so that both private keys are needed to recover it.
//!
//! # Session key wrapping
//!
//! ```text
//! session_id = MD5(host_modulus || server_modulus || cookie)
//! wrapped    = RSA_outer(RSA_inner(session_key XOR session_id))
//! ```
//!
//! PKCS#1 output is as long as the modulus, so the key with the smaller
//! modulus has to be applied first and the larger one wraps its output.
//!
//! Integers cross the RSA boundary in their minimal big-endian form, as the
//! server converts each decryption result back to an integer.

use md5::{Digest, Md5};
use num_bigint::BigUint;
use rand::RngCore;
use retrossh_platform::{RetroError, RetroResult};

/// PKCS#1 v1.5 overhead: 0x00, block type, at least 8 padding bytes, 0x00.
pub const PKCS1_OVERHEAD: usize = 11;

/// Length of the anti-spoofing cookie.
pub const COOKIE_LEN: usize = 8;

/// Length of the session identifier (an MD5 digest).
pub const SESSION_ID_LEN: usize = 16;

/// RSA public key as sent in `SSH_SMSG_PUBLIC_KEY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    bits: u32,
    exponent: BigUint,
    modulus: BigUint,
}

impl RsaPublicKey {
    /// Creates a key from its advertised bit length, exponent and modulus.
    pub fn new(bits: u32, exponent: BigUint, modulus: BigUint) -> Self {
        Self {
            bits,
            exponent,
            modulus,
        }
    }

    /// Returns the advertised bit length.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Returns the public exponent.
    pub fn exponent(&self) -> &BigUint {
        &self.exponent
    }

    /// Returns the modulus.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Returns the modulus length in bytes.
    pub fn modulus_len(&self) -> usize {
        ((self.modulus.bits() + 7) / 8) as usize
    }

    /// Encrypts `data` with PKCS#1 v1.5 block type 2.
    ///
    /// The result is exactly [`RsaPublicKey::modulus_len`] bytes long.
    ///
    /// # Errors
    ///
    /// Returns [`RetroError::Protocol`] if `data` does not fit under the
    /// modulus with the required padding.
    pub fn encrypt_pkcs1(&self, data: &[u8]) -> RetroResult<Vec<u8>> {
        let k = self.modulus_len();
        if data.len() + PKCS1_OVERHEAD > k {
            return Err(RetroError::Protocol(format!(
                "RSA input of {} bytes too long for {}-byte modulus",
                data.len(),
                k
            )));
        }

        let mut block = vec![0u8; k];
        block[1] = 2;
        let pad_end = k - data.len() - 1;
        fill_nonzero(&mut block[2..pad_end]);
        block[pad_end] = 0;
        block[pad_end + 1..].copy_from_slice(data);

        let m = BigUint::from_bytes_be(&block);
        let c = m.modpow(&self.exponent, &self.modulus);

        let raw = c.to_bytes_be();
        let mut out = vec![0u8; k - raw.len()];
        out.extend_from_slice(&raw);
        Ok(out)
    }

    /// MD5 fingerprint of modulus and exponent, colon separated hex.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.modulus.to_bytes_be());
        hasher.update(self.exponent.to_bytes_be());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

fn fill_nonzero(buf: &mut [u8]) {
    let mut rng = rand::thread_rng();
    rng.fill_bytes(buf);
    for b in buf.iter_mut() {
        while *b == 0 {
            *b = (rng.next_u32() & 0xff) as u8;
        }
    }
}

/// Computes the session identifier both sides bind the exchange to.
pub fn session_id(
    host_modulus: &BigUint,
    server_modulus: &BigUint,
    cookie: &[u8],
) -> [u8; SESSION_ID_LEN] {
    let mut hasher = Md5::new();
    hasher.update(host_modulus.to_bytes_be());
    hasher.update(server_modulus.to_bytes_be());
    hasher.update(cookie);
    hasher.finalize().into()
}

/// XORs the leading bytes of `session_key` with `session_id`.
pub fn xor_session_id(session_key: &[u8], session_id: &[u8; SESSION_ID_LEN]) -> Vec<u8> {
    let mut out = session_key.to_vec();
    for (b, id) in out.iter_mut().zip(session_id.iter()) {
        *b ^= id;
    }
    out
}

/// Double-encrypts an already XORed session key.
///
/// The key with the smaller modulus is applied first.
pub fn wrap_session_key(
    xored_key: &[u8],
    server_key: &RsaPublicKey,
    host_key: &RsaPublicKey,
) -> RetroResult<BigUint> {
    let (inner, outer) = if server_key.modulus() < host_key.modulus() {
        (server_key, host_key)
    } else {
        (host_key, server_key)
    };

    let key_int = BigUint::from_bytes_be(xored_key);
    let first = BigUint::from_bytes_be(&inner.encrypt_pkcs1(&key_int.to_bytes_be())?);
    let second = outer.encrypt_pkcs1(&first.to_bytes_be())?;
    Ok(BigUint::from_bytes_be(&second))
}


#[cfg(test)]
mod tests {
    use super::test_keys::*;
    use super::*;

    fn e() -> BigUint {
        BigUint::from(65537u32)
    }

    fn small_key() -> RsaPublicKey {
        RsaPublicKey::new(768, e(), hex(SMALL_N))
    }

    fn large_key() -> RsaPublicKey {
        RsaPublicKey::new(1024, e(), hex(LARGE_N))
    }

    #[test]
    fn test_pkcs1_output_length_matches_modulus() {
        let key = small_key();
        let out = key.encrypt_pkcs1(b"hello").unwrap();
        assert_eq!(out.len(), 96);
        assert_eq!(key.modulus_len(), 96);
    }

    #[test]
    fn test_pkcs1_decrypts_to_input() {
        let key = large_key();
        let data = b"thirty-two bytes of session key!";
        let out = key.encrypt_pkcs1(data).unwrap();
        let plain = decrypt(&BigUint::from_bytes_be(&out), &hex(LARGE_D), &hex(LARGE_N));
        assert_eq!(&plain[..], &data[..]);
    }

    #[test]
    fn test_pkcs1_is_randomized() {
        let key = small_key();
        let a = key.encrypt_pkcs1(b"same").unwrap();
        let b = key.encrypt_pkcs1(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_pkcs1_rejects_oversized_input() {
        let key = small_key();
        assert!(key.encrypt_pkcs1(&[1u8; 86]).is_err());
        assert!(key.encrypt_pkcs1(&[1u8; 85]).is_ok());
    }

    #[test]
    fn test_session_id_is_md5_of_moduli_and_cookie() {
        let host = hex(LARGE_N);
        let server = hex(SMALL_N);
        let cookie = [1, 2, 3, 4, 5, 6, 7, 8];

        let mut hasher = Md5::new();
        hasher.update(host.to_bytes_be());
        hasher.update(server.to_bytes_be());
        hasher.update(cookie);
        let expected: [u8; 16] = hasher.finalize().into();

        assert_eq!(session_id(&host, &server, &cookie), expected);
    }

    #[test]
    fn test_xor_touches_only_leading_bytes() {
        let key = [0xffu8; 32];
        let id = [0x0fu8; 16];
        let out = xor_session_id(&key, &id);
        assert!(out[..16].iter().all(|&b| b == 0xf0));
        assert!(out[16..].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_wrap_order_smaller_modulus_innermost() {
        let session_key: Vec<u8> = (1..=32).collect();

        // Same result whichever role the larger key plays
        for (server, host, server_d, host_d) in [
            (small_key(), large_key(), SMALL_D, LARGE_D),
            (large_key(), small_key(), LARGE_D, SMALL_D),
        ] {
            let wrapped = wrap_session_key(&session_key, &server, &host).unwrap();

            let (outer_key, outer_d, inner_key, inner_d) = if server.modulus() > host.modulus() {
                (&server, server_d, &host, host_d)
            } else {
                (&host, host_d, &server, server_d)
            };

            let middle = decrypt(&wrapped, &hex(outer_d), outer_key.modulus());
            let plain = decrypt(
                &BigUint::from_bytes_be(&middle),
                &hex(inner_d),
                inner_key.modulus(),
            );
            assert_eq!(plain, session_key);
        }
    }

    #[test]
    fn test_fingerprint_format() {
        let fp = small_key().fingerprint();
        assert_eq!(fp.len(), 16 * 3 - 1);
        assert_eq!(fp.matches(':').count(), 15);
    }
}
