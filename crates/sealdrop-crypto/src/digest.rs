//! Attachment digest: HMAC-SHA256 over `IV || ciphertext`
//!
//! The digest doubles as the trailing MAC of the wire format, so the value
//! handed out alongside the key is byte-identical to the last 32 bytes of
//! the encrypted stream.

use std::fmt;

use hmac::Mac;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::KeyMaterial;
use crate::primitives::{ct_eq, HmacSha256};
use crate::{MAC_KEY_SIZE, MAC_SIZE};

#[derive(Clone, Copy)]
pub struct Digest([u8; MAC_SIZE]);

impl Digest {
    pub fn from_bytes(bytes: [u8; MAC_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; MAC_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidDigestLength {
                    expected: MAC_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; MAC_SIZE] {
        &self.0
    }

    /// Constant-time comparison against raw candidate bytes.
    pub fn matches(&self, candidate: &[u8]) -> bool {
        ct_eq(&self.0, candidate)
    }

    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Digest {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for Digest {}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

/// Running HMAC-SHA256 over everything that precedes the trailing MAC.
#[derive(Clone)]
pub struct MacAccumulator {
    mac: HmacSha256,
    len: u64,
}

impl MacAccumulator {
    pub fn new(mac_key: &[u8; MAC_KEY_SIZE]) -> CryptoResult<Self> {
        let mac = <HmacSha256 as Mac>::new_from_slice(mac_key).map_err(|_| {
            CryptoError::InvalidKeyLength {
                expected: MAC_KEY_SIZE,
                actual: mac_key.len(),
            }
        })?;
        Ok(Self { mac, len: 0 })
    }

    pub fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
        self.len += data.len() as u64;
    }

    /// Bytes fed so far.
    pub fn authenticated_len(&self) -> u64 {
        self.len
    }

    /// Compute the digest of everything fed so far. The accumulator is left
    /// untouched.
    pub fn finalize(&self) -> Digest {
        let tag = self.mac.clone().finalize().into_bytes();
        let mut out = [0u8; MAC_SIZE];
        out.copy_from_slice(&tag);
        Digest(out)
    }
}

/// Digest of a complete `iv || ciphertext` body.
pub fn compute_digest(key: &KeyMaterial, body: &[u8]) -> CryptoResult<Digest> {
    let mut acc = MacAccumulator::new(key.mac_key())?;
    acc.update(body);
    Ok(acc.finalize())
}

/// Verify a complete `iv || ciphertext` body against `expected`.
pub fn verify_digest(key: &KeyMaterial, body: &[u8], expected: &Digest) -> CryptoResult<()> {
    if compute_digest(key, body)? == *expected {
        Ok(())
    } else {
        Err(CryptoError::DigestMismatch)
    }
}
