//! Session key material and IV generation

use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptoError, CryptoResult};
use crate::primitives::{ct_eq, fill_random};
use crate::{CIPHER_KEY_SIZE, IV_SIZE, KEY_SIZE, MAC_KEY_SIZE};

/// Combined AES-256 + HMAC-SHA256 key pair for one attachment.
///
/// Exported as `cipher_key || mac_key` (64 bytes). Zeroized on drop.
#[derive(Clone)]
pub struct KeyMaterial {
    cipher_key: [u8; CIPHER_KEY_SIZE],
    mac_key: [u8; MAC_KEY_SIZE],
}

impl KeyMaterial {
    pub fn from_parts(cipher_key: [u8; CIPHER_KEY_SIZE], mac_key: [u8; MAC_KEY_SIZE]) -> Self {
        Self {
            cipher_key,
            mac_key,
        }
    }

    /// Generate a fresh key pair from `rng`.
    pub fn generate<G: RngCore + CryptoRng>(rng: &mut G) -> Self {
        let mut key = Self::from_parts([0u8; CIPHER_KEY_SIZE], [0u8; MAC_KEY_SIZE]);
        fill_random(rng, &mut key.cipher_key);
        fill_random(rng, &mut key.mac_key);
        key
    }

    /// Import an exported key blob.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key = Self::from_parts([0u8; CIPHER_KEY_SIZE], [0u8; MAC_KEY_SIZE]);
        key.cipher_key.copy_from_slice(&bytes[..CIPHER_KEY_SIZE]);
        key.mac_key.copy_from_slice(&bytes[CIPHER_KEY_SIZE..]);
        Ok(key)
    }

    /// Export as `cipher_key || mac_key`.
    pub fn to_bytes(&self) -> Zeroizing<[u8; KEY_SIZE]> {
        let mut out = Zeroizing::new([0u8; KEY_SIZE]);
        out[..CIPHER_KEY_SIZE].copy_from_slice(&self.cipher_key);
        out[CIPHER_KEY_SIZE..].copy_from_slice(&self.mac_key);
        out
    }

    pub fn cipher_key(&self) -> &[u8; CIPHER_KEY_SIZE] {
        &self.cipher_key
    }

    pub fn mac_key(&self) -> &[u8; MAC_KEY_SIZE] {
        &self.mac_key
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        ct_eq(&self.to_bytes()[..], &other.to_bytes()[..])
    }
}

impl Eq for KeyMaterial {}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.cipher_key.zeroize();
        self.mac_key.zeroize();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("cipher_key", &"[REDACTED]")
            .field("mac_key", &"[REDACTED]")
            .finish()
    }
}

/// Per-session CBC initialization vector. Not secret, must be unpredictable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializationVector([u8; IV_SIZE]);

impl InitializationVector {
    pub fn generate<G: RngCore + CryptoRng>(rng: &mut G) -> Self {
        let mut iv = [0u8; IV_SIZE];
        fill_random(rng, &mut iv);
        Self(iv)
    }

    pub fn from_bytes(bytes: [u8; IV_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }
}
