//! sealdrop-crypto: streaming authenticated encryption for attachments
//!
//! Construction: AES-256-CBC + HMAC-SHA256 (encrypt-then-MAC)
//!
//! Wire format:
//! ```text
//! [16 bytes: IV][16·n bytes: ciphertext, PKCS#7 padded, n >= 1][32 bytes: HMAC-SHA256(mac_key, IV || ciphertext)]
//! ```
//!
//! Each attachment gets its own 64-byte key (`cipher_key || mac_key`) and IV.
//! The receiver needs the key, the digest (equal to the trailing MAC) and the
//! unpadded plaintext size, all exchanged out of band.
//!
//! Only `mac_key` is authenticated. A corrupted `mac_key`, ciphertext or
//! digest fails with [`CryptoError::DigestMismatch`], but a corrupted
//! `cipher_key` passes the MAC check and surfaces as
//! [`CryptoError::InvalidPadding`] or [`CryptoError::SizeMismatch`] instead.
//! Treat any [`CryptoError::is_verification_failure`] as "wrong key or
//! tampered data".
//!
//! - [`EncryptingStream`]: pull ciphertext in any chunk size (`Read`)
//! - [`DecryptingStream`]: push ciphertext in any chunk size (`Write`)
//! - [`encrypt_buffer`] / [`decrypt_buffer`]: whole-buffer equivalents

pub mod buffer;
pub mod decrypt;
pub mod digest;
pub mod encrypt;
pub mod error;
pub mod fs;
pub mod keys;
pub mod primitives;

pub use buffer::{decrypt_buffer, encrypt_buffer, encrypt_buffer_with_rng, EncryptedAttachment};
pub use decrypt::{DecryptState, DecryptingStream};
pub use digest::{compute_digest, verify_digest, Digest, MacAccumulator};
pub use encrypt::{EncryptState, EncryptedAttachmentInfo, EncryptingStream};
pub use error::{CryptoError, CryptoResult};
pub use fs::{decrypt_to_file, encrypt_file, encrypt_file_to, encrypt_file_with_rng};
pub use keys::{InitializationVector, KeyMaterial};

/// AES block size
pub const BLOCK_SIZE: usize = 16;

/// AES-256 key size
pub const CIPHER_KEY_SIZE: usize = 32;

/// HMAC-SHA256 key size
pub const MAC_KEY_SIZE: usize = 32;

/// Exported key blob: `cipher_key || mac_key`
pub const KEY_SIZE: usize = CIPHER_KEY_SIZE + MAC_KEY_SIZE;

/// CBC initialization vector size
pub const IV_SIZE: usize = 16;

/// HMAC-SHA256 output size; also the digest size
pub const MAC_SIZE: usize = 32;

/// Encrypted length of a plaintext of `unpadded_size` bytes.
pub const fn ciphertext_len(unpadded_size: u64) -> u64 {
    let block = BLOCK_SIZE as u64;
    IV_SIZE as u64 + (unpadded_size / block + 1) * block + MAC_SIZE as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ciphertext_len() {
        assert_eq!(ciphertext_len(0), 64);
        assert_eq!(ciphertext_len(15), 64);
        assert_eq!(ciphertext_len(16), 80);
        assert_eq!(ciphertext_len(17), 80);
    }
}
