//! Single-call building blocks: AES-256-CBC chaining, HMAC-SHA256, PKCS#7
//! padding, constant-time comparison, and CSPRNG fills.
//!
//! CBC is driven one block at a time so the stream engines can interleave it
//! with arbitrary I/O chunking.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256Dec, Aes256Enc, Block};
use hmac::Hmac;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{BLOCK_SIZE, CIPHER_KEY_SIZE, IV_SIZE};

pub type HmacSha256 = Hmac<Sha256>;

/// AES-256 encryptor carrying the CBC chaining value between calls.
pub struct CbcEncryptor {
    cipher: Aes256Enc,
    chain: [u8; BLOCK_SIZE],
}

impl CbcEncryptor {
    pub fn new(key: &[u8; CIPHER_KEY_SIZE], iv: &[u8; IV_SIZE]) -> Self {
        Self {
            cipher: Aes256Enc::new(key.into()),
            chain: *iv,
        }
    }

    /// Encrypt one plaintext block in place.
    pub fn encrypt_block(&mut self, block: &mut [u8; BLOCK_SIZE]) {
        xor_in_place(block, &self.chain);
        let mut aes_block = Block::from(*block);
        self.cipher.encrypt_block(&mut aes_block);
        block.copy_from_slice(&aes_block);
        self.chain = *block;
    }
}

/// AES-256 decryptor carrying the CBC chaining value between calls.
///
/// The IV is usually not known when the key is: call [`CbcDecryptor::set_iv`]
/// before the first block.
pub struct CbcDecryptor {
    cipher: Aes256Dec,
    chain: [u8; BLOCK_SIZE],
}

impl CbcDecryptor {
    pub fn new(key: &[u8; CIPHER_KEY_SIZE]) -> Self {
        Self {
            cipher: Aes256Dec::new(key.into()),
            chain: [0u8; BLOCK_SIZE],
        }
    }

    pub fn set_iv(&mut self, iv: &[u8; IV_SIZE]) {
        self.chain = *iv;
    }

    /// Decrypt one ciphertext block in place.
    pub fn decrypt_block(&mut self, block: &mut [u8; BLOCK_SIZE]) {
        let next_chain = *block;
        let mut aes_block = Block::from(*block);
        self.cipher.decrypt_block(&mut aes_block);
        block.copy_from_slice(&aes_block);
        xor_in_place(block, &self.chain);
        self.chain = next_chain;
    }
}

fn xor_in_place(block: &mut [u8; BLOCK_SIZE], other: &[u8; BLOCK_SIZE]) {
    for (b, o) in block.iter_mut().zip(other) {
        *b ^= o;
    }
}

/// Complete the final block with PKCS#7 padding.
///
/// `tail` holds the trailing `0..BLOCK_SIZE` plaintext bytes; an empty tail
/// yields a full block of padding.
pub fn pkcs7_pad(tail: &[u8]) -> [u8; BLOCK_SIZE] {
    debug_assert!(tail.len() < BLOCK_SIZE);
    let pad = (BLOCK_SIZE - tail.len()) as u8;
    let mut block = [pad; BLOCK_SIZE];
    block[..tail.len()].copy_from_slice(tail);
    block
}

/// Number of data bytes in a PKCS#7-padded final block, or `None` when the
/// padding is structurally invalid.
///
/// Every padding byte is inspected regardless of where a mismatch occurs.
pub fn pkcs7_unpad(block: &[u8; BLOCK_SIZE]) -> Option<usize> {
    let pad = block[BLOCK_SIZE - 1];
    if pad == 0 || pad as usize > BLOCK_SIZE {
        return None;
    }
    let data_len = BLOCK_SIZE - pad as usize;
    let mut diff = 0u8;
    for &b in &block[data_len..] {
        diff |= b ^ pad;
    }
    (diff == 0).then_some(data_len)
}

/// Constant-time equality. Slices of different length compare unequal.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Fill `buf` from a cryptographically secure generator.
pub fn fill_random<G: RngCore + CryptoRng>(rng: &mut G, buf: &mut [u8]) {
    rng.fill_bytes(buf);
}
