//! Whole-buffer encryption and decryption
//!
//! Both directions drive the stream engines over in-memory buffers, so the
//! results are byte-identical to streaming with any chunking.

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::ciphertext_len;
use crate::decrypt::DecryptingStream;
use crate::digest::Digest;
use crate::encrypt::EncryptingStream;
use crate::error::CryptoResult;
use crate::keys::KeyMaterial;

/// Output of [`encrypt_buffer`]: the full wire bytes plus what the receiver
/// needs to decrypt them.
#[derive(Debug, Clone)]
pub struct EncryptedAttachment {
    /// `IV || ciphertext || MAC`
    pub ciphertext: Vec<u8>,
    pub key: KeyMaterial,
    pub digest: Digest,
    pub unpadded_size: u64,
}

/// Encrypt `plaintext` under a fresh key and IV from the OS generator.
pub fn encrypt_buffer(plaintext: &[u8]) -> CryptoResult<EncryptedAttachment> {
    encrypt_buffer_with_rng(plaintext, &mut OsRng)
}

/// Encrypt `plaintext` under a fresh key and IV from `rng`.
pub fn encrypt_buffer_with_rng<G: RngCore + CryptoRng>(
    plaintext: &[u8],
    rng: &mut G,
) -> CryptoResult<EncryptedAttachment> {
    let mut stream = EncryptingStream::with_rng(plaintext, rng)?;
    let mut ciphertext = vec![0u8; ciphertext_len(plaintext.len() as u64) as usize];

    let mut filled = 0;
    loop {
        let n = stream.read_into(&mut ciphertext[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    ciphertext.truncate(filled);

    let info = stream.into_attachment()?;
    Ok(EncryptedAttachment {
        ciphertext,
        key: info.key,
        digest: info.digest,
        unpadded_size: info.unpadded_size,
    })
}

/// Decrypt a complete `IV || ciphertext || MAC` buffer.
///
/// No plaintext is returned unless the digest verifies, the padding is
/// valid, and the result is exactly `unpadded_size` bytes long.
pub fn decrypt_buffer(
    ciphertext: &[u8],
    key: &KeyMaterial,
    digest: &Digest,
    unpadded_size: u64,
) -> CryptoResult<Vec<u8>> {
    let capacity = usize::try_from(unpadded_size)
        .unwrap_or(0)
        .min(ciphertext.len());
    let mut stream =
        DecryptingStream::new(Vec::with_capacity(capacity), key, *digest, unpadded_size)?;

    let result = stream.consume(ciphertext).and_then(|()| stream.close());
    let mut plaintext = stream.into_inner();
    match result {
        Ok(_) => Ok(plaintext),
        Err(e) => {
            plaintext.zeroize();
            Err(e)
        }
    }
}
