//! Integration tests for the attachment stream engines.
//!
//! Mirrors the attachment round-trip matrix: plaintexts of 0..=48 bytes,
//! encrypted by pulling ciphertext in fixed read sizes and decrypted by
//! pushing ciphertext in fixed write sizes, cross-checked against the
//! whole-buffer functions.

use std::io::Read;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sealdrop_core::StreamConfig;
use sealdrop_crypto::{
    decrypt_buffer, decrypt_to_file, encrypt_buffer, encrypt_buffer_with_rng, CryptoError,
    CryptoResult, DecryptingStream, Digest, EncryptingStream, KeyMaterial, BLOCK_SIZE, IV_SIZE,
    KEY_SIZE, MAC_SIZE,
};
use tempfile::TempDir;

const MAX_PLAIN_LEN: usize = 48;

fn plains() -> Vec<Vec<u8>> {
    (0..=MAX_PLAIN_LEN).map(|len| vec![b'0'; len]).collect()
}

fn pull_all<R: Read>(stream: &mut EncryptingStream<R>, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    while stream.has_bytes_available() {
        out.extend_from_slice(&stream.produce(chunk).unwrap());
    }
    out
}

fn push_all(
    ciphertext: &[u8],
    key: &KeyMaterial,
    digest: &Digest,
    unpadded_size: u64,
    chunk: usize,
) -> (CryptoResult<u64>, Vec<u8>) {
    let mut stream = DecryptingStream::new(Vec::new(), key, *digest, unpadded_size).unwrap();
    for part in ciphertext.chunks(chunk) {
        if let Err(e) = stream.consume(part) {
            return (Err(e), stream.into_inner());
        }
    }
    let result = stream.close();
    (result, stream.into_inner())
}

#[test]
fn streaming_encryption_decrypts_with_buffer() {
    for reading_chunk in [1, 7, 128, 4096] {
        for plain in plains() {
            let mut stream = EncryptingStream::new(&plain[..]).unwrap();
            let encrypted = pull_all(&mut stream, reading_chunk);

            let key = stream.key().unwrap();
            let digest = stream.digest().unwrap();
            let decrypted =
                decrypt_buffer(&encrypted, key, &digest, plain.len() as u64).unwrap();
            assert_eq!(decrypted, plain, "len {} chunk {reading_chunk}", plain.len());
        }
    }
}

#[test]
fn buffer_encryption_decrypts_with_streaming() {
    for writing_chunk in [1, 7, 128, 4096] {
        for plain in plains() {
            let enc = encrypt_buffer(&plain).unwrap();
            let (result, decrypted) = push_all(
                &enc.ciphertext,
                &enc.key,
                &enc.digest,
                enc.unpadded_size,
                writing_chunk,
            );
            assert_eq!(result.unwrap(), plain.len() as u64);
            assert_eq!(decrypted, plain, "len {} chunk {writing_chunk}", plain.len());
        }
    }
}

#[test]
fn streaming_decryption_into_files() {
    let tmp = TempDir::new().unwrap();
    for writing_chunk in [128, 4096] {
        let config = StreamConfig {
            write_chunk_size: writing_chunk,
            ..StreamConfig::default()
        };
        for (i, plain) in plains().into_iter().enumerate() {
            let enc = encrypt_buffer(&plain).unwrap();
            let dest = tmp.path().join(format!("{i}.bin"));
            decrypt_to_file(
                &enc.ciphertext[..],
                &dest,
                &enc.key,
                &enc.digest,
                enc.unpadded_size,
                &config,
            )
            .unwrap();
            assert_eq!(std::fs::read(&dest).unwrap(), plain);
        }
    }
}

#[test]
fn boundary_sizes_roundtrip() {
    for len in [0, 1, BLOCK_SIZE - 1, BLOCK_SIZE, BLOCK_SIZE + 1] {
        let plain: Vec<u8> = (0..len as u8).collect();
        let enc = encrypt_buffer(&plain).unwrap();
        let padded = (len / BLOCK_SIZE + 1) * BLOCK_SIZE;
        assert_eq!(enc.ciphertext.len(), IV_SIZE + padded + MAC_SIZE);

        let dec = decrypt_buffer(&enc.ciphertext, &enc.key, &enc.digest, len as u64).unwrap();
        assert_eq!(dec, plain);
    }
}

#[test]
fn empty_plaintext_scenario() {
    let mut stream = EncryptingStream::new(&b""[..]).unwrap();
    let encrypted = pull_all(&mut stream, 128);
    assert_eq!(encrypted.len(), IV_SIZE + BLOCK_SIZE + MAC_SIZE);

    let key = stream.key().unwrap().clone();
    let digest = stream.digest().unwrap();
    let (result, out) = push_all(&encrypted, &key, &digest, 0, 128);
    assert_eq!(result.unwrap(), 0);
    assert!(out.is_empty());

    let mut altered = *digest.as_bytes();
    altered[5] ^= 0x20;
    let (result, _) = push_all(&encrypted, &key, &Digest::from_bytes(altered), 0, 128);
    assert!(matches!(result, Err(CryptoError::DigestMismatch)));
}

#[test]
fn every_ciphertext_byte_is_authenticated() {
    let plain = b"attachment payload, 33 bytes long".to_vec();
    let enc = encrypt_buffer(&plain).unwrap();

    for i in 0..enc.ciphertext.len() {
        let mut tampered = enc.ciphertext.clone();
        tampered[i] ^= 0x01;
        let (result, out) = push_all(&tampered, &enc.key, &enc.digest, enc.unpadded_size, 16);
        assert!(
            matches!(result, Err(CryptoError::DigestMismatch)),
            "flip at byte {i} not detected"
        );
        assert_ne!(out, plain);
    }
}

#[test]
fn every_digest_byte_is_checked() {
    let enc = encrypt_buffer(b"digest check").unwrap();
    for i in 0..MAC_SIZE {
        let mut altered = *enc.digest.as_bytes();
        altered[i] ^= 0x01;
        let result = decrypt_buffer(
            &enc.ciphertext,
            &enc.key,
            &Digest::from_bytes(altered),
            enc.unpadded_size,
        );
        assert!(matches!(result, Err(CryptoError::DigestMismatch)), "byte {i}");
    }
}

#[test]
fn every_key_byte_matters() {
    // Block-aligned plaintext: a wrong cipher key can only pass if the final
    // block decrypts to sixteen 0x10 bytes.
    let plain = vec![0x5Au8; 64];
    let enc = encrypt_buffer(&plain).unwrap();
    let blob = enc.key.to_bytes();

    for i in 0..KEY_SIZE {
        let mut bytes = *blob;
        bytes[i] ^= 0x01;
        let key = KeyMaterial::from_bytes(&bytes).unwrap();
        let result = decrypt_buffer(&enc.ciphertext, &key, &enc.digest, enc.unpadded_size);

        if i >= KEY_SIZE - MAC_SIZE {
            assert!(
                matches!(result, Err(CryptoError::DigestMismatch)),
                "mac key byte {i}"
            );
        } else {
            // The MAC key is intact, so authentication passes and the
            // garbage final block is rejected by padding or size checks.
            assert!(
                matches!(
                    result,
                    Err(CryptoError::InvalidPadding | CryptoError::SizeMismatch { .. })
                ),
                "cipher key byte {i}"
            );
        }
    }
}

proptest! {
    #[test]
    fn chunk_size_independence(
        plain in proptest::collection::vec(any::<u8>(), 0..=512),
        seed in any::<u64>(),
        chunk_a in 1usize..=64,
        chunk_b in 65usize..=4096,
    ) {
        let mut a =
            EncryptingStream::with_rng(&plain[..], &mut StdRng::seed_from_u64(seed)).unwrap();
        let mut b =
            EncryptingStream::with_rng(&plain[..], &mut StdRng::seed_from_u64(seed)).unwrap();
        let out_a = pull_all(&mut a, chunk_a);
        let out_b = pull_all(&mut b, chunk_b);

        prop_assert_eq!(&out_a, &out_b);
        prop_assert_eq!(a.key().unwrap(), b.key().unwrap());
        prop_assert_eq!(a.digest().unwrap(), b.digest().unwrap());

        let whole = encrypt_buffer_with_rng(&plain, &mut StdRng::seed_from_u64(seed)).unwrap();
        prop_assert_eq!(out_a, whole.ciphertext);
    }

    #[test]
    fn streaming_matches_whole_buffer_decrypt(
        plain in proptest::collection::vec(any::<u8>(), 0..=512),
        chunks in proptest::collection::vec(1usize..=100, 1..=16),
    ) {
        let enc = encrypt_buffer(&plain).unwrap();
        let whole =
            decrypt_buffer(&enc.ciphertext, &enc.key, &enc.digest, enc.unpadded_size).unwrap();

        let mut stream =
            DecryptingStream::new(Vec::new(), &enc.key, enc.digest, enc.unpadded_size).unwrap();
        let mut rest = &enc.ciphertext[..];
        let mut sizes = chunks.iter().cycle();
        while !rest.is_empty() {
            let n = (*sizes.next().unwrap()).min(rest.len());
            stream.consume(&rest[..n]).unwrap();
            rest = &rest[n..];
        }
        stream.close().unwrap();

        prop_assert_eq!(stream.into_inner(), whole.clone());
        prop_assert_eq!(whole, plain);
    }
}
