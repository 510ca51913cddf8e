//! File-backed helpers around the stream engines
//!
//! A failed decryption removes the partially written output file, since
//! anything it holds is unverified.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use sealdrop_core::StreamConfig;
use tracing::{debug, warn};

use crate::decrypt::DecryptingStream;
use crate::digest::Digest;
use crate::encrypt::{EncryptedAttachmentInfo, EncryptingStream};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::KeyMaterial;

/// Open `path` as the plaintext source of a new encrypting stream.
pub fn encrypt_file(path: &Path) -> CryptoResult<EncryptingStream<BufReader<File>>> {
    encrypt_file_with_rng(path, &mut OsRng)
}

pub fn encrypt_file_with_rng<G: RngCore + CryptoRng>(
    path: &Path,
    rng: &mut G,
) -> CryptoResult<EncryptingStream<BufReader<File>>> {
    let file = File::open(path).map_err(CryptoError::SourceIo)?;
    debug!(path = %path.display(), "opened plaintext source");
    EncryptingStream::with_rng(BufReader::new(file), rng)
}

/// Encrypt the file at `src` into a new file at `dest`.
///
/// `dest` is removed if encryption fails part-way.
pub fn encrypt_file_to(
    src: &Path,
    dest: &Path,
    config: &StreamConfig,
) -> CryptoResult<EncryptedAttachmentInfo> {
    let mut stream = encrypt_file(src)?.with_config(config)?;
    let file = File::create(dest).map_err(CryptoError::SinkIo)?;
    let mut out = BufWriter::new(file);

    let result = pump_ciphertext(&mut stream, &mut out, config.write_chunk_size);
    drop(out);
    match result {
        Ok(()) => {
            let info = stream.into_attachment()?;
            debug!(
                src = %src.display(),
                dest = %dest.display(),
                unpadded_size = info.unpadded_size,
                "encrypted file"
            );
            Ok(info)
        }
        Err(e) => {
            remove_partial(dest);
            Err(e)
        }
    }
}

fn pump_ciphertext<R: Read, W: Write>(
    stream: &mut EncryptingStream<R>,
    out: &mut W,
    chunk_size: usize,
) -> CryptoResult<()> {
    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = stream.read_into(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).map_err(CryptoError::SinkIo)?;
    }
    out.flush().map_err(CryptoError::SinkIo)
}

/// Stream `ciphertext` into a new plaintext file at `dest`, pushing it into
/// the decrypting engine in `config.write_chunk_size` pieces.
///
/// Returns the plaintext length. On any error the partial file is removed
/// before the error is returned. A zero `write_chunk_size` is rejected before
/// `dest` is created.
pub fn decrypt_to_file<R: Read>(
    ciphertext: R,
    dest: &Path,
    key: &KeyMaterial,
    digest: &Digest,
    unpadded_size: u64,
    config: &StreamConfig,
) -> CryptoResult<u64> {
    config.validate()?;
    let file = File::create(dest).map_err(CryptoError::SinkIo)?;
    let mut stream = DecryptingStream::new(BufWriter::new(file), key, *digest, unpadded_size)?;

    let result = pump_plaintext(ciphertext, &mut stream, config.write_chunk_size);
    drop(stream);
    match result {
        Ok(total) => {
            debug!(dest = %dest.display(), plaintext_len = total, "decrypted file");
            Ok(total)
        }
        Err(e) => {
            remove_partial(dest);
            Err(e)
        }
    }
}

fn pump_plaintext<R: Read, W: Write>(
    mut ciphertext: R,
    stream: &mut DecryptingStream<W>,
    chunk_size: usize,
) -> CryptoResult<u64> {
    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = match ciphertext.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CryptoError::SourceIo(e)),
        };
        stream.consume(&buf[..n])?;
    }
    stream.close()
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "failed to remove partial output: {e}"),
    }
}
