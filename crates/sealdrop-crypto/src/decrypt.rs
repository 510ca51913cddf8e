//! Push-based decrypting stream
//!
//! Ciphertext arrives in arbitrary chunks. Since the MAC trails the
//! ciphertext, the last `MAC_SIZE` bytes seen so far are kept in a window and
//! only bytes pushed out of it are treated as IV/ciphertext. Whatever is left
//! in the window at `close()` is the embedded MAC.
//!
//! Plaintext is written to the sink as blocks decrypt, except the most recent
//! block, which may carry padding and is released only after the MAC checks
//! out. Bytes written before a failed `close()` are unverified; callers must
//! discard them.

use std::io::{self, Write};

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::digest::{Digest, MacAccumulator};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::KeyMaterial;
use crate::primitives::{ct_eq, pkcs7_unpad, CbcDecryptor};
use crate::{BLOCK_SIZE, MAC_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptState {
    Streaming,
    /// `close()` is verifying and releasing the final block.
    Finalizing,
    Done,
    Failed,
}

pub struct DecryptingStream<W> {
    sink: W,
    cipher: CbcDecryptor,
    mac: MacAccumulator,
    expected: Digest,
    unpadded_size: u64,
    /// Trailing bytes that may still turn out to be the MAC.
    window: Vec<u8>,
    /// Confirmed bytes not yet forming a full block.
    carry: Vec<u8>,
    iv_seen: bool,
    /// Last decrypted block, held back until verification.
    held: Option<Zeroizing<[u8; BLOCK_SIZE]>>,
    confirmed_len: u64,
    written: u64,
    state: DecryptState,
}

impl<W: Write> DecryptingStream<W> {
    /// Decrypt into `sink`. The key is only read here; the session keeps the
    /// expanded cipher and MAC state.
    pub fn new(
        sink: W,
        key: &KeyMaterial,
        expected: Digest,
        unpadded_size: u64,
    ) -> CryptoResult<Self> {
        Ok(Self {
            sink,
            cipher: CbcDecryptor::new(key.cipher_key()),
            mac: MacAccumulator::new(key.mac_key())?,
            expected,
            unpadded_size,
            window: Vec::with_capacity(2 * MAC_SIZE),
            carry: Vec::with_capacity(BLOCK_SIZE),
            iv_seen: false,
            held: None,
            confirmed_len: 0,
            written: 0,
            state: DecryptState::Streaming,
        })
    }

    pub fn state(&self) -> DecryptState {
        self.state
    }

    /// Plaintext bytes written to the sink so far. Unverified until `close()`
    /// succeeds.
    pub fn plaintext_written(&self) -> u64 {
        self.written
    }

    /// Feed a chunk of ciphertext of any length.
    pub fn consume(&mut self, chunk: &[u8]) -> CryptoResult<()> {
        if self.state != DecryptState::Streaming {
            return Err(CryptoError::Closed);
        }

        self.window.extend_from_slice(chunk);
        if self.window.len() <= MAC_SIZE {
            return Ok(());
        }

        let confirmed_len = self.window.len() - MAC_SIZE;
        let confirmed: Vec<u8> = self.window.drain(..confirmed_len).collect();
        if let Err(e) = self.absorb(&confirmed) {
            self.fail(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Verify the MAC and release the final block. Returns the total number
    /// of plaintext bytes written.
    pub fn close(&mut self) -> CryptoResult<u64> {
        if self.state != DecryptState::Streaming {
            return Err(CryptoError::Closed);
        }
        self.state = DecryptState::Finalizing;

        match self.finish() {
            Ok(total) => {
                self.state = DecryptState::Done;
                debug!(
                    plaintext_len = total,
                    ciphertext_len = self.confirmed_len + MAC_SIZE as u64,
                    "attachment decryption verified"
                );
                Ok(total)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Give back the sink. Its contents are only trustworthy if `close()`
    /// returned `Ok`.
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn absorb(&mut self, mut bytes: &[u8]) -> CryptoResult<()> {
        self.mac.update(bytes);
        self.confirmed_len += bytes.len() as u64;

        while !bytes.is_empty() {
            let take = (BLOCK_SIZE - self.carry.len()).min(bytes.len());
            self.carry.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];

            if self.carry.len() == BLOCK_SIZE {
                let mut block = [0u8; BLOCK_SIZE];
                block.copy_from_slice(&self.carry);
                self.carry.clear();
                self.on_block(block)?;
            }
        }
        Ok(())
    }

    fn on_block(&mut self, block: [u8; BLOCK_SIZE]) -> CryptoResult<()> {
        // IV_SIZE == BLOCK_SIZE: the first confirmed block is the IV.
        if !self.iv_seen {
            self.cipher.set_iv(&block);
            self.iv_seen = true;
            return Ok(());
        }

        let mut plain = Zeroizing::new(block);
        self.cipher.decrypt_block(&mut plain);
        if let Some(previous) = self.held.replace(plain) {
            self.sink
                .write_all(&previous[..])
                .map_err(CryptoError::SinkIo)?;
            self.written += BLOCK_SIZE as u64;
        }
        Ok(())
    }

    fn finish(&mut self) -> CryptoResult<u64> {
        if self.window.len() < MAC_SIZE || !self.carry.is_empty() || self.held.is_none() {
            return Err(CryptoError::Truncated {
                len: self.confirmed_len + self.window.len() as u64,
            });
        }

        let computed = self.mac.finalize();
        // Non-short-circuiting: both comparisons always run.
        let embedded_ok = ct_eq(computed.as_bytes(), &self.window);
        let expected_ok = computed == self.expected;
        if !(embedded_ok & expected_ok) {
            return Err(CryptoError::DigestMismatch);
        }

        let last = self.held.take().ok_or(CryptoError::Truncated {
            len: self.confirmed_len,
        })?;
        let keep = pkcs7_unpad(&last).ok_or(CryptoError::InvalidPadding)?;

        let total = self.written + keep as u64;
        if total != self.unpadded_size {
            return Err(CryptoError::SizeMismatch {
                expected: self.unpadded_size,
                actual: total,
            });
        }

        self.sink
            .write_all(&last[..keep])
            .map_err(CryptoError::SinkIo)?;
        self.sink.flush().map_err(CryptoError::SinkIo)?;
        self.written = total;
        Ok(total)
    }

    fn fail(&mut self, error: &CryptoError) {
        self.state = DecryptState::Failed;
        self.held = None;
        self.window.clear();
        self.carry.clear();
        warn!(
            error = %error,
            unverified_written = self.written,
            "attachment decryption failed"
        );
    }
}

impl<W: Write> Write for DecryptingStream<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.consume(buf).map_err(io::Error::from)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
