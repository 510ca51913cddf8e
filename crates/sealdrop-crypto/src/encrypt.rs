//! Pull-based encrypting stream
//!
//! Output layout:
//! ```text
//! [16 bytes: IV][16·n bytes: AES-256-CBC ciphertext, PKCS#7 padded][32 bytes: HMAC-SHA256(IV || ciphertext)]
//! ```
//!
//! Plaintext is pulled from the source only when the reader asks for more
//! ciphertext than is buffered, so the produced byte sequence does not depend
//! on the read sizes the caller picks.

use std::collections::VecDeque;
use std::io::{self, Read};

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use sealdrop_core::StreamConfig;
use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::digest::{Digest, MacAccumulator};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{InitializationVector, KeyMaterial};
use crate::primitives::{pkcs7_pad, CbcEncryptor};
use crate::{BLOCK_SIZE, MAC_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptState {
    /// Constructed, nothing read yet.
    Idle,
    Streaming,
    /// Source exhausted and MAC appended; buffered output not yet drained.
    Finalizing,
    /// Every byte has been handed out. Key and digest are available.
    Done,
    /// The source returned an error.
    Failed,
    /// Closed before `Done`.
    Abandoned,
}

/// What the decrypting side needs, available once the stream is drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedAttachmentInfo {
    pub key: KeyMaterial,
    pub digest: Digest,
    pub unpadded_size: u64,
}

pub struct EncryptingStream<R> {
    source: R,
    key: KeyMaterial,
    cipher: CbcEncryptor,
    mac: MacAccumulator,
    digest: Option<Digest>,
    /// Plaintext not yet forming a full block.
    pending: Zeroizing<Vec<u8>>,
    /// Ciphertext produced but not yet read.
    output: VecDeque<u8>,
    scratch: Zeroizing<Vec<u8>>,
    plaintext_len: u64,
    state: EncryptState,
}

impl<R: Read> EncryptingStream<R> {
    /// Encrypt `source` under a fresh key and IV drawn from the OS generator.
    pub fn new(source: R) -> CryptoResult<Self> {
        Self::with_rng(source, &mut OsRng)
    }

    /// Encrypt `source` under a fresh key and IV drawn from `rng`.
    pub fn with_rng<G: RngCore + CryptoRng>(source: R, rng: &mut G) -> CryptoResult<Self> {
        let key = KeyMaterial::generate(rng);
        Self::with_key(source, key, rng)
    }

    /// Encrypt `source` under caller-supplied key material. The IV is still
    /// drawn fresh from `rng`.
    pub fn with_key<G: RngCore + CryptoRng>(
        source: R,
        key: KeyMaterial,
        rng: &mut G,
    ) -> CryptoResult<Self> {
        let iv = InitializationVector::generate(rng);
        let cipher = CbcEncryptor::new(key.cipher_key(), iv.as_bytes());
        let mut mac = MacAccumulator::new(key.mac_key())?;
        mac.update(iv.as_bytes());

        let config = StreamConfig::default();
        let mut output = VecDeque::with_capacity(config.read_buffer_size + BLOCK_SIZE);
        output.extend(iv.as_bytes());

        Ok(Self {
            source,
            key,
            cipher,
            mac,
            digest: None,
            pending: Zeroizing::new(Vec::with_capacity(BLOCK_SIZE)),
            output,
            scratch: Zeroizing::new(vec![0u8; config.read_buffer_size]),
            plaintext_len: 0,
            state: EncryptState::Idle,
        })
    }

    /// Apply buffer sizing from `config`. Zero-sized buffers are rejected.
    pub fn with_config(mut self, config: &StreamConfig) -> CryptoResult<Self> {
        config.validate()?;
        self.scratch = Zeroizing::new(vec![0u8; config.read_buffer_size]);
        Ok(self)
    }

    pub fn state(&self) -> EncryptState {
        self.state
    }

    /// Whether another read can still return ciphertext.
    pub fn has_bytes_available(&self) -> bool {
        matches!(
            self.state,
            EncryptState::Idle | EncryptState::Streaming | EncryptState::Finalizing
        )
    }

    /// Return up to `max_bytes` of ciphertext, possibly fewer when
    /// `max_bytes` exceeds what one refill can produce. `produce(0)` is a
    /// no-op; use [`has_bytes_available`](Self::has_bytes_available) to tell
    /// whether the stream is exhausted.
    pub fn produce(&mut self, max_bytes: usize) -> CryptoResult<Vec<u8>> {
        let bound = self.output.len() + self.scratch.len() + BLOCK_SIZE + MAC_SIZE;
        let mut buf = vec![0u8; max_bytes.min(bound)];
        let n = self.read_into(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Fill `buf` with as much ciphertext as is available, pulling plaintext
    /// from the source until `buf` is full or the stream ends.
    pub fn read_into(&mut self, buf: &mut [u8]) -> CryptoResult<usize> {
        match self.state {
            EncryptState::Done => return Ok(0),
            EncryptState::Failed | EncryptState::Abandoned => return Err(CryptoError::Closed),
            EncryptState::Idle | EncryptState::Streaming | EncryptState::Finalizing => {}
        }

        let mut filled = 0;
        loop {
            let n = (buf.len() - filled).min(self.output.len());
            for (dst, src) in buf[filled..filled + n].iter_mut().zip(self.output.drain(..n)) {
                *dst = src;
            }
            filled += n;

            if filled == buf.len() || self.source_exhausted() {
                break;
            }
            if let Err(e) = self.refill() {
                self.state = EncryptState::Failed;
                warn!(error = %e, "attachment encryption failed");
                return Err(e);
            }
        }

        if self.state == EncryptState::Finalizing && self.output.is_empty() {
            self.state = EncryptState::Done;
        }
        Ok(filled)
    }

    /// Key material of this session. Only available once the stream is
    /// exhausted.
    pub fn key(&self) -> CryptoResult<&KeyMaterial> {
        self.ensure_done()?;
        Ok(&self.key)
    }

    pub fn digest(&self) -> CryptoResult<Digest> {
        self.ensure_done()?;
        self.digest.ok_or(CryptoError::NotReady)
    }

    /// Plaintext length before padding.
    pub fn unpadded_size(&self) -> CryptoResult<u64> {
        self.ensure_done()?;
        Ok(self.plaintext_len)
    }

    /// Consume a drained stream, handing out key, digest and size.
    pub fn into_attachment(self) -> CryptoResult<EncryptedAttachmentInfo> {
        let digest = self.digest()?;
        Ok(EncryptedAttachmentInfo {
            key: self.key,
            digest,
            unpadded_size: self.plaintext_len,
        })
    }

    /// End the session. An unfinished session becomes `Abandoned` and will
    /// never release its key or digest.
    pub fn close(&mut self) {
        if matches!(
            self.state,
            EncryptState::Idle | EncryptState::Streaming | EncryptState::Finalizing
        ) {
            debug!(
                plaintext_read = self.plaintext_len,
                "attachment encryption abandoned"
            );
            self.state = EncryptState::Abandoned;
            self.output.clear();
            self.pending.zeroize();
        }
    }

    fn ensure_done(&self) -> CryptoResult<()> {
        match self.state {
            EncryptState::Done => Ok(()),
            EncryptState::Failed | EncryptState::Abandoned => Err(CryptoError::Abandoned),
            EncryptState::Idle | EncryptState::Streaming | EncryptState::Finalizing => {
                Err(CryptoError::NotReady)
            }
        }
    }

    fn source_exhausted(&self) -> bool {
        matches!(self.state, EncryptState::Finalizing | EncryptState::Done)
    }

    fn refill(&mut self) -> CryptoResult<()> {
        let n = loop {
            match self.source.read(&mut self.scratch) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CryptoError::SourceIo(e)),
            }
        };
        if n == 0 {
            self.finalize();
            return Ok(());
        }

        self.state = EncryptState::Streaming;
        self.plaintext_len += n as u64;
        self.pending.extend_from_slice(&self.scratch[..n]);
        self.scratch[..n].zeroize();

        let aligned = self.pending.len() - self.pending.len() % BLOCK_SIZE;
        for chunk in self.pending[..aligned].chunks_exact(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            self.cipher.encrypt_block(&mut block);
            self.mac.update(&block);
            self.output.extend(block);
        }
        self.pending[..aligned].zeroize();
        self.pending.drain(..aligned);
        Ok(())
    }

    fn finalize(&mut self) {
        let mut block = pkcs7_pad(&self.pending);
        self.pending.zeroize();
        self.cipher.encrypt_block(&mut block);
        self.mac.update(&block);
        self.output.extend(block);

        let digest = self.mac.finalize();
        self.output.extend(digest.as_bytes());
        self.digest = Some(digest);
        self.state = EncryptState::Finalizing;

        debug!(
            plaintext_len = self.plaintext_len,
            authenticated_len = self.mac.authenticated_len(),
            "attachment encryption finalized"
        );
    }
}

impl<R: Read> Read for EncryptingStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(io::Error::from)
    }
}
