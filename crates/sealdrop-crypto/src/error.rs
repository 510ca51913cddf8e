use std::io;

use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// The computed MAC disagrees with the trailing MAC or the expected digest.
    #[error("digest mismatch: ciphertext, key, or digest is wrong or was tampered with")]
    DigestMismatch,

    #[error("invalid padding after successful authentication")]
    InvalidPadding,

    #[error("unpadded size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Key or digest requested before the encrypting stream was drained.
    #[error("stream not exhausted: key and digest are not available yet")]
    NotReady,

    #[error("stream was abandoned or failed: key and digest are unavailable")]
    Abandoned,

    #[error("stream is closed")]
    Closed,

    #[error("ciphertext truncated or misaligned: {len} bytes")]
    Truncated { len: u64 },

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid digest length: expected {expected} bytes, got {actual}")]
    InvalidDigestLength { expected: usize, actual: usize },

    #[error("source I/O error: {0}")]
    SourceIo(#[source] io::Error),

    #[error("sink I/O error: {0}")]
    SinkIo(#[source] io::Error),

    #[error(transparent)]
    Config(#[from] sealdrop_core::CoreError),
}

impl CryptoError {
    /// True for failures that mean the ciphertext must not be trusted.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            CryptoError::DigestMismatch
                | CryptoError::InvalidPadding
                | CryptoError::SizeMismatch { .. }
                | CryptoError::Truncated { .. }
        )
    }
}

impl From<CryptoError> for io::Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::SourceIo(inner) | CryptoError::SinkIo(inner) => inner,
            other if other.is_verification_failure() => {
                io::Error::new(io::ErrorKind::InvalidData, other)
            }
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}
