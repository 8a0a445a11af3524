use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Failures from key handling, envelope parsing, and the cipher engine.
///
/// Every variant is terminal. Callers must not retry, and must never fall
/// back to emitting the input as plaintext when one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// A key had the wrong length. Keys are never padded, truncated, or
    /// derived to fit.
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// The buffer is not a well-formed envelope: too short, missing the
    /// magic prefix, or truncated before the MAC.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),

    /// The envelope carries a format version this build does not read.
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    /// The MAC did not verify: wrong key or tampered content.
    #[error("envelope authentication failed: wrong key or corrupted content")]
    AuthenticationFailed,
}
