//! gitsafe-crypto: the encryption engine behind the git-safe filters
//!
//! Content is framed as an authenticated envelope:
//! ```text
//! [8 bytes: magic "\0GITSAFE"][1 byte: version][12 bytes: nonce][N bytes: AES-256-CTR ciphertext][32 bytes: HMAC-SHA256]
//! ```
//!
//! Discipline: encrypt-then-MAC with independent keys. The HMAC covers
//! magic, version, nonce, and ciphertext; decryption verifies it in
//! constant time before the ciphertext is touched.
//!
//! The `filter` module exposes the two entry points git calls: `clean`
//! (plaintext in, envelope out, already-encrypted content untouched) and
//! `smudge` (envelope in, plaintext out, foreign content untouched). Both
//! are pure functions of their input bytes and the key material, so
//! per-file filter invocations need no coordination.

pub mod cipher;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod keys;

pub use cipher::{authenticate, decrypt, encrypt};
pub use envelope::{is_envelope, Envelope, ENVELOPE_OVERHEAD, FORMAT_VERSION, MAGIC};
pub use error::{CryptoError, CryptoResult};
pub use filter::{clean, smudge};
pub use keys::KeyMaterial;

/// Size of the AES-256-CTR cipher key in bytes (256-bit)
pub const CIPHER_KEY_SIZE: usize = 32;

/// Size of the HMAC-SHA256 key in bytes (one SHA-256 block, 512-bit)
pub const MAC_KEY_SIZE: usize = 64;

/// Size of the per-envelope random nonce
pub const NONCE_SIZE: usize = 12;

/// Size of the HMAC-SHA256 authentication tag
pub const MAC_SIZE: usize = 32;
