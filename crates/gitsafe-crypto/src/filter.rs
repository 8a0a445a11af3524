//! The clean/smudge filter pair
//!
//! `clean` runs when content enters the index: plaintext becomes an
//! envelope, and content that already is a valid envelope under the same
//! keys passes through untouched, so re-running the filter never
//! double-encrypts. `smudge` runs on checkout: envelopes are decrypted,
//! and anything without the magic passes through unchanged (files
//! committed before the filter was configured).

use crate::cipher;
use crate::envelope;
use crate::error::CryptoResult;
use crate::keys::KeyMaterial;

/// Clean filter: encrypt working-tree content for storage.
///
/// Idempotent: if `input` decodes and authenticates as an envelope under
/// `keys`, it is returned byte-for-byte unchanged. Content with the magic
/// that does NOT authenticate (tampered, or produced under another key) is
/// treated as plaintext and wrapped like any other bytes; smudging twice
/// unwinds that.
pub fn clean(input: &[u8], keys: &KeyMaterial) -> CryptoResult<Vec<u8>> {
    if cipher::authenticate(input, keys).is_ok() {
        tracing::debug!(len = input.len(), "clean: already encrypted, passing through");
        return Ok(input.to_vec());
    }
    cipher::encrypt(input, keys)
}

/// Smudge filter: decrypt stored content for the working tree.
///
/// Content without the envelope magic passes through unchanged; that is
/// the only passthrough. Content carrying the magic must decrypt, and
/// truncation, unknown versions, and MAC failures are hard errors. A
/// failed decryption never degrades to emitting the stored bytes.
pub fn smudge(input: &[u8], keys: &KeyMaterial) -> CryptoResult<Vec<u8>> {
    if !envelope::is_envelope(input) {
        tracing::debug!(len = input.len(), "smudge: no envelope magic, passing through");
        return Ok(input.to_vec());
    }
    cipher::decrypt(input, keys)
}
