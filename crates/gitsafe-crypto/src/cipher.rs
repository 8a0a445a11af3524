//! AES-256-CTR + HMAC-SHA256 encrypt-then-MAC engine
//!
//! Encryption draws a fresh random 12-byte nonce, applies the AES-256-CTR
//! keystream (counter block = nonce || 32-bit big-endian block counter),
//! then MACs `magic || version || nonce || ciphertext` with HMAC-SHA256.
//! Decryption recomputes the MAC over the bytes exactly as received and
//! compares in constant time; the ciphertext is only transformed after the
//! tag verifies.
//!
//! Ciphertext is the same length as the plaintext. The 32-bit block counter
//! caps a single envelope at 64 GiB, far beyond anything git tracks.

use aes::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::envelope::{Envelope, FORMAT_VERSION, MAGIC};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::KeyMaterial;
use crate::{MAC_SIZE, NONCE_SIZE};

type Aes256Ctr = ctr::Ctr32BE<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Encrypt plaintext into a v1 envelope.
///
/// Every call draws a fresh nonce, so encrypting the same content twice
/// yields different envelopes. Empty plaintext is valid and produces an
/// envelope of exactly `ENVELOPE_OVERHEAD` bytes.
pub fn encrypt(plaintext: &[u8], keys: &KeyMaterial) -> CryptoResult<Vec<u8>> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let mut ciphertext = plaintext.to_vec();
    apply_keystream(keys, &nonce, &mut ciphertext);

    let mac = compute_mac(keys, FORMAT_VERSION, &nonce, &ciphertext);

    Ok(Envelope {
        version: FORMAT_VERSION,
        nonce: &nonce,
        ciphertext: &ciphertext,
        mac: &mac,
    }
    .encode())
}

/// Verify and decrypt an envelope.
///
/// Decode errors (`MalformedEnvelope`, `UnsupportedVersion`) propagate
/// as-is. A MAC mismatch is `AuthenticationFailed` and nothing of the
/// ciphertext is returned; there is no partial or best-effort output.
pub fn decrypt(data: &[u8], keys: &KeyMaterial) -> CryptoResult<Vec<u8>> {
    let env = Envelope::decode(data)?;
    verify_mac(keys, &env)?;

    let mut plaintext = env.ciphertext.to_vec();
    apply_keystream(keys, env.nonce, &mut plaintext);
    Ok(plaintext)
}

/// Check an envelope's MAC without decrypting.
///
/// This is the clean filter's idempotence probe: it answers "was this
/// produced under these keys?" at keystream-free cost.
pub fn authenticate(data: &[u8], keys: &KeyMaterial) -> CryptoResult<()> {
    let env = Envelope::decode(data)?;
    verify_mac(keys, &env)
}

/// XOR `buf` with the AES-256-CTR keystream for `nonce`.
///
/// CTR is its own inverse, so this serves both directions.
fn apply_keystream(keys: &KeyMaterial, nonce: &[u8], buf: &mut [u8]) {
    let mut iv = [0u8; 16];
    iv[..NONCE_SIZE].copy_from_slice(nonce);

    let mut cipher = Aes256Ctr::new(keys.cipher_key().into(), (&iv).into());
    cipher.apply_keystream(buf);
}

/// HMAC-SHA256 over `magic || version || nonce || ciphertext`.
///
/// The header is covered so that envelope metadata cannot be altered
/// without detection.
fn compute_mac(keys: &KeyMaterial, version: u8, nonce: &[u8], ciphertext: &[u8]) -> [u8; MAC_SIZE] {
    let mut mac = HmacSha256::new(keys.mac_key().into());
    mac.update(MAGIC);
    mac.update(&[version]);
    mac.update(nonce);
    mac.update(ciphertext);
    mac.finalize().into_bytes().into()
}

fn verify_mac(keys: &KeyMaterial, env: &Envelope<'_>) -> CryptoResult<()> {
    let mut mac = HmacSha256::new(keys.mac_key().into());
    mac.update(MAGIC);
    mac.update(&[env.version]);
    mac.update(env.nonce);
    mac.update(env.ciphertext);
    mac.verify_slice(env.mac)
        .map_err(|_| CryptoError::AuthenticationFailed)
}
