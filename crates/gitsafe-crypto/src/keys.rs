//! Key material: the fixed-size cipher/MAC key pair. Zeroized on drop.

use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::{CIPHER_KEY_SIZE, MAC_KEY_SIZE};

/// The symmetric key pair for one repository: a 256-bit AES-CTR key and a
/// 512-bit HMAC-SHA256 key. Zeroized on drop.
#[derive(Clone)]
pub struct KeyMaterial {
    cipher_key: [u8; CIPHER_KEY_SIZE],
    mac_key: [u8; MAC_KEY_SIZE],
}

impl KeyMaterial {
    /// Build key material from raw bytes, checking exact lengths.
    ///
    /// Anything but a 32-byte cipher key and a 64-byte MAC key is rejected
    /// with `InvalidKeyLength`; nothing is padded, truncated, or stretched
    /// here. Callers that start from a passphrase must run their own KDF
    /// first and hand over the derived bytes.
    pub fn load(cipher_key: &[u8], mac_key: &[u8]) -> CryptoResult<Self> {
        if cipher_key.len() != CIPHER_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: CIPHER_KEY_SIZE,
                got: cipher_key.len(),
            });
        }
        if mac_key.len() != MAC_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: MAC_KEY_SIZE,
                got: mac_key.len(),
            });
        }

        let mut cipher = [0u8; CIPHER_KEY_SIZE];
        cipher.copy_from_slice(cipher_key);
        let mut mac = [0u8; MAC_KEY_SIZE];
        mac.copy_from_slice(mac_key);

        Ok(Self {
            cipher_key: cipher,
            mac_key: mac,
        })
    }

    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        let mut cipher_key = [0u8; CIPHER_KEY_SIZE];
        let mut mac_key = [0u8; MAC_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut cipher_key);
        rand::thread_rng().fill_bytes(&mut mac_key);
        Self {
            cipher_key,
            mac_key,
        }
    }

    pub fn cipher_key(&self) -> &[u8; CIPHER_KEY_SIZE] {
        &self.cipher_key
    }

    pub fn mac_key(&self) -> &[u8; MAC_KEY_SIZE] {
        &self.mac_key
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.cipher_key.zeroize();
        self.mac_key.zeroize();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("cipher_key", &"[REDACTED]")
            .field("mac_key", &"[REDACTED]")
            .finish()
    }
}
