//! Envelope framing for encrypted file content
//!
//! Envelope format v1 (binary, fixed field order, no delimiters):
//! ```text
//! [8 bytes: magic "\0GITSAFE"][1 byte: version][12 bytes: nonce][N bytes: ciphertext][32 bytes: HMAC-SHA256]
//! ```
//!
//! The ciphertext length is implied: total length minus the fixed fields.
//! The magic starts with a NUL byte so text files cannot collide with it;
//! binary files that happen to start with it are rejected loudly at decode
//! rather than misread.
//!
//! Version handling: a buffer with our magic but an unknown version byte is
//! `UnsupportedVersion`, reported before the overall length check so a
//! newer-format file is never misdiagnosed as truncated.

use crate::error::{CryptoError, CryptoResult};
use crate::{MAC_SIZE, NONCE_SIZE};

/// Magic prefix identifying an encrypted envelope.
pub const MAGIC: &[u8; 8] = b"\x00GITSAFE";

/// Current (and only) envelope format version.
pub const FORMAT_VERSION: u8 = 1;

/// Fixed overhead of an envelope over its plaintext:
/// magic (8) + version (1) + nonce (12) + MAC (32) = 53 bytes.
pub const ENVELOPE_OVERHEAD: usize = MAGIC.len() + 1 + NONCE_SIZE + MAC_SIZE;

/// A parsed view of an encoded envelope, borrowing from the input buffer.
///
/// `decode` only establishes structure; MAC verification lives in the
/// cipher engine.
#[derive(Debug)]
pub struct Envelope<'a> {
    pub version: u8,
    pub nonce: &'a [u8],
    pub ciphertext: &'a [u8],
    pub mac: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Parse an encoded envelope without verifying its MAC.
    pub fn decode(data: &'a [u8]) -> CryptoResult<Self> {
        if data.len() < MAGIC.len() + 1 {
            return Err(CryptoError::MalformedEnvelope("too short for header"));
        }
        let (magic, rest) = data.split_at(MAGIC.len());
        if magic != MAGIC {
            return Err(CryptoError::MalformedEnvelope("missing magic prefix"));
        }
        let version = rest[0];
        if version != FORMAT_VERSION {
            return Err(CryptoError::UnsupportedVersion(version));
        }
        if data.len() < ENVELOPE_OVERHEAD {
            return Err(CryptoError::MalformedEnvelope("truncated before MAC"));
        }

        let body = &rest[1..];
        let (nonce, tail) = body.split_at(NONCE_SIZE);
        let (ciphertext, mac) = tail.split_at(tail.len() - MAC_SIZE);

        Ok(Self {
            version,
            nonce,
            ciphertext,
            mac,
        })
    }

    /// Serialize into the binary form. Inverse of `decode`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENVELOPE_OVERHEAD + self.ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.push(self.version);
        out.extend_from_slice(self.nonce);
        out.extend_from_slice(self.ciphertext);
        out.extend_from_slice(self.mac);
        out
    }
}

/// Cheap sniff: does this buffer start with the envelope magic?
///
/// This is the passthrough test the smudge filter uses. It says nothing
/// about validity; `decode` does the real checking.
pub fn is_envelope(data: &[u8]) -> bool {
    data.starts_with(MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_envelope() -> Vec<u8> {
        Envelope {
            version: FORMAT_VERSION,
            nonce: &[7u8; NONCE_SIZE],
            ciphertext: b"opaque bytes",
            mac: &[9u8; MAC_SIZE],
        }
        .encode()
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let encoded = sample_envelope();
        let env = Envelope::decode(&encoded).unwrap();

        assert_eq!(env.version, FORMAT_VERSION);
        assert_eq!(env.nonce, &[7u8; NONCE_SIZE]);
        assert_eq!(env.ciphertext, b"opaque bytes");
        assert_eq!(env.mac, &[9u8; MAC_SIZE]);
    }

    #[test]
    fn test_encoded_length() {
        let encoded = sample_envelope();
        // magic (8) + version (1) + nonce (12) + ciphertext (12) + mac (32) = 65
        assert_eq!(encoded.len(), ENVELOPE_OVERHEAD + b"opaque bytes".len());
    }

    #[test]
    fn test_decode_empty_is_malformed() {
        let err = Envelope::decode(b"").unwrap_err();
        assert!(matches!(err, CryptoError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_decode_wrong_magic_is_malformed() {
        let err = Envelope::decode(b"NOTSAFE!rest of the buffer padding padding padding padding")
            .unwrap_err();
        assert!(matches!(err, CryptoError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_decode_unknown_version() {
        let mut encoded = sample_envelope();
        encoded[MAGIC.len()] = 2;

        let err = Envelope::decode(&encoded).unwrap_err();
        assert_eq!(err, CryptoError::UnsupportedVersion(2));
    }

    #[test]
    fn test_decode_unknown_version_wins_over_truncation() {
        // Magic plus an unknown version byte and nothing else: the version
        // problem is reported, not the truncation.
        let mut data = MAGIC.to_vec();
        data.push(9);

        let err = Envelope::decode(&data).unwrap_err();
        assert_eq!(err, CryptoError::UnsupportedVersion(9));
    }

    #[test]
    fn test_decode_truncated_is_malformed() {
        let mut data = MAGIC.to_vec();
        data.push(FORMAT_VERSION);
        data.extend_from_slice(&[0u8; 10]); // not enough for nonce + MAC

        let err = Envelope::decode(&data).unwrap_err();
        assert_eq!(err, CryptoError::MalformedEnvelope("truncated before MAC"));
    }

    #[test]
    fn test_decode_minimum_size_empty_ciphertext() {
        let encoded = Envelope {
            version: FORMAT_VERSION,
            nonce: &[0u8; NONCE_SIZE],
            ciphertext: b"",
            mac: &[0u8; MAC_SIZE],
        }
        .encode();

        assert_eq!(encoded.len(), ENVELOPE_OVERHEAD);
        let env = Envelope::decode(&encoded).unwrap();
        assert!(env.ciphertext.is_empty());
    }

    #[test]
    fn test_is_envelope_sniff() {
        assert!(is_envelope(&sample_envelope()));
        assert!(is_envelope(MAGIC)); // prefix only, still sniffs positive
        assert!(!is_envelope(b""));
        assert!(!is_envelope(b"plain text file\n"));
        assert!(!is_envelope(b"\x00GITSAF")); // one byte short of the magic
    }
}
