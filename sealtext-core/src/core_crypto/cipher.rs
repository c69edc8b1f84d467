//! Authenticated encryption of single message records
//!
//! A sealed record is an opaque text token safe to commit to the shared
//! store verbatim:
//!
//! ```text
//! base64url( VERSION:1 | ISSUED_AT:8 (BE unix seconds) | NONCE:24 | CIPHERTEXT+TAG )
//! ```
//!
//! The cipher is XChaCha20-Poly1305. The version byte and issue time are
//! bound to the ciphertext as associated data, so altering any byte of the
//! token makes [`MessageCipher::open`] fail. The 192-bit nonce is drawn at
//! random per record.
//!
//! Every failure on the open path collapses into
//! [`CryptoError::DecryptionFailed`]; callers cannot tell a wrong key from
//! a tampered or foreign token.

use super::errors::{CryptoError, CryptoResult};
use super::mnemonic::{derive_key, MnemonicLanguage, SymmetricKey};
use crate::core_message::types::PlaintextMessage;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use std::fmt;

/// Token format version
const TOKEN_VERSION: u8 = 0x01;

/// XChaCha20-Poly1305 nonce size (192 bits)
const NONCE_SIZE: usize = 24;

/// Poly1305 tag size
const TAG_SIZE: usize = 16;

/// Version byte + issue time
const HEADER_SIZE: usize = 1 + 8;

/// Session-lifetime cipher bound to one chat key
pub struct MessageCipher {
    cipher: XChaCha20Poly1305,
}

impl MessageCipher {
    /// Create a cipher from an already derived key
    pub fn new(key: &SymmetricKey) -> Self {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Derive the chat key from a mnemonic and create the cipher
    pub fn from_mnemonic(phrase: &str, language: MnemonicLanguage) -> CryptoResult<Self> {
        let key = derive_key(phrase, language)?;
        Ok(Self::new(&key))
    }

    /// Serialize and seal a record into an opaque token
    pub fn seal(&self, record: &PlaintextMessage) -> CryptoResult<String> {
        let plaintext = serde_json::to_vec(record)
            .map_err(|e| CryptoError::Serialization(format!("Failed to encode record: {}", e)))?;
        let issued_at = chrono::Utc::now().timestamp().max(0) as u64;
        self.seal_bytes(&plaintext, issued_at)
    }

    /// Authenticate, decrypt and decode a token
    ///
    /// The decoded record must carry exactly the fixed field set; anything
    /// else is reported as [`CryptoError::DecryptionFailed`].
    pub fn open(&self, token: &str) -> CryptoResult<PlaintextMessage> {
        let plaintext = self.open_bytes(token)?;
        serde_json::from_slice(&plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Seal raw bytes with an explicit issue time
    pub fn seal_bytes(&self, plaintext: &[u8], issued_at: u64) -> CryptoResult<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);

        let header = token_header(issued_at);
        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce_bytes), Payload { msg: plaintext, aad: &header })
            .map_err(|e| CryptoError::Encryption(format!("Encryption failed: {}", e)))?;

        let mut raw = Vec::with_capacity(HEADER_SIZE + NONCE_SIZE + ciphertext.len());
        raw.extend_from_slice(&header);
        raw.extend_from_slice(&nonce_bytes);
        raw.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Authenticate and decrypt a token into raw bytes
    pub fn open_bytes(&self, token: &str) -> CryptoResult<Vec<u8>> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| CryptoError::DecryptionFailed)?;

        if raw.len() < HEADER_SIZE + NONCE_SIZE + TAG_SIZE || raw[0] != TOKEN_VERSION {
            return Err(CryptoError::DecryptionFailed);
        }

        let (header, rest) = raw.split_at(HEADER_SIZE);
        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

        self.cipher
            .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad: header })
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

impl fmt::Debug for MessageCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MessageCipher(<redacted>)")
    }
}

fn token_header(issued_at: u64) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0] = TOKEN_VERSION;
    header[1..].copy_from_slice(&issued_at.to_be_bytes());
    header
}
