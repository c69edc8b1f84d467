//! Error types for the crypto module

use thiserror::Error;

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by key derivation and message sealing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The passphrase is not a checksum-valid mnemonic for the selected wordlist
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Authentication or decoding of a token failed.
    ///
    /// Carries no detail: a wrong key, a corrupted token and a foreign
    /// format all look the same to the caller.
    #[error("Decryption failed (wrong key or corrupted data)")]
    DecryptionFailed,

    /// Sealing a record failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Seed stretching failed
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// The record could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decryption_failed_has_fixed_message() {
        let err = CryptoError::DecryptionFailed;
        assert_eq!(err.to_string(), "Decryption failed (wrong key or corrupted data)");
    }

    #[test]
    fn test_invalid_mnemonic_display() {
        let err = CryptoError::InvalidMnemonic("invalid checksum".to_string());
        assert!(err.to_string().contains("invalid checksum"));
    }
}
