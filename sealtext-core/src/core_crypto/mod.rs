//! Cryptographic primitives for SealText
//!
//! - [`mnemonic`]: mnemonic validation/generation and chat-key derivation
//! - [`cipher`]: authenticated encryption of message records

pub mod cipher;
pub mod errors;
pub mod mnemonic;

pub use cipher::MessageCipher;
pub use errors::{CryptoError, CryptoResult};
pub use mnemonic::{
    derive_key, generate_mnemonic, mnemonic_to_seed, verify_mnemonic, MnemonicLanguage, Seed,
    SymmetricKey, DEFAULT_WORD_COUNT, KEY_SIZE,
};
