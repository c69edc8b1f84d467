//! Mnemonic passphrases and chat-key derivation
//!
//! Every participant of a chat types the same mnemonic and must end up with
//! the same symmetric key, so derivation is fully deterministic:
//!
//! 1. **Validation**: the phrase is parsed against the selected BIP39
//!    wordlist and its embedded checksum is verified.
//! 2. **Seed stretching**: PBKDF2-HMAC-SHA512, 2048 rounds,
//!    salt = `"mnemonic" + passphrase`, 64-byte output (standard BIP39).
//!    The chat key always uses the empty passphrase, so the salt is just
//!    `"mnemonic"`.
//! 3. **Key**: the first 32 bytes of the seed.
//!
//! Reference: <https://github.com/bitcoin/bips/blob/master/bip-0039.mediawiki>

use super::errors::{CryptoError, CryptoResult};
use bip39::{Language, Mnemonic};
use hmac::Hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size of the derived chat key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of a BIP39 seed in bytes
pub const SEED_SIZE: usize = 64;

/// PBKDF2 rounds fixed by BIP39
const PBKDF2_ROUNDS: u32 = 2048;

/// Salt prefix fixed by BIP39
const SALT_PREFIX: &[u8] = b"mnemonic";

/// Default number of words for freshly generated chat mnemonics
pub const DEFAULT_WORD_COUNT: usize = 12;

/// Wordlist a mnemonic is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MnemonicLanguage {
    /// BIP39 English wordlist
    #[default]
    English,
    /// BIP39 simplified-Chinese wordlist
    ChineseSimplified,
}

impl MnemonicLanguage {
    fn wordlist(self) -> Language {
        match self {
            MnemonicLanguage::English => Language::English,
            MnemonicLanguage::ChineseSimplified => Language::SimplifiedChinese,
        }
    }

    /// Configuration name of the language
    pub fn as_str(&self) -> &'static str {
        match self {
            MnemonicLanguage::English => "english",
            MnemonicLanguage::ChineseSimplified => "chinese_simplified",
        }
    }

    /// Parse a configuration name
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "english" | "en" => Some(MnemonicLanguage::English),
            "chinese_simplified" | "chinese-simplified" | "zh" => {
                Some(MnemonicLanguage::ChineseSimplified)
            }
            _ => None,
        }
    }
}

impl fmt::Display for MnemonicLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 256-bit symmetric chat key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Wrap raw key material
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// 64-byte BIP39 seed. Zeroized on drop; deliberately not `Clone`/`Debug`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_SIZE]);

impl Seed {
    /// Raw seed bytes
    pub fn as_bytes(&self) -> &[u8; SEED_SIZE] {
        &self.0
    }
}

/// Entropy length in bytes for a supported word count
fn entropy_len(word_count: usize) -> CryptoResult<usize> {
    match word_count {
        12 => Ok(16),
        15 => Ok(20),
        18 => Ok(24),
        21 => Ok(28),
        24 => Ok(32),
        other => Err(CryptoError::InvalidMnemonic(format!(
            "unsupported word count {} (expected 12, 15, 18, 21 or 24)",
            other
        ))),
    }
}

/// Generate a fresh, checksum-valid mnemonic from OS-seeded randomness
///
/// Used when bootstrapping a new chat; the phrase is then shared out of band
/// with every participant.
pub fn generate_mnemonic(
    language: MnemonicLanguage,
    word_count: usize,
) -> CryptoResult<Zeroizing<String>> {
    let mut entropy = Zeroizing::new(vec![0u8; entropy_len(word_count)?]);
    rand::rng().fill_bytes(entropy.as_mut_slice());
    entropy_to_mnemonic(language, &entropy)
}

/// Deterministic core of [`generate_mnemonic`], exposed for test vectors
pub fn entropy_to_mnemonic(
    language: MnemonicLanguage,
    entropy: &[u8],
) -> CryptoResult<Zeroizing<String>> {
    let mnemonic = Mnemonic::from_entropy_in(language.wordlist(), entropy)
        .map_err(|e| CryptoError::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Validate a phrase and return its normalized form (single-spaced, NFKD)
pub fn normalize_mnemonic(
    phrase: &str,
    language: MnemonicLanguage,
) -> CryptoResult<Zeroizing<String>> {
    let mnemonic = Mnemonic::parse_in(language.wordlist(), phrase)
        .map_err(|e| CryptoError::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Check word membership and the embedded checksum
pub fn verify_mnemonic(phrase: &str, language: MnemonicLanguage) -> bool {
    normalize_mnemonic(phrase, language).is_ok()
}

/// Stretch a mnemonic into a 64-byte seed (BIP39 PBKDF2-HMAC-SHA512)
pub fn mnemonic_to_seed(
    phrase: &str,
    passphrase: &str,
    language: MnemonicLanguage,
) -> CryptoResult<Seed> {
    let normalized = normalize_mnemonic(phrase, language)?;

    let mut salt = Zeroizing::new(Vec::with_capacity(SALT_PREFIX.len() + passphrase.len()));
    salt.extend_from_slice(SALT_PREFIX);
    salt.extend_from_slice(passphrase.as_bytes());

    let mut output = [0u8; SEED_SIZE];
    pbkdf2::pbkdf2::<Hmac<Sha512>>(normalized.as_bytes(), &salt, PBKDF2_ROUNDS, &mut output)
        .map_err(|e| CryptoError::KeyDerivation(format!("PBKDF2-HMAC-SHA512 failed: {}", e)))?;

    let seed = Seed(output);
    output.zeroize();
    Ok(seed)
}

/// Derive the shared chat key from a mnemonic
///
/// The seed is stretched with an empty BIP39 passphrase (salt `"mnemonic"`);
/// the mnemonic alone is the shared secret. Fails with
/// [`CryptoError::InvalidMnemonic`] when the checksum does not validate.
/// The same phrase always yields the same key.
pub fn derive_key(phrase: &str, language: MnemonicLanguage) -> CryptoResult<SymmetricKey> {
    let seed = mnemonic_to_seed(phrase, "", language)?;
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&seed.as_bytes()[..KEY_SIZE]);
    let derived = SymmetricKey(key);
    key.zeroize();
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON_12: &str = "abandon abandon abandon abandon abandon abandon \
                              abandon abandon abandon abandon abandon about";
    const LEGAL_12: &str = "legal winner thank year wave sausage worth useful \
                            legal winner thank yellow";
    const ABANDON_24: &str = "abandon abandon abandon abandon abandon abandon \
                              abandon abandon abandon abandon abandon abandon \
                              abandon abandon abandon abandon abandon abandon \
                              abandon abandon abandon abandon abandon art";

    #[test]
    fn test_derivation_is_deterministic() {
        let k1 = derive_key(ABANDON_12, MnemonicLanguage::English).unwrap();
        let k2 = derive_key(ABANDON_12, MnemonicLanguage::English).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_different_mnemonics_give_different_keys() {
        let k1 = derive_key(ABANDON_12, MnemonicLanguage::English).unwrap();
        let k2 = derive_key(LEGAL_12, MnemonicLanguage::English).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let padded = format!("  {}  ", ABANDON_12.replace(' ', "   "));
        let k1 = derive_key(ABANDON_12, MnemonicLanguage::English).unwrap();
        let k2 = derive_key(&padded, MnemonicLanguage::English).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let phrase = vec!["abandon"; 12].join(" ");
        let err = derive_key(&phrase, MnemonicLanguage::English).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidMnemonic(_)));
        assert!(!verify_mnemonic(&phrase, MnemonicLanguage::English));
    }

    #[test]
    fn test_unknown_word_rejected() {
        let phrase = ABANDON_12.replace("about", "notaword");
        assert!(!verify_mnemonic(&phrase, MnemonicLanguage::English));
    }

    #[test]
    fn test_wrong_language_rejected() {
        assert!(!verify_mnemonic(ABANDON_12, MnemonicLanguage::ChineseSimplified));
    }

    #[test]
    fn test_generated_mnemonic_validates() {
        for words in [12, 15, 18, 21, 24] {
            let phrase = generate_mnemonic(MnemonicLanguage::English, words).unwrap();
            assert_eq!(phrase.split_whitespace().count(), words);
            assert!(verify_mnemonic(&phrase, MnemonicLanguage::English));
        }
    }

    #[test]
    fn test_generated_chinese_mnemonic_validates() {
        let phrase = generate_mnemonic(MnemonicLanguage::ChineseSimplified, 12).unwrap();
        assert!(verify_mnemonic(&phrase, MnemonicLanguage::ChineseSimplified));
        assert!(derive_key(&phrase, MnemonicLanguage::ChineseSimplified).is_ok());
    }

    #[test]
    fn test_unsupported_word_count() {
        assert!(generate_mnemonic(MnemonicLanguage::English, 13).is_err());
    }

    #[test]
    fn test_entropy_vector_all_zeros() {
        let phrase = entropy_to_mnemonic(MnemonicLanguage::English, &[0u8; 16]).unwrap();
        assert_eq!(phrase.as_str(), normalize_mnemonic(ABANDON_12, MnemonicLanguage::English).unwrap().as_str());
    }

    /// TREZOR BIP39 vector: 128-bit zero entropy, passphrase "TREZOR".
    #[test]
    fn test_seed_vector_12_words() {
        let seed = mnemonic_to_seed(ABANDON_12, "TREZOR", MnemonicLanguage::English).unwrap();
        assert_eq!(
            hex::encode(seed.as_bytes()),
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e5349553\
             1f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
        );
    }

    /// TREZOR BIP39 vector: 256-bit zero entropy, passphrase "TREZOR".
    #[test]
    fn test_seed_vector_24_words() {
        let seed = mnemonic_to_seed(ABANDON_24, "TREZOR", MnemonicLanguage::English).unwrap();
        assert_eq!(
            hex::encode(seed.as_bytes()),
            "bda85446c68413707090a52022edd26a1c9462295029f2e60cd7c4f2bbd30971\
             70af7a4d73245cafa9c3cca8d561a7c3de6f5d4a10be8ed2a5e608d68f92fcc8"
        );
    }

    #[test]
    fn test_key_is_seed_prefix() {
        let seed = mnemonic_to_seed(ABANDON_12, "", MnemonicLanguage::English).unwrap();
        let key = derive_key(ABANDON_12, MnemonicLanguage::English).unwrap();
        assert_eq!(key.as_bytes(), &seed.as_bytes()[..KEY_SIZE]);

        let with_passphrase = mnemonic_to_seed(ABANDON_12, "TREZOR", MnemonicLanguage::English).unwrap();
        assert_ne!(key.as_bytes(), &with_passphrase.as_bytes()[..KEY_SIZE]);
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = SymmetricKey::from_bytes([7u8; KEY_SIZE]);
        assert_eq!(format!("{:?}", key), "SymmetricKey(<redacted>)");
    }

    #[test]
    fn test_language_names() {
        assert_eq!(MnemonicLanguage::from_str("english"), Some(MnemonicLanguage::English));
        assert_eq!(
            MnemonicLanguage::from_str("chinese_simplified"),
            Some(MnemonicLanguage::ChineseSimplified)
        );
        assert_eq!(MnemonicLanguage::from_str("klingon"), None);
        assert_eq!(MnemonicLanguage::ChineseSimplified.to_string(), "chinese_simplified");
    }
}
