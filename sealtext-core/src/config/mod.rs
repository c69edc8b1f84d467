//! Configuration management for SealText
//!
//! Settings live in a TOML file and can be overridden through environment
//! variables prefixed with `SEALTEXT_`. Secrets (the chat mnemonic and git
//! credentials) are never part of the file; they come from the environment
//! or a separate mnemonic file and are only held in memory.

use crate::core_crypto::{MnemonicLanguage, DEFAULT_WORD_COUNT};
use crate::core_store::Credentials;
use crate::core_sync::SyncConfig;
use secrecy::SecretString;
use serde::de::value::StrDeserializer;
use serde::de::IntoDeserializer;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Prefix of every environment variable read by [`Config::apply_env`]
pub const ENV_PREFIX: &str = "SEALTEXT_";

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "~/.sealtext/config.toml";

const ENV_MNEMONIC: &str = "SEALTEXT_MNEMONIC";
const ENV_GIT_USERNAME: &str = "SEALTEXT_GIT_USERNAME";
const ENV_GIT_TOKEN: &str = "SEALTEXT_GIT_TOKEN";

const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Who this participant is
    pub identity: IdentityConfig,

    /// Local working copy and remote
    pub store: StoreConfig,

    /// Retry, timeout and polling policy
    pub sync: SyncConfig,

    /// Mnemonic wordlist settings
    pub mnemonic: MnemonicConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Identity configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Display name shown as message author and used for commits
    pub display_name: String,
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Local working copy; `~` is expanded
    pub repo_path: PathBuf,

    /// Shared chat repository
    pub remote_url: Option<String>,

    /// Branch all participants publish to
    pub branch: String,
}

/// Mnemonic configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MnemonicConfig {
    /// Wordlist the chat mnemonic is drawn from
    pub language: MnemonicLanguage,

    /// Words in newly generated mnemonics
    pub word_count: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { display_name: "anonymous".to_string() }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("~/.sealtext/repo"),
            remote_url: None,
            branch: "main".to_string(),
        }
    }
}

impl Default for MnemonicConfig {
    fn default() -> Self {
        Self { language: MnemonicLanguage::English, word_count: DEFAULT_WORD_COUNT }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    value
        .parse()
        .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", key, e)))
}

fn parse_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let deserializer: StrDeserializer<'_, serde::de::value::Error> = value.into_deserializer();
    humantime_serde::deserialize(deserializer)
        .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", key, e)))
}

/// Expand a leading `~` and environment references in a path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
    }
}

impl Config {
    /// Defaults overlaid with environment variables
    ///
    /// Environment variables follow the pattern: SEALTEXT_<SECTION>_<KEY>
    /// Example: SEALTEXT_STORE_REMOTE_URL=https://github.com/org/chat.git
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(expand_path(path.as_ref()))
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// File (if present) overlaid with environment variables
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let expanded = expand_path(path.as_ref());
        let mut config = if expanded.exists() { Self::from_file(&expanded)? } else { Self::default() };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| env::var(key).ok())
    }

    /// Overlay values from an arbitrary `SEALTEXT_*` lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(&format!("{}{}", ENV_PREFIX, key));

        // Identity config
        if let Some(name) = var("IDENTITY_DISPLAY_NAME") {
            self.identity.display_name = name;
        }

        // Store config
        if let Some(path) = var("STORE_REPO_PATH") {
            self.store.repo_path = PathBuf::from(path);
        }
        if let Some(url) = var("STORE_REMOTE_URL") {
            self.store.remote_url = Some(url);
        }
        if let Some(branch) = var("STORE_BRANCH") {
            self.store.branch = branch;
        }

        // Sync config
        if let Some(attempts) = var("SYNC_MAX_ATTEMPTS") {
            self.sync.max_attempts = attempts.parse().map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid SYNC_MAX_ATTEMPTS: {}", e))
            })?;
        }
        if let Some(timeout) = var("SYNC_NETWORK_TIMEOUT") {
            self.sync.network_timeout = parse_duration("SYNC_NETWORK_TIMEOUT", &timeout)?;
        }
        if let Some(interval) = var("SYNC_POLL_INTERVAL") {
            self.sync.poll_interval = parse_duration("SYNC_POLL_INTERVAL", &interval)?;
        }

        // Mnemonic config
        if let Some(language) = var("MNEMONIC_LANGUAGE") {
            self.mnemonic.language = MnemonicLanguage::from_str(&language).ok_or_else(|| {
                ConfigError::InvalidValue(format!("Unknown mnemonic language: {}", language))
            })?;
        }

        // Logging config
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = var("LOG_JSON") {
            self.logging.json_format = parse_flag("LOG_JSON", &json)?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.display_name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "identity.display_name must not be empty".to_string(),
            ));
        }

        if self.store.branch.trim().is_empty() || self.store.branch.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid branch name: {:?}",
                self.store.branch
            )));
        }

        if let Some(url) = &self.store.remote_url {
            if url.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "store.remote_url must not be empty when set".to_string(),
                ));
            }
        }

        if self.sync.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "sync.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.sync.network_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "sync.network_timeout must be greater than 0".to_string(),
            ));
        }

        if self.sync.poll_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "sync.poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.sync.initial_backoff > self.sync.max_backoff {
            return Err(ConfigError::ValidationFailed(
                "sync.initial_backoff must not exceed sync.max_backoff".to_string(),
            ));
        }

        if !VALID_WORD_COUNTS.contains(&self.mnemonic.word_count) {
            return Err(ConfigError::ValidationFailed(format!(
                "mnemonic.word_count must be one of {:?}",
                VALID_WORD_COUNTS
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file, creating parent directories
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = expand_path(path.as_ref());
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;
        }
        std::fs::write(&path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }

    /// Working-copy path with `~` expanded
    pub fn repo_path(&self) -> PathBuf {
        expand_path(&self.store.repo_path)
    }

    /// Remote URL, required for anything that syncs
    pub fn remote_url(&self) -> Result<&str, ConfigError> {
        self.store
            .remote_url
            .as_deref()
            .ok_or_else(|| ConfigError::ValidationFailed("store.remote_url is not set".to_string()))
    }
}

/// Git credentials from `SEALTEXT_GIT_USERNAME` / `SEALTEXT_GIT_TOKEN`
///
/// `None` when no token is set; the username defaults to the token-only
/// convention of `x-access-token`.
pub fn load_credentials() -> Option<Credentials> {
    credentials_from(|key| env::var(key).ok())
}

fn credentials_from<F>(lookup: F) -> Option<Credentials>
where
    F: Fn(&str) -> Option<String>,
{
    let token = lookup(ENV_GIT_TOKEN).filter(|t| !t.is_empty())?;
    let username = lookup(ENV_GIT_USERNAME)
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "x-access-token".to_string());
    Some(Credentials::new(username, token))
}

/// The chat mnemonic from a file (if given) or `SEALTEXT_MNEMONIC`
pub fn load_mnemonic(file: Option<&Path>) -> Result<SecretString, ConfigError> {
    mnemonic_from(file, |key| env::var(key).ok())
}

fn mnemonic_from<F>(file: Option<&Path>, lookup: F) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let phrase = match file {
        Some(path) => std::fs::read_to_string(expand_path(path))
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?,
        None => lookup(ENV_MNEMONIC).ok_or_else(|| {
            ConfigError::MissingSecret(format!("set {} or pass a mnemonic file", ENV_MNEMONIC))
        })?,
    };

    let trimmed = phrase.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingSecret("mnemonic is empty".to_string()));
    }
    Ok(SecretString::new(trimmed.to_string()))
}
