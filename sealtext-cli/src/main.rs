mod display;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use display::{format_message, SeenMessages};
use sealtext_core::config::{
    expand_path, load_credentials, load_mnemonic, Config, DEFAULT_CONFIG_PATH,
};
use sealtext_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use sealtext_core::{generate_mnemonic, verify_mnemonic, ChatSession, GitStore, MnemonicLanguage};
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "sealtext")]
#[command(author, version, about = "Encrypted group chat over a shared git repository", long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Read the chat mnemonic from this file instead of SEALTEXT_MNEMONIC
    #[arg(long)]
    mnemonic_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a fresh mnemonic for a new chat
    GenerateMnemonic {
        /// Number of words (12, 15, 18, 21 or 24)
        #[arg(short, long)]
        words: Option<usize>,

        /// Wordlist (english, chinese_simplified)
        #[arg(long)]
        language: Option<String>,
    },

    /// Check the words and checksum of a mnemonic
    VerifyMnemonic {
        /// Phrase to check; defaults to the configured mnemonic
        phrase: Vec<String>,
    },

    /// Write a configuration file
    InitConfig {
        /// Name shown as the author of your messages
        #[arg(long)]
        display_name: String,

        /// Shared chat repository
        #[arg(long)]
        remote_url: String,

        /// Local working copy
        #[arg(long)]
        repo_path: Option<PathBuf>,

        /// Mnemonic wordlist (english, chinese_simplified)
        #[arg(long)]
        language: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Send a message
    Send {
        #[arg(required = true)]
        message: Vec<String>,
    },

    /// Print every message
    Read {
        /// Show the working copy without fetching
        #[arg(long)]
        offline: bool,
    },

    /// Print new messages as they arrive, until Ctrl-C
    Watch,
}

fn parse_language(value: &str) -> Result<MnemonicLanguage> {
    MnemonicLanguage::from_str(value).ok_or_else(|| anyhow!("Unknown mnemonic language '{}'", value))
}

fn log_config(args: &Args, config: &Config) -> Result<LogConfig> {
    let mut log_config = LogConfig::from_settings(&config.logging)?;
    if let Some(level) = &args.log_level {
        log_config.level =
            LogLevel::from_str(level).ok_or_else(|| anyhow!("Invalid log level '{}'", level))?;
    }
    if args.json_logs {
        log_config = log_config.json_format(true);
    }
    Ok(log_config)
}

/// Settings for this run; `init-config` never reads the file it replaces
fn load_config(command: &Command, path: &Path) -> Result<Config> {
    match command {
        Command::InitConfig { .. } => Ok(Config::default()),
        _ => Config::load(path).with_context(|| format!("loading {}", path.display())),
    }
}

fn write_config(
    path: &Path,
    display_name: String,
    remote_url: String,
    repo_path: Option<PathBuf>,
    language: Option<MnemonicLanguage>,
    force: bool,
) -> Result<Config> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }

    let mut config = Config::default();
    config.identity.display_name = display_name;
    config.store.remote_url = Some(remote_url);
    if let Some(repo_path) = repo_path {
        config.store.repo_path = repo_path;
    }
    if let Some(language) = language {
        config.mnemonic.language = language;
    }

    config.validate()?;
    config.save_to_file(path)?;
    Ok(config)
}

async fn open_session(args: &Args, config: &Config) -> Result<ChatSession<GitStore>> {
    let mnemonic = load_mnemonic(args.mnemonic_file.as_deref())?;
    let session = ChatSession::from_config(config, &mnemonic, load_credentials())
        .await
        .context("opening chat repository")?;
    Ok(session)
}

async fn watch(mut session: ChatSession<GitStore>, config: &Config) -> Result<()> {
    let mut seen = SeenMessages::default();
    let mut ticker = tokio::time::interval(config.sync.poll_interval);
    info!(interval = ?config.sync.poll_interval, "Watching for new messages");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match session.fetch_messages().await {
                    Ok(messages) => {
                        for message in seen.fresh(&messages) {
                            println!("{}", format_message(message));
                        }
                    }
                    Err(e) => warn!(error = %e, "Refresh failed, retrying next interval"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("installing Ctrl-C handler")?;
                info!("Received Ctrl+C");
                break;
            }
        }
    }

    session.close().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = expand_path(&args.config);
    let config = load_config(&args.command, &config_path)?;

    init_logging_with_config(log_config(&args, &config)?)?;
    sealtext_core::metrics::init_metrics();

    match &args.command {
        Command::GenerateMnemonic { words, language } => {
            let language = match language {
                Some(value) => parse_language(value)?,
                None => config.mnemonic.language,
            };
            let phrase = generate_mnemonic(language, words.unwrap_or(config.mnemonic.word_count))?;
            println!("{}", phrase.as_str());
        }
        Command::VerifyMnemonic { phrase } => {
            let language = config.mnemonic.language;
            let valid = if phrase.is_empty() {
                let mnemonic = load_mnemonic(args.mnemonic_file.as_deref())?;
                verify_mnemonic(mnemonic.expose_secret(), language)
            } else {
                verify_mnemonic(&phrase.join(" "), language)
            };
            if !valid {
                bail!("Mnemonic is not valid for the {} wordlist", language);
            }
            println!("Mnemonic is valid ({})", language);
        }
        Command::InitConfig { display_name, remote_url, repo_path, language, force } => {
            let language = language.as_deref().map(parse_language).transpose()?;
            write_config(
                &config_path,
                display_name.clone(),
                remote_url.clone(),
                repo_path.clone(),
                language,
                *force,
            )?;
            println!("Wrote {}", config_path.display());
        }
        Command::Send { message } => {
            let mut session = open_session(&args, &config).await?;
            let sent = session
                .send_message(&message.join(" "), &config.identity.display_name)
                .await?;
            println!("{}", format_message(&sent));
            session.close().await?;
        }
        Command::Read { offline } => {
            let mut session = open_session(&args, &config).await?;
            let messages = if *offline {
                session.local_messages().await?
            } else {
                session.fetch_messages().await?
            };
            for message in &messages {
                println!("{}", format_message(message));
            }
            session.close().await?;
        }
        Command::Watch => {
            let session = open_session(&args, &config).await?;
            watch(session, &config).await?;
        }
    }

    Ok(())
}
