//! zkpaste: end-to-end encrypted pastes from the terminal
//!
//! Commands:
//!   create [FILE]         - encrypt FILE (or stdin) and print the share link
//!   view <URL|FRAGMENT>   - fetch, decrypt and print a paste
//!   config show           - display the effective configuration
//!   gen-password          - print a random paste password
//!   languages             - list the accepted --language tags

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use zkpaste_client::viewer::ViewerState;
use zkpaste_client::{
    CreateRequest, HttpBackend, PasteCreator, PasteViewer, ShareFragment, MSG_CREATE_FAILED,
};
use zkpaste_core::config::PasteConfig;
use zkpaste_core::{Language, PasteError};

/// Password attempts before `view` gives up.
const MAX_PASSWORD_ATTEMPTS: usize = 3;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "zkpaste",
    version,
    about = "Zero-knowledge encrypted pastebin client",
    long_about = "zkpaste: create and read pastes that the server can only store as ciphertext"
)]
struct Cli {
    /// Path to zkpaste.toml configuration file
    #[arg(long, short = 'c', env = "ZKPASTE_CONFIG", default_value = "zkpaste.toml")]
    config: PathBuf,

    /// Backend base URL (overrides server.base_url)
    #[arg(long, env = "ZKPASTE_SERVER")]
    server: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ZKPASTE_LOG", default_value = "warn")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "ZKPASTE_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt and upload a paste, then print its share link
    Create {
        /// File to upload (reads stdin when omitted)
        file: Option<PathBuf>,
        /// Syntax highlighting language (stored inside the ciphertext)
        #[arg(long, short = 'l', default_value = "plaintext")]
        language: Language,
        /// Lifetime in seconds; 0 never expires (default: limits.default_ttl_secs)
        #[arg(long)]
        ttl: Option<u64>,
        /// Delete the paste after its first successful read
        #[arg(long)]
        burn: bool,
        /// Protect with a password (prompted) instead of a key in the link
        #[arg(long, conflicts_with = "generate_password")]
        password: bool,
        /// Protect with a freshly generated password, printed to stderr
        #[arg(long)]
        generate_password: bool,
    },

    /// Fetch, decrypt, and print a paste
    View {
        /// Share URL or `#view/<id>[&key=<key>]` fragment
        link: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print a random password suitable for `create --password`
    GenPassword,

    /// List the syntax highlighting languages accepted by `create --language`
    Languages,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log, &cli.log_format);

    let mut config = load_config(&cli.config)?;
    if let Some(server) = &cli.server {
        config.server.base_url = server.clone();
    }
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.server.base_url,
        "zkpaste starting"
    );

    match cli.command {
        Commands::Create {
            file,
            language,
            ttl,
            burn,
            password,
            generate_password,
        } => {
            let password = if generate_password {
                let generated = zkpaste_crypto::generate_password();
                eprintln!("password: {generated}");
                Some(SecretString::from(generated))
            } else if password {
                Some(prompt_new_password()?)
            } else {
                None
            };
            let ttl = Duration::from_secs(ttl.unwrap_or(config.limits.default_ttl_secs));
            cmd_create(&config, file.as_deref(), language, ttl, burn, password).await
        }
        Commands::View { link } => cmd_view(&config, &link).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
        Commands::GenPassword => {
            println!("{}", zkpaste_crypto::generate_password());
            Ok(())
        }
        Commands::Languages => {
            for (tag, label) in Language::options() {
                println!("{tag:<12} {label}");
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<PasteConfig> {
    PasteConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries paste output only
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Wrap a library error in the single user-facing message plus its hint.
fn user_error(message: &str, err: PasteError) -> anyhow::Error {
    match err.user_hint() {
        Some(hint) => anyhow::Error::new(err).context(format!("{message} ({hint})")),
        None => anyhow::Error::new(err).context(message.to_owned()),
    }
}

// ── `zkpaste create` ──────────────────────────────────────────────────────────

async fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        None => {
            use tokio::io::AsyncReadExt;
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("reading stdin")?;
            Ok(text)
        }
    }
}

fn prompt_new_password() -> Result<SecretString> {
    let first = SecretString::from(
        rpassword::prompt_password("Paste password: ").context("reading password")?,
    );
    let confirm = SecretString::from(
        rpassword::prompt_password("Confirm password: ").context("reading password")?,
    );
    if first.expose_secret() != confirm.expose_secret() {
        anyhow::bail!("passwords do not match");
    }
    if first.expose_secret().trim().is_empty() {
        anyhow::bail!("password must not be blank");
    }
    Ok(first)
}

async fn cmd_create(
    config: &PasteConfig,
    file: Option<&Path>,
    language: Language,
    ttl: Duration,
    burn: bool,
    password: Option<SecretString>,
) -> Result<()> {
    let text = read_input(file).await?;

    let backend = HttpBackend::new(&config.server).map_err(|e| user_error(MSG_CREATE_FAILED, e))?;
    let creator = PasteCreator::new(backend, config);

    let request = CreateRequest {
        text,
        language,
        ttl,
        burn_after_read: burn,
        password,
    };

    let pb = make_spinner("create");
    pb.set_message("solving proof-of-work and encrypting...");
    let result = creator.create(request).await;
    pb.finish_and_clear();

    let created = result.map_err(|e| user_error(MSG_CREATE_FAILED, e))?;
    info!(id = %created.id, "paste created");

    println!("{}", created.share_url);
    match created.expires_at {
        Some(_) => eprintln!("expires: in {}s", ttl.as_secs()),
        None => eprintln!("expires: never"),
    }
    if burn {
        eprintln!("burn after read: the first successful view deletes it");
    }
    Ok(())
}

// ── `zkpaste view` ────────────────────────────────────────────────────────────

async fn cmd_view(config: &PasteConfig, link: &str) -> Result<()> {
    let fragment = ShareFragment::parse(link).context("parsing paste link")?;
    let backend = HttpBackend::new(&config.server).context("building HTTP backend")?;
    let mut viewer = PasteViewer::new(backend, fragment, config);

    let mut attempts = 0usize;
    let mut state = viewer.load().await?.clone();

    loop {
        match state {
            ViewerState::Success(paste) => {
                debug!(
                    id = %paste.id,
                    language = %paste.language,
                    views = paste.views,
                    "paste decrypted"
                );
                eprintln!("language: {}", paste.language.label());
                if paste.burn_after_read {
                    eprintln!("this paste was burned after reading");
                }
                print!("{}", paste.text);
                if !paste.text.ends_with('\n') {
                    println!();
                }
                viewer.settle().await;
                return Ok(());
            }
            ViewerState::PasswordRequired { error } => {
                if let Some(error) = error {
                    eprintln!("{error}");
                }
                if attempts >= MAX_PASSWORD_ATTEMPTS {
                    anyhow::bail!("giving up after {MAX_PASSWORD_ATTEMPTS} password attempts");
                }
                attempts += 1;

                let password = SecretString::from(
                    rpassword::prompt_password("Password: ").context("reading password")?,
                );
                state = viewer.submit_password(&password).await?.clone();
            }
            ViewerState::Error { message, hint } => match hint {
                Some(hint) => anyhow::bail!("{message} ({hint})"),
                None => anyhow::bail!("{message}"),
            },
            ViewerState::Loading | ViewerState::Decrypting => {
                anyhow::bail!("viewer stopped before reaching a result")
            }
        }
    }
}

// ── `zkpaste config show` ─────────────────────────────────────────────────────

fn cmd_config_show(config: &PasteConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_create_args() {
        let cli = Cli::try_parse_from([
            "zkpaste",
            "create",
            "notes.md",
            "--language",
            "rust",
            "--ttl",
            "0",
            "--burn",
        ])
        .unwrap();
        match cli.command {
            Commands::Create {
                file,
                language,
                ttl,
                burn,
                password,
                generate_password,
            } => {
                assert_eq!(file, Some(PathBuf::from("notes.md")));
                assert_eq!(language, Language::Rust);
                assert_eq!(ttl, Some(0));
                assert!(burn);
                assert!(!password);
                assert!(!generate_password);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_language_rejected() {
        assert!(Cli::try_parse_from(["zkpaste", "create", "--language", "cobol"]).is_err());
    }

    #[test]
    fn test_password_flags_conflict() {
        assert!(Cli::try_parse_from([
            "zkpaste",
            "create",
            "--password",
            "--generate-password"
        ])
        .is_err());
    }

    #[test]
    fn test_languages_command() {
        let cli = Cli::try_parse_from(["zkpaste", "languages"]).unwrap();
        assert!(matches!(cli.command, Commands::Languages));
    }

    #[test]
    fn test_user_error_carries_hint() {
        let err = user_error(
            MSG_CREATE_FAILED,
            PasteError::PayloadTooLarge { size: 2, limit: 1 },
        );
        assert_eq!(err.to_string(), "Failed to create paste (Paste is too large)");
    }
}
