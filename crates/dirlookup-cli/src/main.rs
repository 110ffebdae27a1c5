//! dirlookup - directory user lookup
//!
//! Authenticates a user against an Active Directory server and prints the
//! account profile with every group it belongs to, directly or nested.

mod output;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use dirlookup_auth::UserLookupService;
use dirlookup_core::{Error, LookupConfig};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dirlookup")]
#[command(author = "Dirlookup Team")]
#[command(version = dirlookup_core::VERSION)]
#[command(about = "Look up directory users and their nested groups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Directory server host name
    #[arg(long, global = true, env = "DIRLOOKUP_HOST")]
    host: Option<String>,

    /// Directory server port (389/636 domain controller, 3268/3269 global catalog)
    #[arg(short, long, global = true, env = "DIRLOOKUP_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DIRLOOKUP_LOG_LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate a user and print its profile and groups
    Lookup {
        /// Domain name, e.g. corp.example.com
        #[arg(short, long)]
        domain: String,

        /// Account name (sAMAccountName)
        #[arg(short, long)]
        username: String,

        /// Account password
        #[arg(long, env = "DIRLOOKUP_PASSWORD", hide_env_values = true)]
        password: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            if is_transient(&err) {
                eprintln!(
                    "{}",
                    "The directory may be temporarily unreachable, retrying may succeed.".yellow()
                );
            }
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (domain, username, password, format) = match cli.command {
        Commands::Version => {
            println!("dirlookup {}", dirlookup_core::VERSION);
            return Ok(());
        }
        Commands::Lookup {
            domain,
            username,
            password,
            output,
        } => (domain, username, password, output),
    };

    // Load or create config
    let mut config = match &cli.config {
        Some(path) => LookupConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => LookupConfig::from_env(),
    };

    // Override with CLI args
    if let Some(host) = cli.host {
        config.directory.host = host;
    }
    if let Some(port) = cli.port {
        config.directory.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_logging(&config);
    debug!("Using directory server {}:{}", config.directory.host, config.directory.port);

    let service = UserLookupService::with_config(&config.directory)?;
    let profile = service.get_user(&domain, &username, &password).await?;

    match format {
        OutputFormat::Text => print!("{}", output::render_text(&profile)),
        OutputFormat::Json => println!("{}", output::render_json(&profile)?),
    }

    Ok(())
}

fn init_logging(config: &LookupConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // stdout carries the profile, logs go to stderr
    if config.logging.is_json() {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

/// Exit status for temporary failures (sysexits `EX_TEMPFAIL`)
const EXIT_TEMPFAIL: u8 = 75;

fn is_transient(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Error>().is_some_and(Error::is_transient)
}

/// Process exit status for a failed run, keyed on the lookup error kind
fn exit_code(err: &anyhow::Error) -> u8 {
    if is_transient(err) {
        return EXIT_TEMPFAIL;
    }
    match err.downcast_ref::<Error>() {
        Some(Error::InvalidArgument(_)) | Some(Error::Config(_)) => 2,
        Some(Error::ConnectionFailure { .. }) => 3,
        Some(Error::AuthenticationFailure { .. }) => 4,
        Some(Error::NotFound { .. }) => 5,
        Some(Error::SearchFailure { .. }) | Some(Error::ResolutionLimit { .. }) => 6,
        None => 1,
    }
}
