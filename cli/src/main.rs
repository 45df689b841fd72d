//! Semantic Authentication CLI
//!
//! # Commands
//!
//! - `register <username> <password>`: Register a user
//! - `login <username> <password>`: Compare a password guess against the stored one
//! - `report`: Show recent login attempts
//! - `health`: Probe the moderation service and cache tiers
//!
//! Configuration is read from the environment, with an optional `.env` file.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use semauth_auth::{AuthConfig, AuthError, Authenticator, ShutdownMode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod exit;

use exit::{CliExitCode, exit_code_for, user_message};

/// Similarity-gated password authentication.
#[derive(Parser)]
#[command(name = "semauth")]
#[command(version)]
#[command(about = "Authenticate users by the semantic similarity of their passwords")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new user
    Register { username: String, password: String },
    /// Attempt a login
    Login {
        username: String,
        password: String,
        /// Minimum similarity to pass; 0 selects the configured default
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Show recent login attempts, newest first
    Report {
        /// Only attempts for this user
        #[arg(long)]
        user: Option<String>,
        /// Threshold to judge attempts against
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Probe backing services
    Health,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file loaded: {e}");
    }

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => match e.downcast_ref::<AuthError>() {
            Some(auth) => {
                eprintln!("error: {}", user_message(auth));
                exit_code_for(auth.kind())
            }
            None => {
                eprintln!("error: {e:#}");
                CliExitCode::Internal
            }
        },
    };

    std::process::exit(code.into());
}

async fn run(cli: Cli) -> anyhow::Result<CliExitCode> {
    let config = AuthConfig::from_env()?;
    let auth = Arc::new(Authenticator::open(&config).await?);

    // Log degraded services at startup without delaying the command.
    if !matches!(cli.command, Commands::Health) {
        let startup = Arc::clone(&auth);
        tokio::spawn(async move {
            startup.probe_services().await;
        });
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });

    let result = dispatch(&auth, cli.command, cli.json, &cancel).await;

    let mode = if cancel.is_cancelled() {
        ShutdownMode::Abandon
    } else {
        ShutdownMode::Drain
    };
    auth.shutdown(mode).await;

    result
}

async fn dispatch(
    auth: &Authenticator,
    command: Commands,
    json: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<CliExitCode> {
    match command {
        Commands::Register { username, password } => {
            let user = auth
                .register_with_cancel(&username, &password, cancel)
                .await?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({"username": user.username, "created_at": user.created_at})
                );
            } else {
                println!("registered {}", user.username);
            }
            Ok(CliExitCode::Success)
        }
        Commands::Login {
            username,
            password,
            threshold,
        } => {
            let outcome = auth
                .login_with_cancel(&username, &password, threshold, cancel)
                .await?;
            if json {
                println!("{}", serde_json::to_string(&outcome)?);
            } else if outcome.passed {
                println!(
                    "login ok (similarity {:.4} >= {})",
                    outcome.similarity, outcome.threshold
                );
            } else {
                println!(
                    "incorrect credentials (similarity {:.4} < {})",
                    outcome.similarity, outcome.threshold
                );
            }
            Ok(if outcome.passed {
                CliExitCode::Success
            } else {
                CliExitCode::IncorrectCredentials
            })
        }
        Commands::Report { user, threshold } => {
            let attempts = auth.report(user.as_deref(), threshold).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&attempts)?);
            } else {
                for attempt in &attempts {
                    let similarity = attempt
                        .similarity
                        .map_or_else(|| "-".to_string(), |s| format!("{s:.4}"));
                    println!(
                        "{}  {:<16} {:>8}  {}  {}",
                        attempt.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        attempt.username,
                        similarity,
                        if attempt.passed { "pass" } else { "fail" },
                        attempt.input
                    );
                }
            }
            Ok(CliExitCode::Success)
        }
        Commands::Health => {
            let statuses = auth.probe_services().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                for status in &statuses {
                    println!(
                        "{:<12} {}{}",
                        status.name,
                        if status.healthy { "healthy" } else { "unhealthy" },
                        status
                            .detail
                            .as_deref()
                            .map(|d| format!(" ({d})"))
                            .unwrap_or_default()
                    );
                }
            }
            Ok(if statuses.iter().all(|s| s.healthy) {
                CliExitCode::Success
            } else {
                CliExitCode::Unavailable
            })
        }
    }
}
