//! Nomos CLI - sealed-stake commitments from the terminal
//!
//! Commit to a rule with a sealed stake, check on deadlines, and deliver the
//! verdict: uphold reveals the stake, forfeit destroys it unseen.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};
use nomos_lifecycle::NomosConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Nomos CLI
#[derive(Parser)]
#[command(name = "nomos")]
#[command(about = "Nomos - commitments backed by a sealed stake", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "NOMOS_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configured level)
    #[arg(long, env = "NOMOS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "NOMOS_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Commit to a rule, sealing a stake
    #[command(group(ArgGroup::new("stake").required(true).args(["text", "image"])))]
    Commit {
        /// The rule being committed to
        #[arg(short, long)]
        rule: String,

        /// A text vow to seal
        #[arg(long)]
        text: Option<String>,

        /// An image file to seal
        #[arg(long)]
        image: Option<PathBuf>,

        /// Time until the verdict is due (defaults to the configured duration)
        #[arg(long)]
        duration_secs: Option<i64>,
    },

    /// Show open commitments, or one commitment by id
    Status {
        /// Commitment id (nomos:<uuid> or a bare uuid)
        id: Option<String>,
    },

    /// Rule kept: reveal the stake, then destroy it
    Uphold {
        id: String,

        /// Write the revealed stake to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Rule broken: destroy the stake unseen
    Forfeit { id: String },

    /// Watch for commitments whose deadline has passed
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = NomosConfig::load(cli.config.as_deref())?;

    // Initialize tracing
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::Commit {
            rule,
            text,
            image,
            duration_secs,
        } => commands::commit(&config, &rule, text, image, duration_secs).await,
        Commands::Status { id } => commands::status(&config, id.as_deref()).await,
        Commands::Uphold { id, out } => commands::uphold(&config, &id, out).await,
        Commands::Forfeit { id } => commands::forfeit(&config, &id).await,
        Commands::Watch => commands::watch(&config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn commit_requires_exactly_one_stake() {
        assert!(Cli::try_parse_from(["nomos", "commit", "--rule", "run"]).is_err());
        assert!(Cli::try_parse_from([
            "nomos", "commit", "--rule", "run", "--text", "a", "--image", "b.png"
        ])
        .is_err());

        let cli =
            Cli::try_parse_from(["nomos", "commit", "--rule", "run", "--text", "vow"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Commit { text: Some(_), image: None, duration_secs: None, .. }
        ));
    }

    #[test]
    fn uphold_takes_optional_output() {
        let cli = Cli::try_parse_from(["nomos", "uphold", "nomos:abc", "--out", "stake.png"])
            .unwrap();
        match cli.command {
            Commands::Uphold { id, out } => {
                assert_eq!(id, "nomos:abc");
                assert_eq!(out, Some(PathBuf::from("stake.png")));
            }
            _ => panic!("expected uphold"),
        }
    }
}
