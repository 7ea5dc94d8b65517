//! # Site Tracker CLI (`site-tracker`)
//!
//! ## Usage
//!
//! ```bash
//! site-tracker --config ./config/site-tracker.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `site-tracker init` | Create the warehouse table |
//! | `site-tracker sites` | List configured sites and the window |
//! | `site-tracker check` | Fetch and print free dates (no persistence, no email) |
//! | `site-tracker run` | One full run: fetch, diff, persist, notify |
//! | `site-tracker history` | List stored snapshots |
//! | `site-tracker serve` | HTTP trigger endpoint |
//! | `site-tracker completions <shell>` | Print shell completions |
//!
//! The exit code is non-zero iff the command failed.

use clap::{CommandFactory, Parser, Subcommand};
use site_tracker::{config, history, migrate, pipeline, server, sites};
use std::path::PathBuf;

/// Site Tracker: watch a booking API and email when dates open up.
#[derive(Parser)]
#[command(
    name = "site-tracker",
    about = "Watch a booking-availability API and email when dates open up",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/site-tracker.toml")]
    config: PathBuf,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the warehouse table. Idempotent.
    Init,

    /// List configured sites and the availability window.
    Sites,

    /// Fetch current availability and print free dates per site.
    ///
    /// Reads neither the warehouse nor sends email.
    Check,

    /// Perform one run: fetch, diff against the last snapshot, persist if
    /// anything changed, and email a summary of new availability.
    ///
    /// On failure an error email is sent and the exit code is non-zero.
    Run {
        /// Skip persistence and log emails instead of sending them.
        #[arg(long)]
        dry_run: bool,
    },

    /// List stored snapshots, newest first.
    History {
        /// Maximum number of snapshots to list.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Start the HTTP trigger server (`POST /run`, `GET /health`).
    Serve,

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .init();

    // Commands that don't need config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(
            shell,
            &mut Cli::command(),
            "site-tracker",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    // `run` loads its own config so config failures are emailed
    if let Commands::Run { dry_run } = cli.command {
        let cfg = pipeline::load_run_config(&cli.config, dry_run).await?;
        pipeline::run_cmd(&cfg, dry_run).await?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Warehouse initialized successfully.");
        }
        Commands::Sites => {
            sites::list_sites(&cfg);
        }
        Commands::Check => {
            sites::run_check(&cfg).await?;
        }
        Commands::History { limit } => {
            history::run_history(&cfg, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Run { .. } | Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
