//! `quill`: maintenance server and CLI for the blog database.
//!
//! Reads `quill.toml` (or the path given with `--config`) and `QUILL_*`
//! environment variables, then either serves the admin API with the daily
//! backup timer (`quill serve`) or runs a single maintenance job.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `admin_password_hash`:
//!
//! ```text
//! quill hash-password
//! ```

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quill", author, version, about = "Blog statistics and database maintenance")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "quill.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the admin API and run the daily backup timer.
  Serve,
  /// Take a backup now.
  Backup,
  /// List backups, newest first.
  Backups,
  /// Delete backups older than the retention window.
  Cleanup,
  /// Replace the live database with a backup from the backup directory.
  Restore {
    /// Backup file name, e.g. `dev-20240101040000.db`.
    file: String,
  },
  /// Back up, then create and apply a migration from `draft.sql`.
  Migrate {
    /// Letters, digits, `_` or `-`; generated when omitted.
    name: Option<String>,
  },
  /// Apply pending migrations without creating new ones.
  Deploy,
  /// Show recorded migration attempts.
  History,
  /// Recalculate word counts and/or daily rollups.
  Recalc {
    /// `words`, `daily` or `all`.
    #[arg(long = "type", default_value = "all")]
    kind:  String,
    /// Days before the last day to include; defaults to `stats_lookback_days`.
    #[arg(long)]
    days:  Option<u32>,
    /// Last day of the rollup window (`YYYY-MM-DD`); defaults to today.
    #[arg(long)]
    until: Option<String>,
  },
  /// Audit yesterday's rollup and the post word counts.
  Verify,
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if let Command::HashPassword = cli.command {
    return commands::hash_password();
  }

  let cfg = config::load(&cli.config)?;

  match cli.command {
    Command::Serve => commands::serve(cfg).await,
    Command::Backup => commands::backup(&cfg).await,
    Command::Backups => commands::list_backups(&cfg).await,
    Command::Cleanup => commands::cleanup(&cfg).await,
    Command::Restore { file } => commands::restore(&cfg, &file).await,
    Command::Migrate { name } => commands::migrate(&cfg, name.as_deref()).await,
    Command::Deploy => commands::deploy(&cfg).await,
    Command::History => commands::history(&cfg).await,
    Command::Recalc { kind, days, until } => {
      commands::recalc(&cfg, &kind, days, until.as_deref()).await
    }
    Command::Verify => commands::verify(&cfg).await,
    Command::HashPassword => Ok(()),
  }
}
