//! Maintenance services for the Quill blog database.
//!
//! Every service is a sequential batch job that receives its dependencies
//! (store, backup engine, migration tool) at construction time:
//!
//! * [`stats::StatsService`]: word counts, daily rollups and the integrity
//!   audit.
//! * [`backup::BackupEngine`]: snapshots, retention, restore.
//! * [`schedule`]: the daily backup timer.
//! * [`migrate::MigrationOrchestrator`]: backup-guarded schema migrations
//!   with a durable history log.

pub mod backup;
pub mod config;
pub mod error;
pub mod history;
pub mod migrate;
pub mod outcome;
pub mod schedule;
pub mod stats;

pub use config::OpsConfig;
pub use error::{Error, Result};
pub use outcome::BestEffort;

/// Timestamp format embedded in backup, migration and history file names.
pub const FILE_TIMESTAMP: &str = "%Y%m%d%H%M%S";
