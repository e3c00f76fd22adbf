//! The daily backup timer.

use std::{sync::Arc, time::Duration};

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use tokio::task::JoinHandle;
use tracing::info;

use crate::{BestEffort, Error, OpsConfig, Result, backup::BackupEngine};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Parse a strict 24h `HH:MM` time of day.
pub fn parse_schedule(s: &str) -> Result<NaiveTime> {
  let invalid = || Error::InvalidSchedule(s.to_owned());
  let trimmed = s.trim();
  if trimmed.len() != 5 {
    return Err(invalid());
  }
  NaiveTime::parse_from_str(trimmed, "%H:%M").map_err(|_| invalid())
}

/// Time from `now` until the next `at`: later today if `at` is still ahead,
/// otherwise tomorrow.
pub fn next_run_delay(now: NaiveDateTime, at: NaiveTime) -> Duration {
  let today = now.date().and_time(at);
  let next  = if today > now { today } else { today + TimeDelta::days(1) };
  (next - now).to_std().unwrap_or_default()
}

/// Spawn the backup loop: wait for the next `at` in local time, run a
/// cycle, then repeat every 24 hours. A failed cycle is logged and the loop
/// keeps going.
pub fn schedule_daily(engine: Arc<BackupEngine>, at: NaiveTime) -> JoinHandle<()> {
  tokio::spawn(async move {
    let delay = next_run_delay(Local::now().naive_local(), at);
    info!(at = %at.format("%H:%M"), in_secs = delay.as_secs(), "daily backup scheduled");
    tokio::time::sleep(delay).await;

    loop {
      if let BestEffort::Completed(report) = engine.run_cycle().await {
        info!(backup = %report.backup, deleted = report.deleted, "scheduled backup cycle complete");
      }
      tokio::time::sleep(DAY).await;
    }
  })
}

/// [`schedule_daily`] at the configured `backup_schedule`.
pub fn schedule_from_config(engine: Arc<BackupEngine>, config: &OpsConfig) -> Result<JoinHandle<()>> {
  let at = parse_schedule(&config.backup_schedule)?;
  Ok(schedule_daily(engine, at))
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(h, m, s).unwrap()
  }

  fn hm(h: u32, m: u32) -> NaiveTime { NaiveTime::from_hms_opt(h, m, 0).unwrap() }

  #[test]
  fn parses_strict_24h_times() {
    assert_eq!(parse_schedule("04:00").unwrap(), hm(4, 0));
    assert_eq!(parse_schedule("23:59").unwrap(), hm(23, 59));
    for bad in ["4:00", "24:00", "12:60", "noon", "04:00:00", ""] {
      assert!(matches!(parse_schedule(bad), Err(Error::InvalidSchedule(_))), "{bad}");
    }
  }

  #[test]
  fn runs_later_today_when_still_ahead() {
    assert_eq!(next_run_delay(at(3, 0, 0), hm(4, 0)), Duration::from_secs(3600));
  }

  #[test]
  fn runs_tomorrow_once_passed() {
    assert_eq!(next_run_delay(at(4, 0, 0), hm(4, 0)), DAY);
    assert_eq!(next_run_delay(at(5, 30, 0), hm(4, 0)), Duration::from_secs(22 * 3600 + 30 * 60));
  }

  #[test]
  fn rejects_bad_config_schedule() {
    let config = OpsConfig { backup_schedule: "25:00".into(), ..OpsConfig::default() };
    let engine = Arc::new(BackupEngine::with_paths("dev.db", "backups", 7));
    assert!(schedule_from_config(engine, &config).is_err());
  }
}
