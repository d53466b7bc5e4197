// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background jobs driving the group lifecycle.
//!
//! - Deactivation sweep on a fixed interval
//! - Quick-match group regeneration once a day at a fixed UTC time
//!
//! Each job runs in its own task and awaits its own run before waiting for
//! the next tick, so a job never overlaps with itself.

use crate::config::SchedulerConfig;
use crate::services::GroupService;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Next instant at or after `now` (exclusive) whose UTC wall time is `at`.
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Run the deactivation sweep every `period`.
///
/// Ticks that fire while a sweep is still running are skipped.
pub fn spawn_deactivation_sweep(service: GroupService, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match service.sweep_deactivation().await {
                Ok(report) if report.deactivated > 0 || report.failed > 0 => {
                    tracing::info!(
                        deactivated = report.deactivated,
                        failed = report.failed,
                        "Deactivation sweep finished"
                    );
                }
                Ok(_) => tracing::trace!("Deactivation sweep found nothing to do"),
                Err(e) => tracing::error!(error = %e, "Deactivation sweep failed"),
            }
        }
    })
}

/// Regenerate the quick-match group every day at `at` (UTC).
pub fn spawn_quick_match_regeneration(service: GroupService, at: NaiveTime) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = service.clock().now();
            let next = next_daily_run(now, at);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::debug!(next_run = %next, "Quick match regeneration scheduled");

            tokio::time::sleep(wait).await;

            if let Err(e) = service.regenerate_quick_match_group().await {
                tracing::error!(error = %e, "Quick match regeneration failed");
            }
        }
    })
}

/// Handles to the running background jobs.
pub struct Scheduler {
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn both lifecycle jobs.
    pub fn start(service: GroupService, config: &SchedulerConfig) -> Self {
        tracing::info!(
            sweep_interval_secs = config.sweep_interval.as_secs(),
            quick_match_at = %config.quick_match_at,
            "Starting lifecycle scheduler"
        );

        let handles = vec![
            spawn_deactivation_sweep(service.clone(), config.sweep_interval),
            spawn_quick_match_regeneration(service, config.quick_match_at),
        ];

        Self { handles }
    }

    /// Stop all jobs.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
        tracing::info!("Lifecycle scheduler stopped");
    }
}
