//! Once-a-day refresh at a fixed wall-clock time.

use std::time::Duration;

use quotedesk_core::{IngestPipeline, Period, Symbol};
use time::{OffsetDateTime, Time, UtcOffset};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: Time,
    offset: UtcOffset,
}

impl DailySchedule {
    pub const fn new(at: Time, offset: UtcOffset) -> Self {
        Self { at, offset }
    }

    /// First run strictly after `now`.
    pub fn next_run_after(&self, now: OffsetDateTime) -> OffsetDateTime {
        let local = now.to_offset(self.offset);
        let today = local.replace_time(self.at);
        if today > local {
            today
        } else {
            today + time::Duration::DAY
        }
    }

    pub fn delay_from(&self, now: OffsetDateTime) -> Duration {
        Duration::try_from(self.next_run_after(now) - now).unwrap_or(Duration::ZERO)
    }
}

/// Runs `pipeline` once per day until `shutdown` flips to `true`.
///
/// A refresh already in progress when shutdown arrives is allowed to finish.
pub async fn run_daily(
    schedule: DailySchedule,
    pipeline: IngestPipeline,
    symbols: Vec<Symbol>,
    period: Period,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let now = OffsetDateTime::now_utc();
        let next = schedule.next_run_after(now);
        tracing::info!(next_run = %next, "daily refresh scheduled");

        tokio::select! {
            () = tokio::time::sleep(schedule.delay_from(now)) => {}
            _ = shutdown.changed() => {
                tracing::info!("scheduler stopped");
                return;
            }
        }

        let report = pipeline.refresh(&symbols, period).await;
        if report.is_complete_failure() {
            tracing::error!(
                request_id = %report.request_id,
                "scheduled refresh failed for every symbol"
            );
        } else {
            tracing::info!(
                request_id = %report.request_id,
                stored = report.stored_total(),
                "scheduled refresh complete"
            );
        }
    }
}
