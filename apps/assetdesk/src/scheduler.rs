//! # Scheduler
//!
//! Runs the daily jobs (vehicle document expiry alerts and maintenance
//! recurrence) on a fixed interval, then delivers whatever they queued.

use crate::api::AppState;
use crate::config::SchedulerConfig;
use crate::mailer::DeliveryReport;
use assetdesk_core::{ActionContext, DeskError, JobReport, UserId};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Actor recorded on everything the scheduler does.
pub const SYSTEM_ACTOR: UserId = UserId(0);

/// Shortest accepted interval.
const MIN_INTERVAL_SECS: u64 = 60;

/// Run both jobs once and deliver the outbox.
pub async fn run_once(
    state: &AppState,
    now: DateTime<Utc>,
) -> Result<(JobReport, DeliveryReport), DeskError> {
    let ctx = ActionContext::new(SYSTEM_ACTOR, now);
    let report = {
        let mut desk = state.desk.write().await;
        state
            .commit(&mut *desk, |d| d.run_daily_jobs(&ctx))
            .await?
    };
    let delivery = state.flush_outbox().await;
    Ok((report, delivery))
}

/// Start the background loop, unless disabled. The first run happens
/// immediately.
pub fn spawn(state: AppState, config: &SchedulerConfig) -> Option<JoinHandle<()>> {
    if !config.enabled {
        tracing::info!("Scheduler disabled");
        return None;
    }
    let period = Duration::from_secs(config.interval_secs.max(MIN_INTERVAL_SECS));
    tracing::info!(interval_secs = period.as_secs(), "Scheduler started");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match run_once(&state, Utc::now()).await {
                Ok((report, delivery)) => tracing::info!(
                    expiry_alerts = report.expiry_alerts,
                    maintenance_requests = report.maintenance_requests.len(),
                    sent = delivery.sent,
                    failed = delivery.failed,
                    "Daily jobs finished"
                ),
                Err(e) => tracing::error!(error = %e, "Daily jobs failed"),
            }
        }
    }))
}
