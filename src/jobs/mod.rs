//! Background jobs: tip delivery followed by receiver notification.

mod delivery;
mod notification;

pub use delivery::*;
pub use notification::*;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::JobReport;

/// Run one delivery and notification cycle.
pub async fn run_cycle(repo: Arc<Repository>, config: Arc<Config>) -> Result<JobReport, AppError> {
    let tips_created = DeliverySchedule::new(Arc::clone(&repo)).tip_creation().await?;
    let (events_enqueued, mails_queued) =
        NotificationSchedule::new(repo, config).operation().await?;

    Ok(JobReport {
        tips_created,
        events_enqueued,
        mails_queued,
    })
}

/// Spawn the periodic job runner.
pub fn spawn_runner(repo: Arc<Repository>, config: Arc<Config>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.notification_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match run_cycle(Arc::clone(&repo), Arc::clone(&config)).await {
                Ok(report) => {
                    if report.mails_queued > 0 || report.tips_created > 0 {
                        tracing::info!(
                            tips_created = report.tips_created,
                            events_enqueued = report.events_enqueued,
                            mails_queued = report.mails_queued,
                            "Notification cycle completed"
                        );
                    }
                }
                Err(e) => tracing::error!(error = %e, "Notification cycle failed"),
            }
        }
    })
}
