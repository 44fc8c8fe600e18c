//! Internal endpoints used by the administration backend and operators.

use axum::extract::State;
use serde::Serialize;

use super::{error, success, ApiResult};
use crate::jobs;
use crate::models::JobReport;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInvalidation {
    pub revision_id: i64,
}

/// POST /api/internal/cache/invalidate - Signal a configuration change.
pub async fn invalidate_cache(State(state): State<AppState>) -> ApiResult<CacheInvalidation> {
    let revision_id = match state.repo.increment_revision().await {
        Ok(revision_id) => revision_id,
        Err(e) => return error(e, 0),
    };
    state.cache.invalidate().await;

    tracing::info!("Configuration revision bumped to {}", revision_id);
    success(CacheInvalidation { revision_id }, revision_id)
}

/// POST /api/internal/jobs/notification - Run delivery and notification once.
pub async fn run_notification_jobs(State(state): State<AppState>) -> ApiResult<JobReport> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match jobs::run_cycle(state.repo.clone(), state.config.clone()).await {
        Ok(report) => success(report, revision_id),
        Err(e) => error(e, revision_id),
    }
}
