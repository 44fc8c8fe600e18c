//! Tip delivery: hands finalized submissions to their receivers.

use std::sync::Arc;

use crate::db::Repository;
use crate::errors::AppError;

pub struct DeliverySchedule {
    repo: Arc<Repository>,
}

impl DeliverySchedule {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Create a receiver tip for every receiver of every finalized submission
    /// not delivered yet. Returns the number of receiver tips created.
    pub async fn tip_creation(&self) -> Result<usize, AppError> {
        let created = self.repo.create_receiver_tips().await?;
        if created > 0 {
            tracing::info!("Delivered {} receiver tips", created);
        }
        Ok(created)
    }
}
