//! Submission intake and tip delivery persistence.

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;

use super::Repository;
use crate::errors::AppError;
use crate::models::SubmissionSummary;

/// A validated submission ready to be stored.
#[derive(Debug, Clone)]
pub struct SubmissionRecord<'a> {
    pub context_id: &'a str,
    pub receivers: &'a [String],
    pub answers: &'a serde_json::Map<String, serde_json::Value>,
    pub finalized: bool,
    /// Days before the tip expires
    pub tip_timetolive: i64,
}

impl Repository {
    /// Store a new internal tip and its selected receivers.
    pub async fn create_submission(
        &self,
        record: &SubmissionRecord<'_>,
    ) -> Result<SubmissionSummary, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let expiration = expiration_date(now, record.tip_timetolive);
        let answers_json = serde_json::to_string(record.answers)?;

        let mut tx = self.pool.begin().await?;

        // Writing first takes the write lock before the progressive is read
        let progressive: i64 = sqlx::query(
            r#"INSERT INTO internal_tips (
                id, context_id, progressive, answers, finalized, creation_date, expiration_date
            )
            SELECT ?, ?, COALESCE(MAX(progressive), 0) + 1, ?, ?, ?, ?
            FROM internal_tips
            RETURNING progressive"#,
        )
        .bind(&id)
        .bind(record.context_id)
        .bind(&answers_json)
        .bind(record.finalized as i32)
        .bind(now.to_rfc3339())
        .bind(expiration.to_rfc3339())
        .fetch_one(&mut *tx)
        .await?
        .get("progressive");

        for receiver_id in record.receivers {
            sqlx::query(
                "INSERT OR IGNORE INTO internal_tip_receivers (internal_tip_id, receiver_id) VALUES (?, ?)",
            )
            .bind(&id)
            .bind(receiver_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Stored submission {} (#{}) for context {}",
            id,
            progressive,
            record.context_id
        );

        Ok(SubmissionSummary {
            id,
            context_id: record.context_id.to_string(),
            progressive,
            receivers: record.receivers.to_vec(),
            creation_date: now.to_rfc3339(),
            expiration_date: expiration.to_rfc3339(),
            finalized: record.finalized,
        })
    }

    /// Create the receiver tips of every finalized submission that has none yet.
    ///
    /// Returns the number of receiver tips created.
    pub async fn create_receiver_tips(&self) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        let pending = sqlx::query(
            r#"SELECT itr.internal_tip_id, itr.receiver_id
               FROM internal_tip_receivers itr
               JOIN internal_tips it ON it.id = itr.internal_tip_id
               WHERE it.finalized = 1
                 AND NOT EXISTS (SELECT 1 FROM receiver_tips rt
                                 WHERE rt.internal_tip_id = itr.internal_tip_id)
               ORDER BY it.progressive, itr.receiver_id"#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let now = Utc::now().to_rfc3339();
        for row in &pending {
            let internal_tip_id: String = row.get("internal_tip_id");
            let receiver_id: String = row.get("receiver_id");

            sqlx::query(
                r#"INSERT INTO receiver_tips (id, internal_tip_id, receiver_id, creation_date, new)
                   VALUES (?, ?, ?, ?, 1)"#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&internal_tip_id)
            .bind(&receiver_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(pending.len())
    }
}

const MAX_TIP_TIMETOLIVE_DAYS: i64 = 3650;

fn expiration_date(now: DateTime<Utc>, tip_timetolive_days: i64) -> DateTime<Utc> {
    now + Duration::days(tip_timetolive_days.clamp(0, MAX_TIP_TIMETOLIVE_DAYS))
}
