//! Notification event and mail outbox persistence.

use chrono::Utc;
use sqlx::Row;

use super::Repository;
use crate::errors::AppError;
use crate::models::{OutboxMail, TipEvent, EVENT_TYPE_TIP};

impl Repository {
    /// Turn new receiver tips into notification events.
    ///
    /// Each processed receiver tip stops being new. An event is persisted only
    /// when the receiver wants tip notifications. Processing stops once
    /// `counter` plus the events created here reaches `limit`; the remaining
    /// tips stay new for the next run.
    pub async fn enqueue_tip_events(
        &self,
        counter: usize,
        limit: usize,
    ) -> Result<Vec<TipEvent>, AppError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"SELECT rt.id AS receiver_tip_id, rt.receiver_id, r.tip_notification,
                      it.context_id, it.progressive, it.expiration_date
               FROM receiver_tips rt
               JOIN receivers r ON r.id = rt.receiver_id
               JOIN internal_tips it ON it.id = rt.internal_tip_id
               WHERE rt.new = 1
               ORDER BY it.progressive, rt.receiver_id"#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut events = Vec::new();
        for row in &rows {
            if counter + events.len() >= limit {
                tracing::debug!("Notification limit of {} reached", limit);
                break;
            }

            let receiver_tip_id: String = row.get("receiver_tip_id");
            let receiver_id: String = row.get("receiver_id");
            let tip_notification: i64 = row.get("tip_notification");

            sqlx::query("UPDATE receiver_tips SET new = 0 WHERE id = ?")
                .bind(&receiver_tip_id)
                .execute(&mut *tx)
                .await?;

            if tip_notification == 0 {
                tracing::debug!(
                    "Receiver {} has tip notifications disabled, skipping",
                    receiver_id
                );
                continue;
            }

            let event = TipEvent {
                id: uuid::Uuid::new_v4().to_string(),
                receivertip_id: receiver_tip_id,
                receiver_id,
                context_id: row.get("context_id"),
                tip_progressive: row.get("progressive"),
                event_type: EVENT_TYPE_TIP.to_string(),
                creation_date: Utc::now().to_rfc3339(),
                expiration_date: row.get("expiration_date"),
            };

            sqlx::query(
                r#"INSERT INTO event_logs (id, receiver_tip_id, receiver_id, event_type, creation_date, mail_sent)
                   VALUES (?, ?, ?, ?, ?, 0)"#,
            )
            .bind(&event.id)
            .bind(&event.receivertip_id)
            .bind(&event.receiver_id)
            .bind(&event.event_type)
            .bind(&event.creation_date)
            .execute(&mut *tx)
            .await?;

            events.push(event);
        }

        tx.commit().await?;

        Ok(events)
    }

    /// Events whose mail has not been queued yet, oldest first.
    pub async fn pending_tip_events(&self, limit: usize) -> Result<Vec<TipEvent>, AppError> {
        let rows = sqlx::query(
            r#"SELECT e.id, e.receiver_tip_id, e.receiver_id, e.event_type, e.creation_date,
                      it.context_id, it.progressive, it.expiration_date
               FROM event_logs e
               JOIN receiver_tips rt ON rt.id = e.receiver_tip_id
               JOIN internal_tips it ON it.id = rt.internal_tip_id
               WHERE e.mail_sent = 0 AND e.event_type = ?
               ORDER BY e.creation_date, it.progressive, e.receiver_id
               LIMIT ?"#,
        )
        .bind(EVENT_TYPE_TIP)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TipEvent {
                id: row.get("id"),
                receivertip_id: row.get("receiver_tip_id"),
                receiver_id: row.get("receiver_id"),
                context_id: row.get("context_id"),
                tip_progressive: row.get("progressive"),
                event_type: row.get("event_type"),
                creation_date: row.get("creation_date"),
                expiration_date: row.get("expiration_date"),
            })
            .collect())
    }

    /// Store a rendered mail in the outbox and mark its event as sent.
    pub async fn queue_mail(&self, mail: &OutboxMail) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO mails (id, event_id, source, address, subject, body, creation_date)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&mail.id)
        .bind(&mail.event_id)
        .bind(&mail.source)
        .bind(&mail.address)
        .bind(&mail.subject)
        .bind(&mail.body)
        .bind(&mail.creation_date)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("UPDATE event_logs SET mail_sent = 1 WHERE id = ?")
            .bind(&mail.event_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Notification event {} not found",
                mail.event_id
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    /// List the outbox, oldest first.
    #[cfg(test)]
    pub async fn list_outbox(&self) -> Result<Vec<OutboxMail>, AppError> {
        let rows = sqlx::query(
            "SELECT id, event_id, source, address, subject, body, creation_date FROM mails ORDER BY creation_date, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| OutboxMail {
                id: row.get("id"),
                event_id: row.get("event_id"),
                source: row.get("source"),
                address: row.get("address"),
                subject: row.get("subject"),
                body: row.get("body"),
                creation_date: row.get("creation_date"),
            })
            .collect())
    }
}
