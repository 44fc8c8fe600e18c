//! Tip notifications: turns new receiver tips into events and events into mails.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::db::Repository;
use crate::errors::AppError;
use crate::l10n::LocalizedText;
use crate::models::{OutboxMail, TipEvent};

/// Configuration text group holding the mail templates.
pub const NOTIFICATION_TEXT_GROUP: &str = "notification";
pub const TIP_MAIL_TITLE: &str = "tip_mail_title";
pub const TIP_MAIL_TEMPLATE: &str = "tip_mail_template";

const DEFAULT_TIP_MAIL_TITLE: &str = "[%NodeName%] New tip #%TipNum%";
const DEFAULT_TIP_MAIL_TEMPLATE: &str = "Dear %RecipientName%,\n\n\
    a new tip (#%TipNum%) was submitted to \"%ContextName%\" on %EventTime%.\n\
    It will expire on %ExpirationDate%.\n\n\
    -- %NodeName%\n";

/// Values substituted into the mail templates.
#[derive(Debug, Clone, Default)]
pub struct TipMailVars {
    pub node_name: String,
    pub recipient_name: String,
    pub context_name: String,
    pub tip_num: i64,
    pub event_time: String,
    pub expiration_date: String,
}

/// Replace every `%Placeholder%` known to tip mails. Unknown ones are left as is.
pub fn render_tip_mail(template: &str, vars: &TipMailVars) -> String {
    let tip_num = vars.tip_num.to_string();
    [
        ("%NodeName%", vars.node_name.as_str()),
        ("%RecipientName%", vars.recipient_name.as_str()),
        ("%ContextName%", vars.context_name.as_str()),
        ("%TipNum%", tip_num.as_str()),
        ("%EventTime%", vars.event_time.as_str()),
        ("%ExpirationDate%", vars.expiration_date.as_str()),
    ]
    .iter()
    .fold(template.to_string(), |text, (placeholder, value)| {
        text.replace(placeholder, value)
    })
}

fn display_date(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|date| {
            date.with_timezone(&Utc)
                .format("%Y-%m-%d %H:%M UTC")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}

fn template<'a>(
    templates: &BTreeMap<String, LocalizedText>,
    key: &str,
    language: &str,
    default_language: &str,
    fallback: &'a str,
) -> std::borrow::Cow<'a, str> {
    let text = templates
        .get(key)
        .map(|t| t.resolve(language, default_language))
        .unwrap_or_default();
    if text.is_empty() {
        fallback.into()
    } else {
        text.into()
    }
}

pub struct NotificationSchedule {
    repo: Arc<Repository>,
    config: Arc<Config>,
}

impl NotificationSchedule {
    pub fn new(repo: Arc<Repository>, config: Arc<Config>) -> Self {
        Self { repo, config }
    }

    /// Persist a notification event for each new receiver tip, up to the
    /// configured limit minus `counter` events already sent in this cycle.
    ///
    /// Returns the events and how many were enqueued.
    pub async fn create_tip_notification_events(
        &self,
        counter: usize,
    ) -> Result<(Vec<TipEvent>, usize), AppError> {
        let events = self
            .repo
            .enqueue_tip_events(counter, self.config.notification_limit)
            .await?;
        let enqueued = events.len();
        if enqueued > 0 {
            tracing::info!("Enqueued {} tip notification events", enqueued);
        }
        Ok((events, enqueued))
    }

    /// Render a mail for every event and store it in the outbox.
    ///
    /// Events that cannot be mailed stay unsent and are retried by the next
    /// `operation()`. Returns the number of mails queued.
    pub async fn do_tip_notification(&self, events: &[TipEvent]) -> Result<usize, AppError> {
        if events.is_empty() {
            return Ok(0);
        }

        let node = self.repo.load_node_snapshot().await?;
        let default_language = node.default_language().to_string();
        let templates = self.repo.get_config_texts(NOTIFICATION_TEXT_GROUP).await?;
        let source = format!(
            "{} <{}>",
            self.config.notif_source_name, self.config.notif_source_email
        );

        let mut queued = 0;
        for event in events {
            let Some(receiver) = self.repo.get_receiver(&event.receiver_id).await? else {
                tracing::warn!(
                    "Receiver {} of event {} no longer exists, skipping",
                    event.receiver_id,
                    event.id
                );
                continue;
            };
            if receiver.mail_address.trim().is_empty() {
                tracing::warn!(
                    "Receiver {} has no mail address, skipping event {}",
                    receiver.id,
                    event.id
                );
                continue;
            }

            let language = if receiver.language.is_empty() {
                default_language.as_str()
            } else {
                receiver.language.as_str()
            };

            let context_name = self
                .repo
                .get_context_name(&event.context_id)
                .await?
                .map(|name| name.resolve(language, &default_language))
                .unwrap_or_default();

            let vars = TipMailVars {
                node_name: node.settings.name.clone(),
                recipient_name: receiver.public_name.clone(),
                context_name,
                tip_num: event.tip_progressive,
                event_time: display_date(&event.creation_date),
                expiration_date: display_date(&event.expiration_date),
            };

            let subject = render_tip_mail(
                &template(
                    &templates,
                    TIP_MAIL_TITLE,
                    language,
                    &default_language,
                    DEFAULT_TIP_MAIL_TITLE,
                ),
                &vars,
            );
            let body = render_tip_mail(
                &template(
                    &templates,
                    TIP_MAIL_TEMPLATE,
                    language,
                    &default_language,
                    DEFAULT_TIP_MAIL_TEMPLATE,
                ),
                &vars,
            );

            let mail = OutboxMail {
                id: uuid::Uuid::new_v4().to_string(),
                event_id: event.id.clone(),
                source: source.clone(),
                address: receiver.mail_address.clone(),
                subject,
                body,
                creation_date: Utc::now().to_rfc3339(),
            };
            if let Err(e) = self.repo.queue_mail(&mail).await {
                tracing::error!("Failed to queue mail for event {}: {}", event.id, e);
                continue;
            }

            tracing::debug!("Queued tip mail {} for {}", mail.id, mail.address);
            queued += 1;
        }

        Ok(queued)
    }

    /// Enqueue events for new tips, then queue mails for every event still
    /// unsent, including those left over by earlier runs.
    ///
    /// Returns the number of events enqueued and mails queued.
    pub async fn operation(&self) -> Result<(usize, usize), AppError> {
        let (_, enqueued) = self.create_tip_notification_events(0).await?;
        let pending = self
            .repo
            .pending_tip_events(self.config.notification_limit)
            .await?;
        let queued = self.do_tip_notification(&pending).await?;
        Ok((enqueued, queued))
    }
}
