//! Tip notification models.

use serde::Serialize;

pub const EVENT_TYPE_TIP: &str = "tip";

/// A pending notification about a receiver tip, joined with what the mail template needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TipEvent {
    pub id: String,
    pub receivertip_id: String,
    pub receiver_id: String,
    pub context_id: String,
    pub tip_progressive: i64,
    pub event_type: String,
    pub creation_date: String,
    pub expiration_date: String,
}

/// A rendered mail waiting in the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMail {
    pub id: String,
    pub event_id: String,
    pub source: String,
    pub address: String,
    pub subject: String,
    pub body: String,
    pub creation_date: String,
}

/// Counters of one delivery and notification cycle.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct JobReport {
    pub tips_created: usize,
    pub events_enqueued: usize,
    pub mails_queued: usize,
}
