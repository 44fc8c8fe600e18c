//! Receiver models.

use serde::Serialize;

use crate::l10n::LocalizedText;

pub const USER_STATE_DISABLED: &str = "disabled";

/// A receiver joined with its user account.
#[derive(Debug, Clone, Default)]
pub struct ReceiverRow {
    pub id: String,
    pub configuration: String,
    pub presentation_order: i64,
    pub tip_notification: bool,
    pub username: String,
    pub public_name: String,
    pub state: String,
    pub language: String,
    pub mail_address: String,
    pub picture_id: Option<String>,
    pub description: LocalizedText,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiverView {
    pub id: String,
    pub name: String,
    pub username: String,
    pub state: String,
    pub configuration: String,
    pub presentation_order: i64,
    pub contexts: Vec<String>,
    pub picture: String,
    pub description: String,
}
