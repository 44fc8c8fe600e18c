//! Submission context models.

use serde::Serialize;

use super::QuestionnaireView;
use crate::l10n::LocalizedText;

/// Display and behaviour settings of a context, exported as-is.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ContextSettings {
    pub presentation_order: i64,
    /// Days a tip stays available before expiring
    pub tip_timetolive: i64,
    pub select_all_receivers: bool,
    pub maximum_selectable_receivers: i64,
    pub show_context: bool,
    pub show_recipients_details: bool,
    pub allow_recipients_selection: bool,
    pub show_small_receiver_cards: bool,
    pub enable_comments: bool,
    pub enable_messages: bool,
    pub enable_two_way_comments: bool,
    pub enable_two_way_messages: bool,
    pub enable_attachments: bool,
    pub show_receivers_in_alphabetical_order: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ContextRow {
    pub id: String,
    pub questionnaire_id: String,
    pub picture_id: Option<String>,
    pub settings: ContextSettings,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub recipients_clarification: LocalizedText,
    pub status_page_message: LocalizedText,
}

/// Association between a receiver and a context.
#[derive(Debug, Clone)]
pub struct ReceiverContextRow {
    pub receiver_id: String,
    pub context_id: String,
    pub presentation_order: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextView {
    pub id: String,
    #[serde(flatten)]
    pub settings: ContextSettings,
    pub questionnaire: QuestionnaireView,
    pub receivers: Vec<String>,
    pub picture: String,
    pub name: String,
    pub description: String,
    pub recipients_clarification: String,
    pub status_page_message: String,
}
