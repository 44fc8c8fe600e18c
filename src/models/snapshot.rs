//! Read-only snapshots loaded in a single transaction per projection.

use std::collections::{BTreeMap, HashMap};

use super::{
    ContextRow, FieldAttrRow, FieldOptionRow, FieldRow, NodeSettings, QuestionnaireRow,
    ReceiverContextRow, ReceiverRow, StepRow,
};
use crate::l10n::LocalizedText;

/// Everything the node description needs.
#[derive(Debug, Clone, Default)]
pub struct NodeSnapshot {
    pub settings: NodeSettings,
    /// Localized node texts keyed by variable name
    pub texts: BTreeMap<String, LocalizedText>,
    pub enabled_languages: Vec<String>,
    /// Well-known node files keyed by file id
    pub files: HashMap<String, String>,
    /// At least one receiver is associated with a context
    pub configured: bool,
}

impl NodeSnapshot {
    pub fn default_language(&self) -> &str {
        &self.settings.default_language
    }
}

/// Everything the public resources endpoint needs.
///
/// Row vectors are already in presentation order.
#[derive(Debug, Clone, Default)]
pub struct PublicSnapshot {
    pub node: NodeSnapshot,
    pub contexts: Vec<ContextRow>,
    pub receivers: Vec<ReceiverRow>,
    pub receiver_contexts: Vec<ReceiverContextRow>,
    pub questionnaires: Vec<QuestionnaireRow>,
    pub steps: Vec<StepRow>,
    pub fields: Vec<FieldRow>,
    pub attrs: Vec<FieldAttrRow>,
    pub options: Vec<FieldOptionRow>,
    /// Context and user pictures keyed by file id
    pub pictures: HashMap<String, String>,
}
