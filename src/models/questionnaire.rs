//! Questionnaire, step and field models.
//!
//! A questionnaire is an ordered list of steps; each step holds a tree of
//! fields. A field may inherit its definition from a template field and may
//! group child fields.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::l10n::LocalizedText;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct QuestionnaireRow {
    pub id: String,
    pub key: String,
    pub editable: bool,
    pub name: String,
    pub show_steps_navigation_bar: bool,
    pub steps_navigation_requires_completion: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StepRow {
    pub id: String,
    pub questionnaire_id: String,
    pub presentation_order: i64,
    pub triggered_by_score: i64,
    pub label: LocalizedText,
    pub description: LocalizedText,
}

#[derive(Debug, Clone, Default)]
pub struct FieldRow {
    pub id: String,
    pub key: String,
    pub instance: String,
    pub editable: bool,
    pub field_type: String,
    pub template_id: Option<String>,
    pub step_id: Option<String>,
    pub fieldgroup_id: Option<String>,
    pub multi_entry: bool,
    pub required: bool,
    pub preview: bool,
    pub stats_enabled: bool,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub triggered_by_score: i64,
    pub label: LocalizedText,
    pub description: LocalizedText,
    pub hint: LocalizedText,
    pub multi_entry_hint: LocalizedText,
}

#[derive(Debug, Clone, Default)]
pub struct FieldAttrRow {
    pub id: String,
    pub field_id: String,
    pub name: String,
    pub attr_type: String,
    /// Raw stored value; a JSON object of translations when `attr_type` is `localized`
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct FieldOptionRow {
    pub id: String,
    pub field_id: String,
    pub presentation_order: i64,
    pub score_points: i64,
    pub trigger_field: Option<String>,
    pub trigger_step: Option<String>,
    pub label: LocalizedText,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionnaireView {
    #[serde(flatten)]
    pub questionnaire: QuestionnaireRow,
    pub steps: Vec<StepView>,
}

/// An option that, when selected, reveals the step or field owning this reference.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TriggerRef {
    pub field: String,
    pub option: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub id: String,
    pub questionnaire_id: String,
    pub presentation_order: i64,
    pub triggered_by_score: i64,
    pub triggered_by_options: Vec<TriggerRef>,
    pub children: Vec<FieldView>,
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldAttrView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: String,
    pub value: AttrValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldOptionView {
    pub id: String,
    pub presentation_order: i64,
    pub score_points: i64,
    pub trigger_field: String,
    pub trigger_step: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub id: String,
    pub key: String,
    pub instance: String,
    pub editable: bool,
    #[serde(rename = "type")]
    pub field_type: String,
    pub template_id: String,
    pub step_id: String,
    pub fieldgroup_id: String,
    pub multi_entry: bool,
    pub required: bool,
    pub preview: bool,
    pub stats_enabled: bool,
    pub attrs: BTreeMap<String, FieldAttrView>,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub triggered_by_score: i64,
    pub triggered_by_options: Vec<TriggerRef>,
    pub options: Vec<FieldOptionView>,
    pub children: Vec<FieldView>,
    pub label: String,
    pub description: String,
    pub hint: String,
    pub multi_entry_hint: String,
}
