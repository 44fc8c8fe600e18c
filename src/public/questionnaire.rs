//! Questionnaire, step and field serialization.

use std::collections::{BTreeMap, HashMap};

use crate::l10n::LocalizedText;
use crate::models::{
    AttrValue, FieldAttrRow, FieldAttrView, FieldOptionRow, FieldOptionView, FieldRow, FieldView,
    PublicSnapshot, QuestionnaireRow, QuestionnaireView, StepRow, StepView, TriggerRef,
};

use super::Localizer;

/// Field groups nested deeper than this are cut off.
pub const MAX_FIELD_DEPTH: usize = 32;

/// Lookup tables over the form rows of a snapshot.
///
/// Every list keeps the order of the snapshot, which is the presentation order.
#[derive(Debug, Default)]
pub struct FormIndex<'a> {
    questionnaires: HashMap<&'a str, &'a QuestionnaireRow>,
    steps_by_questionnaire: HashMap<&'a str, Vec<&'a StepRow>>,
    fields: HashMap<&'a str, &'a FieldRow>,
    fields_by_step: HashMap<&'a str, Vec<&'a FieldRow>>,
    fields_by_group: HashMap<&'a str, Vec<&'a FieldRow>>,
    attrs_by_field: HashMap<&'a str, Vec<&'a FieldAttrRow>>,
    options_by_field: HashMap<&'a str, Vec<&'a FieldOptionRow>>,
    options_by_trigger_field: HashMap<&'a str, Vec<&'a FieldOptionRow>>,
    options_by_trigger_step: HashMap<&'a str, Vec<&'a FieldOptionRow>>,
}

impl<'a> FormIndex<'a> {
    pub fn new(snapshot: &'a PublicSnapshot) -> Self {
        let mut index = FormIndex::default();

        for questionnaire in &snapshot.questionnaires {
            index
                .questionnaires
                .insert(questionnaire.id.as_str(), questionnaire);
        }
        for step in &snapshot.steps {
            index
                .steps_by_questionnaire
                .entry(step.questionnaire_id.as_str())
                .or_default()
                .push(step);
        }
        for field in &snapshot.fields {
            index.fields.insert(field.id.as_str(), field);
            if let Some(step_id) = &field.step_id {
                index
                    .fields_by_step
                    .entry(step_id.as_str())
                    .or_default()
                    .push(field);
            }
            if let Some(group_id) = &field.fieldgroup_id {
                index
                    .fields_by_group
                    .entry(group_id.as_str())
                    .or_default()
                    .push(field);
            }
        }
        for attr in &snapshot.attrs {
            index
                .attrs_by_field
                .entry(attr.field_id.as_str())
                .or_default()
                .push(attr);
        }
        for option in &snapshot.options {
            index
                .options_by_field
                .entry(option.field_id.as_str())
                .or_default()
                .push(option);
            if let Some(field_id) = &option.trigger_field {
                index
                    .options_by_trigger_field
                    .entry(field_id.as_str())
                    .or_default()
                    .push(option);
            }
            if let Some(step_id) = &option.trigger_step {
                index
                    .options_by_trigger_step
                    .entry(step_id.as_str())
                    .or_default()
                    .push(option);
            }
        }

        index
    }

    pub fn questionnaire(&self, id: &str) -> Option<&'a QuestionnaireRow> {
        self.questionnaires.get(id).copied()
    }

    pub fn steps(&self, questionnaire_id: &str) -> &[&'a StepRow] {
        slice(&self.steps_by_questionnaire, questionnaire_id)
    }

    pub fn step_fields(&self, step_id: &str) -> &[&'a FieldRow] {
        slice(&self.fields_by_step, step_id)
    }

    pub fn group_fields(&self, group_id: &str) -> &[&'a FieldRow] {
        slice(&self.fields_by_group, group_id)
    }

    /// The row a field takes its definition from: its template when it has one.
    pub fn definition(&self, field: &'a FieldRow) -> &'a FieldRow {
        match field.template_id.as_deref() {
            None => field,
            Some(template_id) => match self.fields.get(template_id).copied() {
                Some(template) => template,
                None => {
                    tracing::warn!(
                        "Field {} references missing template {}",
                        field.id,
                        template_id
                    );
                    field
                }
            },
        }
    }

    fn attrs(&self, field_id: &str) -> &[&'a FieldAttrRow] {
        slice(&self.attrs_by_field, field_id)
    }

    fn options(&self, field_id: &str) -> &[&'a FieldOptionRow] {
        slice(&self.options_by_field, field_id)
    }

    pub fn triggers_of_field(&self, field_id: &str) -> Vec<TriggerRef> {
        trigger_refs(slice(&self.options_by_trigger_field, field_id))
    }

    pub fn triggers_of_step(&self, step_id: &str) -> Vec<TriggerRef> {
        trigger_refs(slice(&self.options_by_trigger_step, step_id))
    }
}

fn slice<'m, 'a, T>(map: &'m HashMap<&'a str, Vec<&'a T>>, key: &str) -> &'m [&'a T] {
    map.get(key).map(Vec::as_slice).unwrap_or(&[])
}

fn trigger_refs(options: &[&FieldOptionRow]) -> Vec<TriggerRef> {
    options
        .iter()
        .map(|option| TriggerRef {
            field: option.field_id.clone(),
            option: option.id.clone(),
        })
        .collect()
}

pub fn serialize_questionnaire(
    forms: &FormIndex<'_>,
    questionnaire: &QuestionnaireRow,
    loc: &Localizer<'_>,
) -> QuestionnaireView {
    QuestionnaireView {
        questionnaire: questionnaire.clone(),
        steps: forms
            .steps(&questionnaire.id)
            .iter()
            .map(|step| serialize_step(forms, step, loc))
            .collect(),
    }
}

pub fn serialize_step(forms: &FormIndex<'_>, step: &StepRow, loc: &Localizer<'_>) -> StepView {
    StepView {
        id: step.id.clone(),
        questionnaire_id: step.questionnaire_id.clone(),
        presentation_order: step.presentation_order,
        triggered_by_score: step.triggered_by_score,
        triggered_by_options: forms.triggers_of_step(&step.id),
        children: forms
            .step_fields(&step.id)
            .iter()
            .map(|field| serialize_field(forms, field, loc, 0))
            .collect(),
        label: loc.text(&step.label),
        description: loc.text(&step.description),
    }
}

/// Serialize a field at nesting level `depth`.
///
/// Identity, placement and flags come from the field itself; key, type,
/// attributes, options, children and texts come from its definition.
pub fn serialize_field<'a>(
    forms: &FormIndex<'a>,
    field: &'a FieldRow,
    loc: &Localizer<'_>,
    depth: usize,
) -> FieldView {
    let definition = forms.definition(field);

    let attrs: BTreeMap<String, FieldAttrView> = forms
        .attrs(&definition.id)
        .iter()
        .map(|attr| (attr.name.clone(), serialize_field_attr(attr, loc)))
        .collect();

    let children = if depth + 1 >= MAX_FIELD_DEPTH {
        tracing::warn!(
            "Field {} nested deeper than {} levels, dropping its children",
            field.id,
            MAX_FIELD_DEPTH
        );
        Vec::new()
    } else {
        forms
            .group_fields(&definition.id)
            .iter()
            .map(|child| serialize_field(forms, child, loc, depth + 1))
            .collect()
    };

    FieldView {
        id: field.id.clone(),
        key: definition.key.clone(),
        instance: field.instance.clone(),
        editable: field.editable,
        field_type: definition.field_type.clone(),
        template_id: field.template_id.clone().unwrap_or_default(),
        step_id: field.step_id.clone().unwrap_or_default(),
        fieldgroup_id: field.fieldgroup_id.clone().unwrap_or_default(),
        multi_entry: field.multi_entry,
        required: field.required,
        preview: field.preview,
        stats_enabled: field.stats_enabled,
        attrs,
        x: field.x,
        y: field.y,
        width: field.width,
        triggered_by_score: field.triggered_by_score,
        triggered_by_options: forms.triggers_of_field(&field.id),
        options: forms
            .options(&definition.id)
            .iter()
            .map(|option| serialize_field_option(option, loc))
            .collect(),
        children,
        label: loc.text(&definition.label),
        description: loc.text(&definition.description),
        hint: loc.text(&definition.hint),
        multi_entry_hint: loc.text(&definition.multi_entry_hint),
    }
}

pub fn serialize_field_attr(attr: &FieldAttrRow, loc: &Localizer<'_>) -> FieldAttrView {
    let value = match attr.attr_type.as_str() {
        "bool" => AttrValue::Bool(attr.value == "True"),
        "localized" => AttrValue::Text(loc.text(&LocalizedText::from_column(Some(&attr.value)))),
        _ => AttrValue::Text(attr.value.clone()),
    };

    FieldAttrView {
        id: attr.id.clone(),
        name: attr.name.clone(),
        attr_type: attr.attr_type.clone(),
        value,
    }
}

pub fn serialize_field_option(option: &FieldOptionRow, loc: &Localizer<'_>) -> FieldOptionView {
    FieldOptionView {
        id: option.id.clone(),
        presentation_order: option.presentation_order,
        score_points: option.score_points,
        trigger_field: option.trigger_field.clone().unwrap_or_default(),
        trigger_step: option.trigger_step.clone().unwrap_or_default(),
        label: loc.text(&option.label),
    }
}
