//! Context serialization.

use crate::models::{ContextRow, ContextView, PublicSnapshot, QuestionnaireRow};

use super::{serialize_questionnaire, FormIndex, Localizer};

/// Receivers of a context, in the context's presentation order.
pub fn context_receivers<'a>(snapshot: &'a PublicSnapshot, context_id: &str) -> Vec<&'a str> {
    let mut links: Vec<_> = snapshot
        .receiver_contexts
        .iter()
        .filter(|link| link.context_id == context_id)
        .collect();
    links.sort_by_key(|link| link.presentation_order);
    links.iter().map(|link| link.receiver_id.as_str()).collect()
}

pub fn serialize_context(
    snapshot: &PublicSnapshot,
    forms: &FormIndex<'_>,
    context: &ContextRow,
    loc: &Localizer<'_>,
) -> ContextView {
    let questionnaire = match forms.questionnaire(&context.questionnaire_id) {
        Some(questionnaire) => serialize_questionnaire(forms, questionnaire, loc),
        None => {
            tracing::warn!(
                "Context {} references missing questionnaire {}",
                context.id,
                context.questionnaire_id
            );
            let placeholder = QuestionnaireRow {
                id: context.questionnaire_id.clone(),
                ..QuestionnaireRow::default()
            };
            serialize_questionnaire(forms, &placeholder, loc)
        }
    };

    let picture = context
        .picture_id
        .as_ref()
        .and_then(|id| snapshot.pictures.get(id))
        .cloned()
        .unwrap_or_default();

    ContextView {
        id: context.id.clone(),
        settings: context.settings.clone(),
        questionnaire,
        receivers: context_receivers(snapshot, &context.id)
            .into_iter()
            .map(str::to_string)
            .collect(),
        picture,
        name: loc.text(&context.name),
        description: loc.text(&context.description),
        recipients_clarification: loc.text(&context.recipients_clarification),
        status_page_message: loc.text(&context.status_page_message),
    }
}

/// Contexts a whistleblower can submit to: those with at least one receiver.
pub fn public_context_list(
    snapshot: &PublicSnapshot,
    forms: &FormIndex<'_>,
    language: &str,
) -> Vec<ContextView> {
    let loc = Localizer::new(language, snapshot.node.default_language());

    snapshot
        .contexts
        .iter()
        .map(|context| serialize_context(snapshot, forms, context, &loc))
        .filter(|view| !view.receivers.is_empty())
        .collect()
}
