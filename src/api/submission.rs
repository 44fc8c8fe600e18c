//! Submission intake endpoint.

use axum::{extract::State, Json};
use serde_json::{Map, Value};

use super::{error, success, ApiResult};
use crate::db::SubmissionRecord;
use crate::errors::AppError;
use crate::models::{
    ContextRow, NewSubmissionRequest, PublicSnapshot, SubmissionSummary, USER_STATE_DISABLED,
};
use crate::public::{context_receivers, FormIndex};
use crate::AppState;

/// POST /api/submission - Store a whistleblower submission.
pub async fn create_submission(
    State(state): State<AppState>,
    Json(request): Json<NewSubmissionRequest>,
) -> ApiResult<SubmissionSummary> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if !state.config.accept_submissions {
        return error(
            AppError::Forbidden("Submissions are currently disabled".to_string()),
            revision_id,
        );
    }

    let snapshot = match state.repo.load_public_snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return error(e, revision_id),
    };

    let submission = match validate_submission(&snapshot, &request) {
        Ok(submission) => submission,
        Err(e) => {
            tracing::info!("Rejected submission to {}: {}", request.context_id, e);
            return error(e, revision_id);
        }
    };

    let record = SubmissionRecord {
        context_id: &submission.context.id,
        receivers: &submission.receivers,
        answers: &request.answers,
        finalized: request.finalize,
        tip_timetolive: submission.context.settings.tip_timetolive,
    };

    match state.repo.create_submission(&record).await {
        Ok(summary) => success(summary, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// A submission that passed validation.
#[derive(Debug)]
pub struct ValidSubmission<'a> {
    pub context: &'a ContextRow,
    /// Selected receivers without duplicates, in request order
    pub receivers: Vec<String>,
}

/// Check a submission against the public configuration it targets.
pub fn validate_submission<'a>(
    snapshot: &'a PublicSnapshot,
    request: &NewSubmissionRequest,
) -> Result<ValidSubmission<'a>, AppError> {
    let context = snapshot
        .contexts
        .iter()
        .find(|c| c.id == request.context_id)
        .ok_or_else(|| AppError::NotFound(format!("Context {} not found", request.context_id)))?;

    let allowed: Vec<&str> = context_receivers(snapshot, &context.id)
        .into_iter()
        .filter(|id| {
            snapshot
                .receivers
                .iter()
                .any(|r| r.id == *id && r.state != USER_STATE_DISABLED)
        })
        .collect();

    if allowed.is_empty() {
        return Err(AppError::NotFound(format!(
            "Context {} is not open to submissions",
            context.id
        )));
    }

    let mut receivers: Vec<String> = Vec::with_capacity(request.receivers.len());
    for id in &request.receivers {
        if !receivers.contains(id) {
            receivers.push(id.clone());
        }
    }

    if receivers.is_empty() {
        return Err(AppError::Validation(
            "At least one receiver must be selected".to_string(),
        ));
    }

    if let Some(unknown) = receivers
        .iter()
        .find(|id| !allowed.contains(&id.as_str()))
    {
        return Err(AppError::Validation(format!(
            "Receiver {} is not available for context {}",
            unknown, context.id
        )));
    }

    let maximum = context.settings.maximum_selectable_receivers;
    if maximum > 0 && receivers.len() as i64 > maximum {
        return Err(AppError::Validation(format!(
            "At most {} receivers can be selected",
            maximum
        )));
    }

    if let Some(field_id) = missing_required_answer(snapshot, context, &request.answers) {
        return Err(AppError::Validation(format!(
            "Required field {} has no answer",
            field_id
        )));
    }

    // Nothing finalizes a stored draft later
    if !request.finalize {
        return Err(AppError::Validation(
            "Submissions must be finalized".to_string(),
        ));
    }

    Ok(ValidSubmission { context, receivers })
}

/// First required field shown unconditionally whose answer is empty.
fn missing_required_answer<'a>(
    snapshot: &'a PublicSnapshot,
    context: &ContextRow,
    answers: &Map<String, Value>,
) -> Option<&'a str> {
    let forms = FormIndex::new(snapshot);

    forms
        .steps(&context.questionnaire_id)
        .iter()
        .filter(|step| step.triggered_by_score == 0 && forms.triggers_of_step(&step.id).is_empty())
        .flat_map(|step| forms.step_fields(&step.id).iter().copied())
        .filter(|field| {
            field.required
                && field.triggered_by_score == 0
                && forms.triggers_of_field(&field.id).is_empty()
        })
        .find(|field| !is_answered(answers.get(&field.id)))
        .map(|field| field.id.as_str())
}

fn is_answered(answer: Option<&Value>) -> bool {
    match answer {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::public::fixtures;

    fn request(receivers: &[&str], answers: Value) -> NewSubmissionRequest {
        serde_json::from_value(json!({
            "context_id": "c1",
            "receivers": receivers,
            "answers": answers,
            "finalize": true,
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_submission() {
        let snapshot = fixtures::snapshot();
        let submission =
            validate_submission(&snapshot, &request(&["r1"], json!({"f_question": "o1"})))
                .unwrap();
        assert_eq!(submission.context.id, "c1");
        assert_eq!(submission.receivers, ["r1"]);
    }

    #[test]
    fn test_unknown_or_closed_context() {
        let snapshot = fixtures::snapshot();

        let mut req = request(&["r1"], json!({"f_question": "o1"}));
        req.context_id = "missing".to_string();
        assert!(matches!(
            validate_submission(&snapshot, &req),
            Err(AppError::NotFound(_))
        ));

        req.context_id = "c_empty".to_string();
        assert!(matches!(
            validate_submission(&snapshot, &req),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_receiver_selection() {
        let snapshot = fixtures::snapshot();

        let empty = request(&[], json!({"f_question": "o1"}));
        assert!(matches!(
            validate_submission(&snapshot, &empty),
            Err(AppError::Validation(_))
        ));

        let foreign = request(&["r3"], json!({"f_question": "o1"}));
        assert!(matches!(
            validate_submission(&snapshot, &foreign),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_maximum_selectable_receivers() {
        let mut snapshot = fixtures::snapshot();
        snapshot.contexts[0].settings.maximum_selectable_receivers = 1;

        let req = request(&["r1", "r2"], json!({"f_question": "o1"}));
        assert!(matches!(
            validate_submission(&snapshot, &req),
            Err(AppError::Validation(_))
        ));

        // Repeated ids count once
        let req = request(&["r1", "r1"], json!({"f_question": "o1"}));
        assert_eq!(
            validate_submission(&snapshot, &req).unwrap().receivers,
            ["r1"]
        );
    }

    #[test]
    fn test_duplicate_receivers_keep_first_seen_order() {
        let snapshot = fixtures::snapshot();

        let req = request(&["r2", "r1", "r2", "r1"], json!({"f_question": "o1"}));
        assert_eq!(
            validate_submission(&snapshot, &req).unwrap().receivers,
            ["r2", "r1"]
        );
    }

    #[test]
    fn test_draft_submission_rejected() {
        let snapshot = fixtures::snapshot();

        let mut req = request(&["r1"], json!({"f_question": "o1"}));
        req.finalize = false;
        assert!(matches!(
            validate_submission(&snapshot, &req),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_required_answers() {
        let snapshot = fixtures::snapshot();

        for answers in [json!({}), json!({"f_question": ""}), json!({"f_question": []})] {
            let req = request(&["r1"], answers);
            assert!(matches!(
                validate_submission(&snapshot, &req),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_conditional_required_field_is_optional() {
        let mut snapshot = fixtures::snapshot();
        // f_group is only shown when option o2 is picked
        snapshot
            .fields
            .iter_mut()
            .filter(|f| f.id == "f_group")
            .for_each(|f| f.required = true);

        let req = request(&["r1"], json!({"f_question": "o1"}));
        assert!(validate_submission(&snapshot, &req).is_ok());
    }
}
