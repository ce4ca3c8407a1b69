//! Assembly of per-story answer rows.
//!
//! Sliders and participant questions are treated differently: every
//! configured slider gets a row (`skipped` when untouched) while only
//! answered participant questions get one. The asymmetry matches what the
//! platform has always stored and is kept until product decides otherwise.

use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::forms::{ParticipantQuestion, SliderQuestion};
use crate::storage::{ParticipantResponse, ResponseType, SliderResponse};

/// Slider positions are stored on a 0-100 scale.
pub const SLIDER_RANGE: (i64, i64) = (0, 100);

/// Clamp a slider position onto the stored scale.
pub fn clamp_slider(value: i64) -> i64 {
    value.clamp(SLIDER_RANGE.0, SLIDER_RANGE.1)
}

/// One row per configured slider question.
///
/// A question is `answered` iff its id is in `touched`; its value comes
/// from `values`, falling back to the slider's initial position, and is
/// clamped to the 0-100 scale. Skipped questions carry no value.
pub fn build_slider_responses(
    story_id: &str,
    questions: &[SliderQuestion],
    values: &HashMap<i64, i64>,
    touched: &HashSet<i64>,
) -> Vec<SliderResponse> {
    questions
        .iter()
        .map(|q| {
            let answered = touched.contains(&q.id);
            SliderResponse {
                id: Uuid::new_v4().to_string(),
                story_id: story_id.to_string(),
                question_id: q.id,
                question_text: q.question.clone(),
                value: answered
                    .then(|| clamp_slider(values.get(&q.id).copied().unwrap_or(q.slider_value))),
                response_type: if answered {
                    ResponseType::Answered
                } else {
                    ResponseType::Skipped
                },
                left_label: non_empty(&q.left_label),
                right_label: non_empty(&q.right_label),
            }
        })
        .collect()
}

/// One row per answered participant question; unanswered ones are omitted.
///
/// `answers` maps question id to chosen choice id. Disabled questions are
/// ignored. A choice id that matches no option is stored as given.
pub fn build_participant_responses(
    story_id: &str,
    questions: &[ParticipantQuestion],
    answers: &HashMap<i64, String>,
) -> Vec<ParticipantResponse> {
    questions
        .iter()
        .filter(|q| q.checked)
        .filter_map(|q| {
            let choice_id = answers.get(&q.id)?.trim();
            if choice_id.is_empty() {
                return None;
            }
            Some(ParticipantResponse {
                id: Uuid::new_v4().to_string(),
                story_id: story_id.to_string(),
                question_id: q.id,
                question_text: q.label.clone(),
                choice_id: choice_id.to_string(),
                response: q.choice_label(choice_id).unwrap_or(choice_id).to_string(),
            })
        })
        .collect()
}

/// Base64-encode a recording for the submission payload.
pub fn encode_audio(bytes: &[u8]) -> Result<String, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::new("audio", "Recording is empty"));
    }
    Ok(STANDARD.encode(bytes))
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
