//! Question types of the story form and their configuration state.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::storage::ActivityCoordinates;

/// Phase that holds all story-collection configuration.
pub const COLLECTION_PHASE: &str = "collection";

/// A story question must be longer than this many characters once trimmed.
pub const MIN_STORY_QUESTION_CHARS: usize = 3;

/// The three kinds of configurable questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionKind {
    Story,
    Slider,
    Participant,
}

impl QuestionKind {
    /// Every question kind, in form order.
    pub const ALL: [QuestionKind; 3] = [
        QuestionKind::Story,
        QuestionKind::Slider,
        QuestionKind::Participant,
    ];

    /// Stable name used for step ids and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Story => "story-question",
            QuestionKind::Slider => "slider-questions",
            QuestionKind::Participant => "participant-questions",
        }
    }

    /// Where this kind lives in the activity-response store.
    pub fn coordinates(&self) -> ActivityCoordinates {
        ActivityCoordinates {
            phase_id: COLLECTION_PHASE,
            step_id: self.as_str(),
            activity_id: self.as_str(),
        }
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bipolar-scale question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SliderQuestion {
    pub id: i64,
    #[serde(default)]
    pub theme: String,
    pub question: String,
    #[serde(default)]
    pub left_label: String,
    #[serde(default)]
    pub right_label: String,
    /// Initial position shown to participants (0-100).
    #[serde(default = "default_slider_value")]
    pub slider_value: i64,
}

fn default_slider_value() -> i64 {
    50
}

impl SliderQuestion {
    /// Create a slider question centred at 50.
    pub fn new(
        id: i64,
        question: impl Into<String>,
        left_label: impl Into<String>,
        right_label: impl Into<String>,
    ) -> Self {
        Self {
            id,
            theme: String::new(),
            question: question.into(),
            left_label: left_label.into(),
            right_label: right_label.into(),
            slider_value: default_slider_value(),
        }
    }

    /// Set the theme.
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }
}

/// One option of a participant question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantChoice {
    pub id: String,
    pub label: String,
}

impl ParticipantChoice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// A multiple-choice demographic question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantQuestion {
    pub id: i64,
    pub label: String,
    /// Whether the question is enabled on the form.
    #[serde(default = "default_checked")]
    pub checked: bool,
    #[serde(default)]
    pub choices: Vec<ParticipantChoice>,
}

fn default_checked() -> bool {
    true
}

impl ParticipantQuestion {
    pub fn new(id: i64, label: impl Into<String>, choices: Vec<ParticipantChoice>) -> Self {
        Self {
            id,
            label: label.into(),
            checked: true,
            choices,
        }
    }

    /// Label of the choice with the given id.
    pub fn choice_label(&self, choice_id: &str) -> Option<&str> {
        self.choices
            .iter()
            .find(|c| c.id == choice_id)
            .map(|c| c.label.as_str())
    }
}

/// Configuration state of one question type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum QuestionState<T> {
    /// Never saved for this project.
    Unconfigured,
    /// Saved and usable.
    Configured(T),
    /// Saved, but the stored value is missing or unusable.
    Invalid(String),
}

impl<T> QuestionState<T> {
    pub fn is_configured(&self) -> bool {
        matches!(self, QuestionState::Configured(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, QuestionState::Invalid(_))
    }

    /// The configured value, if any.
    pub fn configured(&self) -> Option<&T> {
        match self {
            QuestionState::Configured(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> Default for QuestionState<T> {
    fn default() -> Self {
        QuestionState::Unconfigured
    }
}

/// Whether a story question is usable on the form.
pub fn is_valid_story_question(question: &str) -> bool {
    question.trim().chars().count() > MIN_STORY_QUESTION_CHARS
}

/// Activity-response payload for a story question.
pub fn story_question_payload(question: &str) -> Value {
    json!({ "question": question })
}

/// Activity-response payload for a question list.
pub fn question_list_payload<T: Serialize>(questions: &[T]) -> Value {
    json!({ "questions": questions })
}

/// Classify a stored story-question payload.
///
/// `saved` is the "ever saved" flag for the project; `payload` is the raw
/// activity response (`None` when no row exists). Accepts both
/// `{"question": "..."}` and a bare string.
pub fn classify_story_question(payload: Option<&Value>, saved: bool) -> QuestionState<String> {
    let question = payload.and_then(|value| match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("question").and_then(Value::as_str),
        _ => None,
    });

    match question {
        Some(q) if is_valid_story_question(q) => QuestionState::Configured(q.to_string()),
        Some(_) if saved => {
            QuestionState::Invalid("Story question is too short or empty".to_string())
        }
        None if saved => QuestionState::Invalid("Story question is missing".to_string()),
        _ => QuestionState::Unconfigured,
    }
}

/// Classify a stored question-list payload.
///
/// Accepts `{"questions": [...]}` and a bare array. An empty list that was
/// saved is `Configured(vec![])`, distinct from never configured.
pub fn classify_question_list<T>(payload: Option<&Value>, saved: bool) -> QuestionState<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let list = match payload {
        Some(Value::Array(_)) => payload.cloned(),
        Some(Value::Object(map)) => map.get("questions").cloned(),
        Some(Value::Null) | None => None,
        Some(_) => return QuestionState::Invalid("Unexpected question payload".to_string()),
    };

    match list {
        Some(value) => match serde_json::from_value::<Vec<T>>(value) {
            Ok(questions) => QuestionState::Configured(questions),
            Err(e) => QuestionState::Invalid(format!("Malformed questions: {}", e)),
        },
        None if saved => QuestionState::Invalid("Questions are missing".to_string()),
        None => QuestionState::Unconfigured,
    }
}
