//! Story submission: validation, answer assembly and persistence.

mod responses;

pub use responses::{
    build_participant_responses, build_slider_responses, clamp_slider, encode_audio, SLIDER_RANGE,
};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::error::{AppResult, StorageResult, ValidationError};
use crate::export::ImportedStory;
use crate::forms::FormData;
use crate::storage::{
    ParticipantResponse, ResponseType, SliderResponse, SqliteStorage, Storage, Story, StoryRecord,
    UserRole,
};
use uuid::Uuid;

/// Emotional-response value that means "see the free-text field".
pub const OTHER_EMOTION: &str = "other";

/// A recorded audio answer.
#[derive(Debug, Clone, Default)]
pub struct AudioRecording {
    pub bytes: Vec<u8>,
    /// Recording was stopped normally rather than abandoned.
    pub complete: bool,
}

impl AudioRecording {
    pub fn complete(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            complete: true,
        }
    }
}

/// Everything a participant entered on the story form.
#[derive(Debug, Clone, Default)]
pub struct StorySubmission {
    pub project_id: String,
    /// `None` for anonymous public submissions.
    pub user_id: Option<String>,
    pub title: String,
    pub text: String,
    pub emotional_response: Option<String>,
    /// Free text used when the emotional response is "other".
    pub other_emotion: Option<String>,
    pub additional_comments: Option<String>,
    pub is_public: bool,
    /// Slider positions by question id.
    pub slider_values: HashMap<i64, i64>,
    /// Slider question ids the participant actually moved.
    pub touched_sliders: HashSet<i64>,
    /// Chosen choice id by participant question id.
    pub participant_answers: HashMap<i64, String>,
    pub audio: Option<AudioRecording>,
}

impl StorySubmission {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    /// Set title and text.
    pub fn with_story(mut self, title: impl Into<String>, text: impl Into<String>) -> Self {
        self.title = title.into();
        self.text = text.into();
        self
    }

    /// Set the submitting user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the emotional response.
    pub fn with_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotional_response = Some(emotion.into());
        self
    }

    /// Record a slider the participant moved.
    pub fn with_slider(mut self, question_id: i64, value: i64) -> Self {
        self.slider_values.insert(question_id, clamp_slider(value));
        self.touched_sliders.insert(question_id);
        self
    }

    /// Record a participant-question answer.
    pub fn with_answer(mut self, question_id: i64, choice_id: impl Into<String>) -> Self {
        self.participant_answers.insert(question_id, choice_id.into());
        self
    }

    /// Attach an audio recording.
    pub fn with_audio(mut self, audio: AudioRecording) -> Self {
        self.audio = Some(audio);
        self
    }

    /// The emotional response to store, resolving "other" to its free text.
    pub fn resolved_emotion(&self) -> Option<String> {
        let other = self
            .other_emotion
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match self.emotional_response.as_deref().map(str::trim) {
            Some(e) if e.eq_ignore_ascii_case(OTHER_EMOTION) => other.map(str::to_string),
            Some(e) if !e.is_empty() => Some(e.to_string()),
            _ => other.map(str::to_string),
        }
    }

    fn has_complete_audio(&self) -> bool {
        self.audio
            .as_ref()
            .map(|a| a.complete && !a.bytes.is_empty())
            .unwrap_or(false)
    }
}

/// Client-side checks before a submission is accepted.
///
/// Requires story text or a completed recording, a title and an emotional
/// response.
pub fn validate(submission: &StorySubmission) -> Result<(), ValidationError> {
    if submission.text.trim().is_empty() && !submission.has_complete_audio() {
        return Err(ValidationError::new(
            "text",
            "Please write your story or record it",
        ));
    }
    if submission.title.trim().is_empty() {
        return Err(ValidationError::new("title", "Please give your story a title"));
    }
    if submission.resolved_emotion().is_none() {
        return Err(ValidationError::new(
            "emotional_response",
            "Please tell us how the story makes you feel",
        ));
    }
    Ok(())
}

/// Result of a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SubmissionOutcome {
    /// Story and responses were written.
    Saved { story_id: String },
    /// A demo account hit the per-project story limit; nothing was written.
    DemoLimitReached,
}

/// Validates and persists story submissions.
#[derive(Clone)]
pub struct SubmissionHandler {
    storage: SqliteStorage,
    demo_story_limit: i64,
}

impl SubmissionHandler {
    pub fn new(storage: SqliteStorage, demo_story_limit: i64) -> Self {
        Self {
            storage,
            demo_story_limit,
        }
    }

    /// Validate and save one story against the given form configuration.
    ///
    /// The story row and all response rows are written in one transaction.
    pub async fn save_story(
        &self,
        submission: &StorySubmission,
        form: &FormData,
    ) -> AppResult<SubmissionOutcome> {
        validate(submission)?;

        if self.demo_limit_reached(submission).await? {
            info!(
                project_id = %submission.project_id,
                limit = self.demo_story_limit,
                "Demo story limit reached, submission refused"
            );
            return Ok(SubmissionOutcome::DemoLimitReached);
        }

        let mut story = Story::new(
            &submission.project_id,
            submission.title.trim(),
            submission.text.trim(),
        );
        story.user_id = submission.user_id.clone();
        story.emotional_response = submission.resolved_emotion();
        story.additional_comments = submission
            .additional_comments
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        story.is_public = submission.is_public;
        story.audio = submission.audio.as_ref().and_then(|audio| {
            if !audio.complete {
                warn!(
                    project_id = %submission.project_id,
                    bytes = audio.bytes.len(),
                    "Recording was abandoned, saving story without audio"
                );
                return None;
            }
            encode_audio(&audio.bytes)
                .map_err(|e| warn!(error = %e, "Audio not attached to submission"))
                .ok()
        });

        let sliders = build_slider_responses(
            &story.id,
            form.sliders(),
            &submission.slider_values,
            &submission.touched_sliders,
        );
        let participants = build_participant_responses(
            &story.id,
            form.participants(),
            &submission.participant_answers,
        );

        self.storage
            .create_story_submission(&story, &sliders, &participants)
            .await?;

        info!(
            project_id = %story.project_id,
            story_id = %story.id,
            sliders = sliders.len(),
            participants = participants.len(),
            has_audio = story.audio.is_some(),
            "Story submitted"
        );

        Ok(SubmissionOutcome::Saved { story_id: story.id })
    }

    /// Persist stories read from CSV, marked as imported.
    ///
    /// Slider and participant columns are matched to the project's current
    /// questions by their text; unmatched columns get positional ids. The
    /// whole file is written in one transaction, so a failure imports nothing.
    pub async fn import_stories(
        &self,
        project_id: &str,
        stories: &[ImportedStory],
        form: &FormData,
    ) -> StorageResult<usize> {
        let records: Vec<StoryRecord> = stories
            .iter()
            .map(|imported| imported_record(project_id, imported, form))
            .collect();

        self.storage.create_story_batch(&records).await?;

        info!(project_id = %project_id, count = records.len(), "Stories imported");
        Ok(records.len())
    }

    /// Delete a story together with its responses.
    pub async fn delete_story(&self, story_id: &str) -> StorageResult<()> {
        self.storage.delete_story(story_id).await?;
        info!(story_id = %story_id, "Story deleted");
        Ok(())
    }

    async fn demo_limit_reached(&self, submission: &StorySubmission) -> StorageResult<bool> {
        let Some(user_id) = submission.user_id.as_deref() else {
            return Ok(false);
        };

        let role = self.storage.get_user_role(user_id).await?.unwrap_or_default();
        if role != UserRole::Demo {
            return Ok(false);
        }

        let count = self
            .storage
            .count_project_stories(&submission.project_id)
            .await?;
        debug!(user_id = %user_id, count, "Checked demo story count");
        Ok(count >= self.demo_story_limit)
    }
}

/// Build the rows for one imported story.
fn imported_record(project_id: &str, imported: &ImportedStory, form: &FormData) -> StoryRecord {
    let mut story = Story::new(project_id, &imported.title, &imported.text).as_imported();
    story.emotional_response = imported.emotional_response.clone();
    story.additional_comments = imported.additional_comments.clone();

    let slider_responses = imported
        .sliders
        .iter()
        .enumerate()
        .map(|(i, slider)| {
            let question_id = form
                .sliders()
                .iter()
                .find(|q| q.question == slider.question)
                .map(|q| q.id)
                .unwrap_or(i as i64 + 1);
            let value = slider.value.map(clamp_slider);
            SliderResponse {
                id: Uuid::new_v4().to_string(),
                story_id: story.id.clone(),
                question_id,
                question_text: slider.question.clone(),
                value,
                response_type: if value.is_some() {
                    ResponseType::Answered
                } else {
                    ResponseType::Skipped
                },
                left_label: slider.left_label.clone(),
                right_label: slider.right_label.clone(),
            }
        })
        .collect();

    let participant_responses = imported
        .participant_answers
        .iter()
        .enumerate()
        .map(|(i, (label, answer))| {
            let question = form.participants().iter().find(|q| &q.label == label);
            let choice_id = question
                .and_then(|q| q.choices.iter().find(|c| &c.label == answer))
                .map(|c| c.id.clone())
                .unwrap_or_else(|| answer.clone());
            ParticipantResponse {
                id: Uuid::new_v4().to_string(),
                story_id: story.id.clone(),
                question_id: question.map(|q| q.id).unwrap_or(i as i64 + 1),
                question_text: label.clone(),
                choice_id,
                response: answer.clone(),
            }
        })
        .collect();

    StoryRecord {
        story,
        slider_responses,
        participant_responses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> StorySubmission {
        StorySubmission::new("p1")
            .with_story("A title", "Something happened")
            .with_emotion("happy")
    }

    #[test]
    fn test_valid_submission() {
        assert!(validate(&valid()).is_ok());
    }

    #[test]
    fn test_requires_text_or_audio() {
        let mut submission = valid();
        submission.text = "  ".to_string();
        assert_eq!(validate(&submission).unwrap_err().field, "text");

        let submission = submission.with_audio(AudioRecording::complete(vec![1, 2, 3]));
        assert!(validate(&submission).is_ok());
    }

    #[test]
    fn test_incomplete_audio_does_not_count() {
        let mut submission = valid();
        submission.text.clear();
        submission.audio = Some(AudioRecording {
            bytes: vec![1, 2, 3],
            complete: false,
        });
        assert_eq!(validate(&submission).unwrap_err().field, "text");
    }

    #[test]
    fn test_requires_title() {
        let mut submission = valid();
        submission.title = String::new();
        assert_eq!(validate(&submission).unwrap_err().field, "title");
    }

    #[test]
    fn test_requires_emotion() {
        let mut submission = valid();
        submission.emotional_response = None;
        assert_eq!(
            validate(&submission).unwrap_err().field,
            "emotional_response"
        );
    }

    #[test]
    fn test_other_emotion_needs_free_text() {
        let mut submission = valid().with_emotion("other");
        assert!(validate(&submission).is_err());

        submission.other_emotion = Some("bittersweet".to_string());
        assert!(validate(&submission).is_ok());
        assert_eq!(submission.resolved_emotion().as_deref(), Some("bittersweet"));
    }

    #[test]
    fn test_with_slider_clamps_and_touches() {
        let submission = valid().with_slider(4, 140);
        assert_eq!(submission.slider_values[&4], 100);
        assert!(submission.touched_sliders.contains(&4));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(SubmissionOutcome::DemoLimitReached).unwrap();
        assert_eq!(json["status"], "demo-limit-reached");
    }
}
