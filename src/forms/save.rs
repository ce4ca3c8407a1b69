use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::questions::{
    is_valid_story_question, question_list_payload, story_question_payload, ParticipantQuestion,
    QuestionKind, SliderQuestion,
};
use crate::cache::ClientCache;
use crate::error::StorageResult;
use crate::storage::{ActivityResponse, SqliteStorage, Storage};

/// The complete question set of a story form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormConfig {
    pub story_question: String,
    #[serde(default)]
    pub slider_questions: Vec<SliderQuestion>,
    #[serde(default)]
    pub participant_questions: Vec<ParticipantQuestion>,
}

/// Writes form configuration and keeps the client cache consistent with it.
///
/// Each save overwrites the stored value wholesale.
#[derive(Clone)]
pub struct FormConfigService {
    storage: SqliteStorage,
    cache: ClientCache,
}

impl FormConfigService {
    pub fn new(storage: SqliteStorage, cache: ClientCache) -> Self {
        Self { storage, cache }
    }

    /// Save the story question.
    pub async fn save_story_question(&self, project_id: &str, question: &str) -> StorageResult<()> {
        if !is_valid_story_question(question) {
            warn!(project_id = %project_id, "Saving a story question that will not validate");
        }
        self.save(project_id, QuestionKind::Story, story_question_payload(question))
            .await
    }

    /// Save the slider questions.
    pub async fn save_slider_questions(
        &self,
        project_id: &str,
        questions: &[SliderQuestion],
    ) -> StorageResult<()> {
        self.save(project_id, QuestionKind::Slider, question_list_payload(questions))
            .await
    }

    /// Save the participant questions.
    pub async fn save_participant_questions(
        &self,
        project_id: &str,
        questions: &[ParticipantQuestion],
    ) -> StorageResult<()> {
        self.save(
            project_id,
            QuestionKind::Participant,
            question_list_payload(questions),
        )
        .await
    }

    /// Save all three question types.
    pub async fn save_all(&self, project_id: &str, config: &FormConfig) -> StorageResult<()> {
        self.save_story_question(project_id, &config.story_question)
            .await?;
        self.save_slider_questions(project_id, &config.slider_questions)
            .await?;
        self.save_participant_questions(project_id, &config.participant_questions)
            .await
    }

    async fn save(&self, project_id: &str, kind: QuestionKind, payload: Value) -> StorageResult<()> {
        let response = ActivityResponse::new(project_id, kind.coordinates(), payload);
        self.storage.upsert_activity_response(&response).await?;

        self.cache.invalidate_query(project_id, kind);
        self.cache.set_saved_flag(project_id, kind);

        info!(project_id = %project_id, kind = %kind, "Form configuration saved");
        Ok(())
    }
}
