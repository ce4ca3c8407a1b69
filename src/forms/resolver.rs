//! Resolution of the current story-form configuration for a project.
//!
//! A single [`FormDataResolver`] backs both the authenticated form editor
//! and the public submission form. How the three question types are
//! fetched is delegated to a [`FetchStrategy`]:
//!
//! - [`LegacyFetch`]: one independent fetch per question type; a failure
//!   only affects its own field.
//! - [`UnifiedFetch`]: all three fetched concurrently; any failure fails the
//!   whole load.
//!
//! Both strategies share the same cache conventions (see [`crate::cache`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::identifier::FormIdentifierService;
use super::questions::{
    classify_question_list, classify_story_question, ParticipantQuestion, QuestionKind,
    QuestionState, SliderQuestion,
};
use crate::cache::ClientCache;
use crate::config::LoaderStrategy;
use crate::error::{StorageError, StorageResult};
use crate::projects::Actor;
use crate::storage::{SqliteStorage, Storage, UserRole};

/// Result of fetching one question type: the raw payload (`None` when no
/// row exists) or an error message.
pub type FieldResult = Result<Option<Value>, String>;

/// Raw payloads for the three question types.
#[derive(Debug, Clone)]
pub struct RawFormData {
    pub story: FieldResult,
    pub sliders: FieldResult,
    pub participants: FieldResult,
}

/// Resolved form configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormData {
    pub project_id: Option<String>,
    pub story_question: QuestionState<String>,
    pub slider_questions: QuestionState<Vec<SliderQuestion>>,
    pub participant_questions: QuestionState<Vec<ParticipantQuestion>>,
    pub is_loading: bool,
    /// User-facing error, only reported for forced refreshes and unknown forms.
    pub error: Option<String>,
}

impl FormData {
    /// Empty state for a project.
    pub fn empty(project_id: Option<String>) -> Self {
        Self {
            project_id,
            story_question: QuestionState::Unconfigured,
            slider_questions: QuestionState::Unconfigured,
            participant_questions: QuestionState::Unconfigured,
            is_loading: false,
            error: None,
        }
    }

    /// Configured slider questions, or none.
    pub fn sliders(&self) -> &[SliderQuestion] {
        self.slider_questions
            .configured()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Configured participant questions, or none.
    pub fn participants(&self) -> &[ParticipantQuestion] {
        self.participant_questions
            .configured()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// How question payloads are fetched from storage.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Fetch all three payloads for a project.
    async fn fetch(&self, storage: &dyn Storage, cache: &ClientCache, project_id: &str)
        -> RawFormData;
}

/// One fetch per question type.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyFetch;

/// All question types fetched concurrently.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnifiedFetch;

#[async_trait]
impl FetchStrategy for LegacyFetch {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn fetch(
        &self,
        storage: &dyn Storage,
        cache: &ClientCache,
        project_id: &str,
    ) -> RawFormData {
        let story = fetch_field(storage, cache, project_id, QuestionKind::Story).await;
        let sliders = fetch_field(storage, cache, project_id, QuestionKind::Slider).await;
        let participants = fetch_field(storage, cache, project_id, QuestionKind::Participant).await;

        RawFormData {
            story,
            sliders,
            participants,
        }
    }
}

#[async_trait]
impl FetchStrategy for UnifiedFetch {
    fn name(&self) -> &'static str {
        "unified"
    }

    async fn fetch(
        &self,
        storage: &dyn Storage,
        cache: &ClientCache,
        project_id: &str,
    ) -> RawFormData {
        let (story, sliders, participants) = tokio::join!(
            fetch_field(storage, cache, project_id, QuestionKind::Story),
            fetch_field(storage, cache, project_id, QuestionKind::Slider),
            fetch_field(storage, cache, project_id, QuestionKind::Participant),
        );

        RawFormData {
            story,
            sliders,
            participants,
        }
        .fail_together()
    }
}

impl RawFormData {
    /// Propagate the first failure to every field.
    fn fail_together(self) -> Self {
        let failure = [&self.story, &self.sliders, &self.participants]
            .into_iter()
            .find_map(|r| r.as_ref().err().cloned());

        match failure {
            Some(message) => RawFormData {
                story: Err(message.clone()),
                sliders: Err(message.clone()),
                participants: Err(message),
            },
            None => self,
        }
    }
}

/// Strategy object for a configured loader.
pub fn strategy_for(loader: LoaderStrategy) -> Box<dyn FetchStrategy> {
    match loader {
        LoaderStrategy::Legacy => Box::new(LegacyFetch),
        LoaderStrategy::Unified => Box::new(UnifiedFetch),
    }
}

/// Session cache entry for one question type.
///
/// `found` records whether a row existed, since a stored payload may itself
/// be JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedField {
    pub found: bool,
    #[serde(default)]
    pub payload: Value,
}

impl CachedField {
    fn from_payload(payload: Option<Value>) -> Self {
        match payload {
            Some(payload) => Self {
                found: true,
                payload,
            },
            None => Self {
                found: false,
                payload: Value::Null,
            },
        }
    }

    fn into_payload(self) -> Option<Value> {
        self.found.then_some(self.payload)
    }
}

/// Fetch one payload, consulting and filling the session query cache.
///
/// A stored row sets the project's "ever saved" flag for that kind.
async fn fetch_field(
    storage: &dyn Storage,
    cache: &ClientCache,
    project_id: &str,
    kind: QuestionKind,
) -> FieldResult {
    if let Some(cached) = cache.get_query::<CachedField>(project_id, kind) {
        if cached.found {
            cache.set_saved_flag(project_id, kind);
        }
        return Ok(cached.into_payload());
    }

    let row = storage
        .get_activity_response(project_id, &kind.coordinates())
        .await
        .map_err(|e| e.to_string())?;

    let entry = CachedField::from_payload(row.map(|r| r.response));
    if entry.found {
        cache.set_saved_flag(project_id, kind);
    }
    cache.put_query(project_id, kind, &entry);

    debug!(project_id = %project_id, kind = %kind, found = entry.found, "Fetched form field");
    Ok(entry.into_payload())
}

/// Resets the re-entrancy flag when a load finishes.
struct FetchGuard<'a>(&'a AtomicBool);

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Resolves the current story question, slider questions and participant
/// questions of a project.
pub struct FormDataResolver {
    storage: SqliteStorage,
    cache: ClientCache,
    identifiers: FormIdentifierService,
    strategy: Box<dyn FetchStrategy>,
    is_fetching: AtomicBool,
    last: Mutex<FormData>,
}

impl FormDataResolver {
    /// Create a resolver using the given loader strategy.
    pub fn new(storage: SqliteStorage, cache: ClientCache, loader: LoaderStrategy) -> Self {
        Self {
            identifiers: FormIdentifierService::new(storage.clone()),
            storage,
            cache,
            strategy: strategy_for(loader),
            is_fetching: AtomicBool::new(false),
            last: Mutex::new(FormData::empty(None)),
        }
    }

    /// Swap the fetch strategy. Only super admins may flip the loader.
    pub fn set_strategy(&mut self, actor: &Actor, loader: LoaderStrategy) -> StorageResult<()> {
        if actor.role != UserRole::SuperAdmin {
            warn!(user_id = %actor.user_id, role = %actor.role, "Loader switch refused");
            return Err(StorageError::PermissionDenied {
                message: "only super admins may switch the form loader".to_string(),
            });
        }
        info!(user_id = %actor.user_id, loader = ?loader, "Switching form loader");
        self.strategy = strategy_for(loader);
        Ok(())
    }

    /// Name of the active strategy.
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// The cache this resolver reads and writes.
    pub fn cache(&self) -> &ClientCache {
        &self.cache
    }

    /// Load the form configuration of a project.
    ///
    /// With `force_refresh`, every cache key of the project is dropped
    /// first and fetch failures are reported in [`FormData::error`].
    /// Otherwise failures are logged and resolve to no data.
    pub async fn load(&self, project_id: &str, force_refresh: bool) -> FormData {
        if self.is_fetching.swap(true, Ordering::AcqRel) {
            debug!(project_id = %project_id, "Load already in flight");
            let mut state = self.last_state();
            state.is_loading = true;
            return state;
        }
        let _guard = FetchGuard(&self.is_fetching);

        self.reset_on_project_change(project_id);

        if force_refresh {
            let removed = self.cache.invalidate_project(project_id);
            info!(project_id = %project_id, removed, "Forced form refresh");
        }

        let raw = self
            .strategy
            .fetch(&self.storage, &self.cache, project_id)
            .await;

        let data = self.resolve(project_id, raw, force_refresh);
        self.store_state(&data);
        data
    }

    /// Load the form configuration behind a public form id.
    pub async fn load_by_form_id(&self, form_id: &str, force_refresh: bool) -> FormData {
        match self.identifiers.resolve_project(form_id).await {
            Some(project_id) => self.load(&project_id, force_refresh).await,
            None => {
                warn!(form_id = %form_id, "Unknown form id");
                let mut data = FormData::empty(None);
                data.error = Some("Form not found".to_string());
                data
            }
        }
    }

    /// Drop state and saved flags left over from a different project.
    fn reset_on_project_change(&self, project_id: &str) {
        let previous = self.cache.last_project();
        if previous.as_deref() == Some(project_id) {
            return;
        }

        if let Some(previous) = previous {
            info!(from = %previous, to = %project_id, "Project changed, resetting form state");
            self.cache.clear_saved_flags(&previous);
        }
        self.store_state(&FormData::empty(Some(project_id.to_string())));
        self.cache.set_last_project(project_id);
    }

    fn resolve(&self, project_id: &str, raw: RawFormData, force_refresh: bool) -> FormData {
        let mut errors = Vec::new();

        let story = self.payload(project_id, QuestionKind::Story, raw.story, &mut errors);
        let sliders = self.payload(project_id, QuestionKind::Slider, raw.sliders, &mut errors);
        let participants =
            self.payload(project_id, QuestionKind::Participant, raw.participants, &mut errors);

        let story_question = match story {
            Some(payload) => classify_story_question(
                payload.as_ref(),
                self.cache.saved_flag(project_id, QuestionKind::Story),
            ),
            None => QuestionState::Unconfigured,
        };
        let slider_questions = match sliders {
            Some(payload) => classify_question_list(
                payload.as_ref(),
                self.cache.saved_flag(project_id, QuestionKind::Slider),
            ),
            None => QuestionState::Unconfigured,
        };
        let participant_questions = match participants {
            Some(payload) => classify_question_list(
                payload.as_ref(),
                self.cache.saved_flag(project_id, QuestionKind::Participant),
            ),
            None => QuestionState::Unconfigured,
        };

        let error = if force_refresh && !errors.is_empty() {
            errors.dedup();
            Some(format!("Failed to refresh form data: {}", errors.join("; ")))
        } else {
            None
        };

        FormData {
            project_id: Some(project_id.to_string()),
            story_question,
            slider_questions,
            participant_questions,
            is_loading: false,
            error,
        }
    }

    /// Unwrap a field result, logging failures. `None` means the fetch failed.
    fn payload(
        &self,
        project_id: &str,
        kind: QuestionKind,
        result: FieldResult,
        errors: &mut Vec<String>,
    ) -> Option<Option<Value>> {
        match result {
            Ok(payload) => Some(payload),
            Err(e) => {
                error!(
                    project_id = %project_id,
                    kind = %kind,
                    strategy = self.strategy.name(),
                    error = %e,
                    "Failed to fetch form field"
                );
                errors.push(e);
                None
            }
        }
    }

    fn last_state(&self) -> FormData {
        self.last
            .lock()
            .map(|state| state.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    fn store_state(&self, data: &FormData) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        *last = data.clone();
    }
}
