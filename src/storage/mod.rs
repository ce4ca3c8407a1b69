//! Storage layer for projects, form configuration and collected stories.
//!
//! This module provides SQLite-based storage standing in for the hosted
//! database: projects, schema-less activity responses, public form
//! identifiers, stories with their slider and participant responses, and
//! user roles.

mod sqlite;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageResult;

/// A story-collection project owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    /// Unique project identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Owning user.
    pub user_id: String,
    /// Templates are visible to every user and editable only by super admins.
    pub is_template: bool,
    /// When the project was created.
    pub created_at: DateTime<Utc>,
    /// When the project was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Location of a value inside the activity-response store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivityCoordinates {
    pub phase_id: &'static str,
    pub step_id: &'static str,
    pub activity_id: &'static str,
}

/// A schema-less value keyed by project, phase, step and activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityResponse {
    /// Unique row identifier.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    pub phase_id: String,
    pub step_id: String,
    pub activity_id: String,
    /// Arbitrary JSON payload.
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public token mapping one-to-one to a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormIdentifier {
    pub project_id: String,
    pub form_id: String,
    pub created_at: DateTime<Utc>,
}

/// A collected narrative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Story {
    /// Unique story identifier.
    pub id: String,
    /// Project the story was collected for.
    pub project_id: String,
    /// Submitting user; `None` for anonymous public submissions.
    pub user_id: Option<String>,
    pub title: String,
    pub text: String,
    pub emotional_response: Option<String>,
    pub additional_comments: Option<String>,
    pub is_public: bool,
    pub is_imported: bool,
    /// Base64-encoded audio recording.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Whether a slider was moved by the participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// The participant set a value.
    Answered,
    /// The slider was shown but left untouched.
    #[default]
    Skipped,
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseType::Answered => write!(f, "answered"),
            ResponseType::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "answered" => Ok(ResponseType::Answered),
            "skipped" => Ok(ResponseType::Skipped),
            _ => Err(format!("Unknown response type: {}", s)),
        }
    }
}

/// A story's answer to one slider question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SliderResponse {
    pub id: String,
    pub story_id: String,
    pub question_id: i64,
    pub question_text: String,
    /// `None` when skipped.
    pub value: Option<i64>,
    pub response_type: ResponseType,
    pub left_label: Option<String>,
    pub right_label: Option<String>,
}

/// A story's answer to one participant question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantResponse {
    pub id: String,
    pub story_id: String,
    pub question_id: i64,
    pub question_text: String,
    pub choice_id: String,
    /// Label of the chosen option.
    pub response: String,
}

/// A story together with the response rows written alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryRecord {
    pub story: Story,
    pub slider_responses: Vec<SliderResponse>,
    pub participant_responses: Vec<ParticipantResponse>,
}

/// Account role; demo accounts have a per-project story limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Demo,
    Admin,
    SuperAdmin,
}

impl UserRole {
    /// Admins and super admins see live templates.
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SuperAdmin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Demo => write!(f, "demo"),
            UserRole::Admin => write!(f, "admin"),
            UserRole::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "demo" => Ok(UserRole::Demo),
            "admin" => Ok(UserRole::Admin),
            "super_admin" | "super-admin" => Ok(UserRole::SuperAdmin),
            _ => Err(format!("Unknown user role: {}", s)),
        }
    }
}

impl Project {
    /// Create a new project owned by `user_id`.
    pub fn new(name: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            user_id: user_id.into(),
            is_template: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the project as a template.
    pub fn as_template(mut self) -> Self {
        self.is_template = true;
        self
    }
}

impl ActivityResponse {
    /// Create a new activity response at the given coordinates.
    pub fn new(
        project_id: impl Into<String>,
        coordinates: ActivityCoordinates,
        response: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            phase_id: coordinates.phase_id.to_string(),
            step_id: coordinates.step_id.to_string(),
            activity_id: coordinates.activity_id.to_string(),
            response,
            created_at: now,
            updated_at: now,
        }
    }
}

impl FormIdentifier {
    /// Create a new mapping from `form_id` to `project_id`.
    pub fn new(project_id: impl Into<String>, form_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            form_id: form_id.into(),
            created_at: Utc::now(),
        }
    }
}

impl Story {
    /// Create a new story for a project.
    pub fn new(
        project_id: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            user_id: None,
            title: title.into(),
            text: text.into(),
            emotional_response: None,
            additional_comments: None,
            is_public: false,
            is_imported: false,
            audio: None,
            created_at: Utc::now(),
        }
    }

    /// Set the submitting user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the emotional response.
    pub fn with_emotional_response(mut self, emotion: impl Into<String>) -> Self {
        self.emotional_response = Some(emotion.into());
        self
    }

    /// Set additional comments.
    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.additional_comments = Some(comments.into());
        self
    }

    /// Mark the story as imported from CSV.
    pub fn as_imported(mut self) -> Self {
        self.is_imported = true;
        self
    }

    /// Mark the story as public.
    pub fn as_public(mut self) -> Self {
        self.is_public = true;
        self
    }
}

/// Storage trait for database operations.
///
/// Mirrors the tables of the hosted backend: `projects`,
/// `activity_responses`, `form_identifiers`, `stories`,
/// `slider_responses`, `participant_responses` and `user_roles`.
#[async_trait]
pub trait Storage: Send + Sync {
    // Project operations

    /// Create a new project.
    async fn create_project(&self, project: &Project) -> StorageResult<()>;
    /// Get a project by ID.
    async fn get_project(&self, id: &str) -> StorageResult<Option<Project>>;
    /// List projects owned by a user plus all templates.
    async fn list_projects(&self, user_id: &str) -> StorageResult<Vec<Project>>;
    /// Update an existing project.
    async fn update_project(&self, project: &Project) -> StorageResult<()>;
    /// Delete a project and everything that belongs to it.
    async fn delete_project(&self, id: &str) -> StorageResult<()>;

    // Activity response operations

    /// Get the activity response stored at the given coordinates.
    async fn get_activity_response(
        &self,
        project_id: &str,
        coordinates: &ActivityCoordinates,
    ) -> StorageResult<Option<ActivityResponse>>;
    /// Insert or overwrite the activity response at its coordinates.
    async fn upsert_activity_response(&self, response: &ActivityResponse) -> StorageResult<()>;

    // Form identifier operations

    /// Get the public identifier of a project.
    async fn get_form_identifier(&self, project_id: &str) -> StorageResult<Option<FormIdentifier>>;
    /// Resolve a public form ID to its project ID.
    async fn find_project_by_form_id(&self, form_id: &str) -> StorageResult<Option<String>>;
    /// Persist a new identifier.
    async fn create_form_identifier(&self, identifier: &FormIdentifier) -> StorageResult<()>;
    /// Delete a project's identifier, returning whether one existed.
    async fn delete_form_identifier(&self, project_id: &str) -> StorageResult<bool>;

    // Story operations

    /// Count stories collected for a project.
    async fn count_project_stories(&self, project_id: &str) -> StorageResult<i64>;
    /// Persist a story with all of its responses atomically.
    async fn create_story_submission(
        &self,
        story: &Story,
        slider_responses: &[SliderResponse],
        participant_responses: &[ParticipantResponse],
    ) -> StorageResult<()>;
    /// Persist several stories in one transaction; a failure writes none.
    async fn create_story_batch(&self, records: &[StoryRecord]) -> StorageResult<()>;
    /// Get a story by ID.
    async fn get_story(&self, id: &str) -> StorageResult<Option<Story>>;
    /// List a project's stories, oldest first.
    async fn list_project_stories(&self, project_id: &str) -> StorageResult<Vec<Story>>;
    /// Get slider responses for a story.
    async fn get_story_slider_responses(&self, story_id: &str)
        -> StorageResult<Vec<SliderResponse>>;
    /// Get participant responses for a story.
    async fn get_story_participant_responses(
        &self,
        story_id: &str,
    ) -> StorageResult<Vec<ParticipantResponse>>;
    /// Get slider responses for every story of a project.
    async fn get_project_slider_responses(
        &self,
        project_id: &str,
    ) -> StorageResult<Vec<SliderResponse>>;
    /// Get participant responses for every story of a project.
    async fn get_project_participant_responses(
        &self,
        project_id: &str,
    ) -> StorageResult<Vec<ParticipantResponse>>;
    /// Delete a story; its responses cascade.
    async fn delete_story(&self, id: &str) -> StorageResult<()>;

    // Role operations

    /// Get a user's role, if one was assigned.
    async fn get_user_role(&self, user_id: &str) -> StorageResult<Option<UserRole>>;
    /// Assign a role to a user.
    async fn set_user_role(&self, user_id: &str, role: UserRole) -> StorageResult<()>;
}
