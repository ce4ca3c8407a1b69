use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{
    ActivityCoordinates, ActivityResponse, FormIdentifier, ParticipantResponse, Project,
    ResponseType, SliderResponse, Storage, Story, StoryRecord, UserRole,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory database (used by tests and dry runs).
    ///
    /// A single connection that never expires keeps the database alive for
    /// the lifetime of the pool.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_project(&self, project: &Project) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, description, user_id, is_template, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.user_id)
        .bind(project.is_template)
        .bind(project.created_at.to_rfc3339())
        .bind(project.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_project(&self, id: &str) -> StorageResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, user_id, is_template, created_at, updated_at
            FROM projects
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_projects(&self, user_id: &str) -> StorageResult<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, user_id, is_template, created_at, updated_at
            FROM projects
            WHERE user_id = ? OR is_template = 1
            ORDER BY is_template DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update_project(&self, project: &Project) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET name = ?, description = ?, is_template = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.is_template)
        .bind(project.updated_at.to_rfc3339())
        .bind(&project.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "Project",
                id: project.id.clone(),
            });
        }

        Ok(())
    }

    async fn delete_project(&self, id: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_activity_response(
        &self,
        project_id: &str,
        coordinates: &ActivityCoordinates,
    ) -> StorageResult<Option<ActivityResponse>> {
        let row: Option<ActivityResponseRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, phase_id, step_id, activity_id, response, created_at, updated_at
            FROM activity_responses
            WHERE project_id = ? AND phase_id = ? AND step_id = ? AND activity_id = ?
            "#,
        )
        .bind(project_id)
        .bind(coordinates.phase_id)
        .bind(coordinates.step_id)
        .bind(coordinates.activity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn upsert_activity_response(&self, response: &ActivityResponse) -> StorageResult<()> {
        let payload = serde_json::to_string(&response.response).map_err(|e| StorageError::Query {
            message: format!("Failed to serialize activity response: {}", e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO activity_responses (id, project_id, phase_id, step_id, activity_id, response, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id, phase_id, step_id, activity_id)
            DO UPDATE SET response = excluded.response, updated_at = excluded.updated_at
            "#,
        )
        .bind(&response.id)
        .bind(&response.project_id)
        .bind(&response.phase_id)
        .bind(&response.step_id)
        .bind(&response.activity_id)
        .bind(&payload)
        .bind(response.created_at.to_rfc3339())
        .bind(response.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_form_identifier(&self, project_id: &str) -> StorageResult<Option<FormIdentifier>> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT project_id, form_id, created_at FROM form_identifiers WHERE project_id = ?",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(project_id, form_id, created_at)| FormIdentifier {
            project_id,
            form_id,
            created_at: parse_timestamp(&created_at),
        }))
    }

    async fn find_project_by_form_id(&self, form_id: &str) -> StorageResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT project_id FROM form_identifiers WHERE form_id = ?")
                .bind(form_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(project_id,)| project_id))
    }

    async fn create_form_identifier(&self, identifier: &FormIdentifier) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO form_identifiers (project_id, form_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(&identifier.project_id)
        .bind(&identifier.form_id)
        .bind(identifier.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_form_identifier(&self, project_id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM form_identifiers WHERE project_id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_project_stories(&self, project_id: &str) -> StorageResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stories WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn create_story_submission(
        &self,
        story: &Story,
        slider_responses: &[SliderResponse],
        participant_responses: &[ParticipantResponse],
    ) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_submission(&mut tx, story, slider_responses, participant_responses).await?;
        tx.commit().await?;

        debug!(
            story_id = %story.id,
            sliders = slider_responses.len(),
            participants = participant_responses.len(),
            "Story submission committed"
        );
        Ok(())
    }

    async fn create_story_batch(&self, records: &[StoryRecord]) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            insert_submission(
                &mut tx,
                &record.story,
                &record.slider_responses,
                &record.participant_responses,
            )
            .await?;
        }
        tx.commit().await?;

        debug!(stories = records.len(), "Story batch committed");
        Ok(())
    }

    async fn get_story(&self, id: &str) -> StorageResult<Option<Story>> {
        let row: Option<StoryRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, user_id, title, text, emotional_response, additional_comments,
                   is_public, is_imported, audio, created_at
            FROM stories
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_project_stories(&self, project_id: &str) -> StorageResult<Vec<Story>> {
        let rows: Vec<StoryRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, user_id, title, text, emotional_response, additional_comments,
                   is_public, is_imported, audio, created_at
            FROM stories
            WHERE project_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_story_slider_responses(
        &self,
        story_id: &str,
    ) -> StorageResult<Vec<SliderResponse>> {
        let rows: Vec<SliderResponseRow> = sqlx::query_as(
            r#"
            SELECT id, story_id, question_id, question_text, value, response_type, left_label, right_label
            FROM slider_responses
            WHERE story_id = ?
            ORDER BY rowid ASC
            "#,
        )
        .bind(story_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_story_participant_responses(
        &self,
        story_id: &str,
    ) -> StorageResult<Vec<ParticipantResponse>> {
        let rows: Vec<ParticipantResponseRow> = sqlx::query_as(
            r#"
            SELECT id, story_id, question_id, question_text, choice_id, response
            FROM participant_responses
            WHERE story_id = ?
            ORDER BY rowid ASC
            "#,
        )
        .bind(story_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_project_slider_responses(
        &self,
        project_id: &str,
    ) -> StorageResult<Vec<SliderResponse>> {
        let rows: Vec<SliderResponseRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.story_id, r.question_id, r.question_text, r.value, r.response_type,
                   r.left_label, r.right_label
            FROM slider_responses r
            JOIN stories s ON s.id = r.story_id
            WHERE s.project_id = ?
            ORDER BY r.rowid ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_project_participant_responses(
        &self,
        project_id: &str,
    ) -> StorageResult<Vec<ParticipantResponse>> {
        let rows: Vec<ParticipantResponseRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.story_id, r.question_id, r.question_text, r.choice_id, r.response
            FROM participant_responses r
            JOIN stories s ON s.id = r.story_id
            WHERE s.project_id = ?
            ORDER BY r.rowid ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn delete_story(&self, id: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM stories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_user_role(&self, user_id: &str) -> StorageResult<Option<UserRole>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT role FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((role,)) => role
                .parse()
                .map(Some)
                .map_err(|message| StorageError::Query { message }),
            None => Ok(None),
        }
    }

    async fn set_user_role(&self, user_id: &str, role: UserRole) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role) VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET role = excluded.role
            "#,
        )
        .bind(user_id)
        .bind(role.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// Internal row types for SQLx mapping
/// Insert a story and its response rows on an open connection.
async fn insert_submission(
    conn: &mut SqliteConnection,
    story: &Story,
    slider_responses: &[SliderResponse],
    participant_responses: &[ParticipantResponse],
) -> StorageResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stories (id, project_id, user_id, title, text, emotional_response, additional_comments, is_public, is_imported, audio, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&story.id)
    .bind(&story.project_id)
    .bind(&story.user_id)
    .bind(&story.title)
    .bind(&story.text)
    .bind(&story.emotional_response)
    .bind(&story.additional_comments)
    .bind(story.is_public)
    .bind(story.is_imported)
    .bind(&story.audio)
    .bind(story.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    for response in slider_responses {
        sqlx::query(
            r#"
            INSERT INTO slider_responses (id, story_id, question_id, question_text, value, response_type, left_label, right_label)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&response.id)
        .bind(&response.story_id)
        .bind(response.question_id)
        .bind(&response.question_text)
        .bind(response.value)
        .bind(response.response_type.to_string())
        .bind(&response.left_label)
        .bind(&response.right_label)
        .execute(&mut *conn)
        .await?;
    }

    for response in participant_responses {
        sqlx::query(
            r#"
            INSERT INTO participant_responses (id, story_id, question_id, question_text, choice_id, response)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&response.id)
        .bind(&response.story_id)
        .bind(response.question_id)
        .bind(&response.question_text)
        .bind(&response.choice_id)
        .bind(&response.response)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    name: String,
    description: Option<String>,
    user_id: String,
    is_template: bool,
    created_at: String,
    updated_at: String,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            user_id: row.user_id,
            is_template: row.is_template,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ActivityResponseRow {
    id: String,
    project_id: String,
    phase_id: String,
    step_id: String,
    activity_id: String,
    response: String,
    created_at: String,
    updated_at: String,
}

impl From<ActivityResponseRow> for ActivityResponse {
    fn from(row: ActivityResponseRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            phase_id: row.phase_id,
            step_id: row.step_id,
            activity_id: row.activity_id,
            response: serde_json::from_str(&row.response).unwrap_or(serde_json::Value::Null),
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct StoryRow {
    id: String,
    project_id: String,
    user_id: Option<String>,
    title: String,
    text: String,
    emotional_response: Option<String>,
    additional_comments: Option<String>,
    is_public: bool,
    is_imported: bool,
    audio: Option<String>,
    created_at: String,
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            user_id: row.user_id,
            title: row.title,
            text: row.text,
            emotional_response: row.emotional_response,
            additional_comments: row.additional_comments,
            is_public: row.is_public,
            is_imported: row.is_imported,
            audio: row.audio,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct SliderResponseRow {
    id: String,
    story_id: String,
    question_id: i64,
    question_text: String,
    value: Option<i64>,
    response_type: String,
    left_label: Option<String>,
    right_label: Option<String>,
}

impl From<SliderResponseRow> for SliderResponse {
    fn from(row: SliderResponseRow) -> Self {
        Self {
            id: row.id,
            story_id: row.story_id,
            question_id: row.question_id,
            question_text: row.question_text,
            value: row.value,
            response_type: row.response_type.parse().unwrap_or(ResponseType::Skipped),
            left_label: row.left_label,
            right_label: row.right_label,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ParticipantResponseRow {
    id: String,
    story_id: String,
    question_id: i64,
    question_text: String,
    choice_id: String,
    response: String,
}

impl From<ParticipantResponseRow> for ParticipantResponse {
    fn from(row: ParticipantResponseRow) -> Self {
        Self {
            id: row.id,
            story_id: row.story_id,
            question_id: row.question_id,
            question_text: row.question_text,
            choice_id: row.choice_id,
            response: row.response,
        }
    }
}
