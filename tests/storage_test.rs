//! Integration tests for SQLite storage layer
//!
//! Tests database operations using an in-memory SQLite database.

use serde_json::json;

use culture_sprint::forms::QuestionKind;
use culture_sprint::storage::{
    ActivityResponse, FormIdentifier, ParticipantResponse, Project, ResponseType, SliderResponse,
    SqliteStorage, Storage, Story, StoryRecord, UserRole,
};

/// Create an in-memory storage instance for testing
async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

async fn create_project(storage: &SqliteStorage, user_id: &str) -> Project {
    let project = Project::new("Team retro", user_id);
    storage.create_project(&project).await.unwrap();
    project
}

fn slider(story_id: &str, question_id: i64, value: Option<i64>) -> SliderResponse {
    SliderResponse {
        id: format!("{}-s{}", story_id, question_id),
        story_id: story_id.to_string(),
        question_id,
        question_text: format!("Slider {}", question_id),
        value,
        response_type: if value.is_some() {
            ResponseType::Answered
        } else {
            ResponseType::Skipped
        },
        left_label: Some("Low".to_string()),
        right_label: Some("High".to_string()),
    }
}

fn participant(story_id: &str, question_id: i64) -> ParticipantResponse {
    ParticipantResponse {
        id: format!("{}-p{}", story_id, question_id),
        story_id: story_id.to_string(),
        question_id,
        question_text: "Team".to_string(),
        choice_id: "ops".to_string(),
        response: "Operations".to_string(),
    }
}

#[cfg(test)]
mod project_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_project() {
        let storage = create_test_storage().await;
        let project = Project::new("Onboarding", "user-1").with_description("First weeks");
        storage.create_project(&project).await.unwrap();

        let retrieved = storage.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(retrieved.name, "Onboarding");
        assert_eq!(retrieved.description.as_deref(), Some("First weeks"));
        assert_eq!(retrieved.user_id, "user-1");
        assert!(!retrieved.is_template);
    }

    #[tokio::test]
    async fn test_get_nonexistent_project() {
        let storage = create_test_storage().await;
        assert!(storage.get_project("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_projects_includes_templates() {
        let storage = create_test_storage().await;
        let own = create_project(&storage, "user-1").await;
        let _other = create_project(&storage, "user-2").await;
        let template = Project::new("Template", "admin").as_template();
        storage.create_project(&template).await.unwrap();

        let listed = storage.list_projects("user-1").await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(listed.len(), 2);
        assert!(ids.contains(&own.id.as_str()));
        assert!(ids.contains(&template.id.as_str()));
    }

    #[tokio::test]
    async fn test_update_missing_project_is_not_found() {
        let storage = create_test_storage().await;
        let project = Project::new("Ghost", "user-1");
        let result = storage.update_project(&project).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let storage = create_test_storage().await;
        let project = create_project(&storage, "user-1").await;
        let story = Story::new(&project.id, "A", "B");
        storage
            .create_story_submission(&story, &[slider(&story.id, 1, Some(5))], &[])
            .await
            .unwrap();
        storage
            .create_form_identifier(&FormIdentifier::new(&project.id, "abc123XYZ0"))
            .await
            .unwrap();

        storage.delete_project(&project.id).await.unwrap();

        assert!(storage.get_story(&story.id).await.unwrap().is_none());
        assert!(storage.get_form_identifier(&project.id).await.unwrap().is_none());
        assert!(storage
            .get_story_slider_responses(&story.id)
            .await
            .unwrap()
            .is_empty());
    }
}

#[cfg(test)]
mod activity_response_tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_overwrites_at_same_coordinates() {
        let storage = create_test_storage().await;
        let project = create_project(&storage, "user-1").await;
        let coords = QuestionKind::Story.coordinates();

        storage
            .upsert_activity_response(&ActivityResponse::new(
                &project.id,
                coords,
                json!({"question": "First version"}),
            ))
            .await
            .unwrap();
        storage
            .upsert_activity_response(&ActivityResponse::new(
                &project.id,
                coords,
                json!({"question": "Second version"}),
            ))
            .await
            .unwrap();

        let stored = storage
            .get_activity_response(&project.id, &coords)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.response["question"], "Second version");

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM activity_responses")
            .fetch_one(storage.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_missing_activity_response() {
        let storage = create_test_storage().await;
        let project = create_project(&storage, "user-1").await;
        let result = storage
            .get_activity_response(&project.id, &QuestionKind::Slider.coordinates())
            .await
            .unwrap();
        assert!(result.is_none());
    }
}

#[cfg(test)]
mod form_identifier_tests {
    use super::*;

    #[tokio::test]
    async fn test_form_identifier_lifecycle() {
        let storage = create_test_storage().await;
        let project = create_project(&storage, "user-1").await;

        storage
            .create_form_identifier(&FormIdentifier::new(&project.id, "Tok3nTok3n"))
            .await
            .unwrap();

        assert_eq!(
            storage.find_project_by_form_id("Tok3nTok3n").await.unwrap(),
            Some(project.id.clone())
        );
        assert!(storage.delete_form_identifier(&project.id).await.unwrap());
        assert!(!storage.delete_form_identifier(&project.id).await.unwrap());
        assert!(storage.find_project_by_form_id("Tok3nTok3n").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_one_identifier_per_project() {
        let storage = create_test_storage().await;
        let project = create_project(&storage, "user-1").await;

        storage
            .create_form_identifier(&FormIdentifier::new(&project.id, "first00000"))
            .await
            .unwrap();
        let second = storage
            .create_form_identifier(&FormIdentifier::new(&project.id, "second0000"))
            .await;
        assert!(second.is_err());
    }
}

#[cfg(test)]
mod story_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_story_submission_writes_all_rows() {
        let storage = create_test_storage().await;
        let project = create_project(&storage, "user-1").await;
        let story = Story::new(&project.id, "Deploy day", "It went well")
            .with_emotional_response("proud")
            .with_user("user-1");

        storage
            .create_story_submission(
                &story,
                &[slider(&story.id, 1, Some(80)), slider(&story.id, 2, None)],
                &[participant(&story.id, 7)],
            )
            .await
            .unwrap();

        let stored = storage.get_story(&story.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Deploy day");
        assert_eq!(stored.emotional_response.as_deref(), Some("proud"));

        let sliders = storage.get_story_slider_responses(&story.id).await.unwrap();
        assert_eq!(sliders.len(), 2);
        assert_eq!(sliders[0].value, Some(80));
        assert_eq!(sliders[1].response_type, ResponseType::Skipped);
        assert_eq!(sliders[1].value, None);

        let participants = storage
            .get_story_participant_responses(&story.id)
            .await
            .unwrap();
        assert_eq!(participants, vec![participant(&story.id, 7)]);
        assert_eq!(storage.count_project_stories(&project.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_response_insert_rolls_back_story() {
        let storage = create_test_storage().await;
        let project = create_project(&storage, "user-1").await;

        sqlx::query(
            "CREATE TRIGGER reject_participants BEFORE INSERT ON participant_responses \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .execute(storage.pool())
        .await
        .unwrap();

        let story = Story::new(&project.id, "Doomed", "Never stored");
        let result = storage
            .create_story_submission(
                &story,
                &[slider(&story.id, 1, Some(10))],
                &[participant(&story.id, 1)],
            )
            .await;

        assert!(result.is_err());
        assert!(storage.get_story(&story.id).await.unwrap().is_none());
        assert!(storage
            .get_story_slider_responses(&story.id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(storage.count_project_stories(&project.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_story_batch_commits_every_record() {
        let storage = create_test_storage().await;
        let project = create_project(&storage, "user-1").await;
        let records: Vec<StoryRecord> = ["One", "Two"]
            .into_iter()
            .map(|title| {
                let story = Story::new(&project.id, title, "text").as_imported();
                StoryRecord {
                    slider_responses: vec![slider(&story.id, 1, Some(30))],
                    participant_responses: vec![participant(&story.id, 2)],
                    story,
                }
            })
            .collect();

        storage.create_story_batch(&records).await.unwrap();

        assert_eq!(storage.count_project_stories(&project.id).await.unwrap(), 2);
        let sliders = storage
            .get_story_slider_responses(&records[1].story.id)
            .await
            .unwrap();
        assert_eq!(sliders, records[1].slider_responses);
    }

    #[tokio::test]
    async fn test_project_level_responses() {
        let storage = create_test_storage().await;
        let project = create_project(&storage, "user-1").await;
        for title in ["One", "Two"] {
            let story = Story::new(&project.id, title, "text");
            storage
                .create_story_submission(
                    &story,
                    &[slider(&story.id, 1, Some(50))],
                    &[participant(&story.id, 3)],
                )
                .await
                .unwrap();
        }

        let stories = storage.list_project_stories(&project.id).await.unwrap();
        assert_eq!(stories.len(), 2);
        assert_eq!(stories[0].title, "One");
        assert_eq!(
            storage
                .get_project_slider_responses(&project.id)
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            storage
                .get_project_participant_responses(&project.id)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_delete_story_cascades_responses() {
        let storage = create_test_storage().await;
        let project = create_project(&storage, "user-1").await;
        let story = Story::new(&project.id, "Short lived", "text");
        storage
            .create_story_submission(
                &story,
                &[slider(&story.id, 1, Some(1))],
                &[participant(&story.id, 1)],
            )
            .await
            .unwrap();

        storage.delete_story(&story.id).await.unwrap();

        assert!(storage.get_story(&story.id).await.unwrap().is_none());
        assert!(storage
            .get_story_participant_responses(&story.id)
            .await
            .unwrap()
            .is_empty());
    }
}

#[cfg(test)]
mod role_tests {
    use super::*;

    #[tokio::test]
    async fn test_roles() {
        let storage = create_test_storage().await;
        assert!(storage.get_user_role("u").await.unwrap().is_none());

        storage.set_user_role("u", UserRole::Demo).await.unwrap();
        assert_eq!(storage.get_user_role("u").await.unwrap(), Some(UserRole::Demo));

        storage.set_user_role("u", UserRole::SuperAdmin).await.unwrap();
        assert_eq!(
            storage.get_user_role("u").await.unwrap(),
            Some(UserRole::SuperAdmin)
        );
    }
}
