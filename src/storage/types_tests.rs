//! Unit tests for storage types and builder patterns.
//!
//! Tests builders, string conversions and serialization for Project,
//! ActivityResponse, FormIdentifier, Story, ResponseType and UserRole.

use super::*;
use serde_json::json;

// ============================================================================
// Project tests
// ============================================================================

#[test]
fn test_project_new() {
    let project = Project::new("Team retro", "user-1");
    assert!(!project.id.is_empty());
    assert_eq!(project.name, "Team retro");
    assert_eq!(project.user_id, "user-1");
    assert!(!project.is_template);
    assert!(project.description.is_none());
    assert_eq!(project.created_at, project.updated_at);
}

#[test]
fn test_project_builders() {
    let project = Project::new("Onboarding", "admin")
        .with_description("Stories about the first week")
        .as_template();
    assert!(project.is_template);
    assert_eq!(
        project.description.as_deref(),
        Some("Stories about the first week")
    );
}

#[test]
fn test_project_ids_unique() {
    let a = Project::new("A", "u");
    let b = Project::new("B", "u");
    assert_ne!(a.id, b.id);
}

// ============================================================================
// ActivityResponse tests
// ============================================================================

#[test]
fn test_activity_response_new_copies_coordinates() {
    let coords = ActivityCoordinates {
        phase_id: "collection",
        step_id: "story-question",
        activity_id: "story-question",
    };
    let response = ActivityResponse::new("proj-1", coords, json!({"question": "Hi"}));
    assert_eq!(response.project_id, "proj-1");
    assert_eq!(response.phase_id, "collection");
    assert_eq!(response.step_id, "story-question");
    assert_eq!(response.activity_id, "story-question");
    assert_eq!(response.response["question"], "Hi");
}

// ============================================================================
// Story tests
// ============================================================================

#[test]
fn test_story_new_defaults() {
    let story = Story::new("proj-1", "A title", "Once upon a time");
    assert!(!story.id.is_empty());
    assert!(story.user_id.is_none());
    assert!(!story.is_public);
    assert!(!story.is_imported);
    assert!(story.audio.is_none());
}

#[test]
fn test_story_builders() {
    let story = Story::new("proj-1", "T", "Text")
        .with_user("user-9")
        .with_emotional_response("happy")
        .with_comments("none")
        .as_imported()
        .as_public();
    assert_eq!(story.user_id.as_deref(), Some("user-9"));
    assert_eq!(story.emotional_response.as_deref(), Some("happy"));
    assert_eq!(story.additional_comments.as_deref(), Some("none"));
    assert!(story.is_imported);
    assert!(story.is_public);
}

#[test]
fn test_story_serialization_skips_missing_audio() {
    let story = Story::new("proj-1", "T", "Text");
    let value = serde_json::to_value(&story).unwrap();
    assert!(value.get("audio").is_none());
}

// ============================================================================
// Enum conversions
// ============================================================================

#[test]
fn test_response_type_round_trip_strings() {
    assert_eq!(ResponseType::Answered.to_string(), "answered");
    assert_eq!(ResponseType::Skipped.to_string(), "skipped");
    assert_eq!("ANSWERED".parse::<ResponseType>(), Ok(ResponseType::Answered));
    assert!("maybe".parse::<ResponseType>().is_err());
}

#[test]
fn test_user_role_parsing() {
    assert_eq!("demo".parse::<UserRole>(), Ok(UserRole::Demo));
    assert_eq!("super-admin".parse::<UserRole>(), Ok(UserRole::SuperAdmin));
    assert_eq!(UserRole::SuperAdmin.to_string(), "super_admin");
    assert!("root".parse::<UserRole>().is_err());
}

#[test]
fn test_user_role_is_admin() {
    assert!(UserRole::Admin.is_admin());
    assert!(UserRole::SuperAdmin.is_admin());
    assert!(!UserRole::Demo.is_admin());
    assert!(!UserRole::User.is_admin());
}

#[test]
fn test_user_role_serde() {
    let json = serde_json::to_string(&UserRole::SuperAdmin).unwrap();
    assert_eq!(json, "\"super_admin\"");
}
