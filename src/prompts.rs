//! Centralized prompt definitions for the AI assistant
//!
//! System prompts are selected by request type; the builder functions
//! assemble user prompts from project data.

use crate::assistant::RequestType;
use crate::storage::{Project, Story};

/// System prompt for general assistant chat.
pub const GENERAL_PROMPT: &str = r#"You are the Culture Sprint assistant. You help facilitators understand the stories their participants shared about their organisation's culture.

Guidelines:
- Ground every answer in the project context when it is provided
- Quote or paraphrase stories rather than inventing examples
- Point out patterns, tensions and surprises
- Be concise and practical
- Say so when the stories do not support a conclusion"#;

/// System prompt for sentiment analysis of stories.
pub const SENTIMENT_ANALYSIS_PROMPT: &str = r#"You analyse the emotional tone of workplace stories.

For the stories provided:
- Classify the overall sentiment as positive, negative, mixed or neutral
- Name the dominant emotions and how often they appear
- Highlight stories that stand out from the overall tone
- Summarise in a short paragraph followed by a bulleted list

Do not speculate about individual participants."#;

/// System prompt for drafting a story-collection question.
pub const STORY_QUESTION_PROMPT: &str = r#"You write prompts that invite people to share a short, specific story from their working life.

A good prompt:
- Asks for a concrete moment ("Tell me about a time when...")
- Is open, neutral and does not suggest a right answer
- Is one or two sentences long
- Uses plain language

Respond with the prompt only, without quotes or explanations."#;

/// System prompt for a request type.
pub fn system_prompt(request_type: RequestType) -> &'static str {
    match request_type {
        RequestType::General => GENERAL_PROMPT,
        RequestType::SentimentAnalysis => SENTIMENT_ANALYSIS_PROMPT,
        RequestType::StoryQuestion => STORY_QUESTION_PROMPT,
    }
}

/// User prompt asking for a story question tailored to a project.
pub fn story_question_request(project: &Project) -> String {
    let mut prompt = format!(
        "Write a story-collection prompt for a project called \"{}\".",
        project.name
    );
    if let Some(description) = project.description.as_deref().filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!("\nProject description: {}", description.trim()));
    }
    prompt
}

/// User prompt asking for a sentiment analysis of the given stories.
pub fn sentiment_request(stories: &[Story], max_chars_per_story: usize) -> String {
    let mut prompt = format!("Analyse the sentiment of these {} stories:\n", stories.len());
    for (i, story) in stories.iter().enumerate() {
        prompt.push_str(&format!(
            "\n{}. {} ({})\n{}\n",
            i + 1,
            story.title,
            story.emotional_response.as_deref().unwrap_or("no emotion given"),
            truncate(&story.text, max_chars_per_story)
        ));
    }
    prompt
}

/// Truncate on a character boundary, marking the cut with an ellipsis.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
