//! Dashboard aggregates and the context blob handed to the assistant.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::prompts::truncate;
use crate::storage::{Project, ResponseType, SliderResponse, Story};

/// Label used for stories without an emotional response.
pub const UNSPECIFIED_EMOTION: &str = "unspecified";

/// Summary of one slider question across all stories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliderSummary {
    pub question_id: i64,
    pub question_text: String,
    pub left_label: Option<String>,
    pub right_label: Option<String>,
    pub answered: usize,
    pub skipped: usize,
    /// Mean of answered values; `None` when nobody answered.
    pub average: Option<f64>,
}

/// Aggregates shown on the project dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_stories: usize,
    pub public_stories: usize,
    pub imported_stories: usize,
    /// Story count per emotional response, lower-cased.
    pub emotions: BTreeMap<String, usize>,
    /// One entry per slider question, in first-seen order.
    pub sliders: Vec<SliderSummary>,
}

impl DashboardStats {
    /// Compute aggregates from a project's stories and slider responses.
    pub fn compute(stories: &[Story], slider_responses: &[SliderResponse]) -> Self {
        let mut emotions = BTreeMap::new();
        for story in stories {
            let emotion = story
                .emotional_response
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_lowercase)
                .unwrap_or_else(|| UNSPECIFIED_EMOTION.to_string());
            *emotions.entry(emotion).or_insert(0) += 1;
        }

        let mut sliders: Vec<SliderSummary> = Vec::new();
        let mut sums: Vec<i64> = Vec::new();
        for response in slider_responses {
            let index = match sliders.iter().position(|s| s.question_id == response.question_id) {
                Some(index) => index,
                None => {
                    sliders.push(SliderSummary {
                        question_id: response.question_id,
                        question_text: response.question_text.clone(),
                        left_label: response.left_label.clone(),
                        right_label: response.right_label.clone(),
                        answered: 0,
                        skipped: 0,
                        average: None,
                    });
                    sums.push(0);
                    sliders.len() - 1
                }
            };

            match (response.response_type, response.value) {
                (ResponseType::Answered, Some(value)) => {
                    sliders[index].answered += 1;
                    sums[index] = sums[index].saturating_add(value);
                }
                _ => sliders[index].skipped += 1,
            }
        }

        for (summary, sum) in sliders.iter_mut().zip(sums) {
            if summary.answered > 0 {
                summary.average = Some(sum as f64 / summary.answered as f64);
            }
        }

        Self {
            total_stories: stories.len(),
            public_stories: stories.iter().filter(|s| s.is_public).count(),
            imported_stories: stories.iter().filter(|s| s.is_imported).count(),
            emotions,
            sliders,
        }
    }

    /// The most frequent emotional response, ties broken alphabetically.
    pub fn dominant_emotion(&self) -> Option<&str> {
        self.emotions
            .iter()
            .filter(|(emotion, _)| emotion.as_str() != UNSPECIFIED_EMOTION)
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(emotion, _)| emotion.as_str())
    }
}

/// Build the project context forwarded with assistant prompts.
pub fn build_chat_context(
    project: &Project,
    stats: &DashboardStats,
    stories: &[Story],
    max_chars_per_story: usize,
) -> String {
    let mut context = format!("Project: {}\n", project.name);
    if let Some(description) = project.description.as_deref().filter(|d| !d.trim().is_empty()) {
        context.push_str(&format!("Description: {}\n", description.trim()));
    }
    context.push_str(&format!("Stories collected: {}\n", stats.total_stories));

    if !stats.emotions.is_empty() {
        let emotions: Vec<String> = stats
            .emotions
            .iter()
            .map(|(emotion, count)| format!("{} ({})", emotion, count))
            .collect();
        context.push_str(&format!("Emotional responses: {}\n", emotions.join(", ")));
    }

    for slider in &stats.sliders {
        let average = slider
            .average
            .map(|a| format!("{:.1}", a))
            .unwrap_or_else(|| "n/a".to_string());
        context.push_str(&format!(
            "Slider \"{}\" ({} to {}): average {}, {} answered, {} skipped\n",
            slider.question_text,
            slider.left_label.as_deref().unwrap_or("0"),
            slider.right_label.as_deref().unwrap_or("100"),
            average,
            slider.answered,
            slider.skipped
        ));
    }

    if !stories.is_empty() {
        context.push_str("\nStories:\n");
        for story in stories {
            context.push_str(&format!(
                "- {}: {}\n",
                story.title,
                truncate(&story.text, max_chars_per_story)
            ));
        }
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slider(story: &str, question_id: i64, value: Option<i64>) -> SliderResponse {
        SliderResponse {
            id: format!("{}-{}", story, question_id),
            story_id: story.to_string(),
            question_id,
            question_text: format!("Question {}", question_id),
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

    #[test]
    fn test_compute_counts_and_emotions() {
        let stories = vec![
            Story::new("p", "A", "a").with_emotional_response("Happy").as_public(),
            Story::new("p", "B", "b").with_emotional_response("happy"),
            Story::new("p", "C", "c").as_imported(),
        ];
        let stats = DashboardStats::compute(&stories, &[]);

        assert_eq!(stats.total_stories, 3);
        assert_eq!(stats.public_stories, 1);
        assert_eq!(stats.imported_stories, 1);
        assert_eq!(stats.emotions["happy"], 2);
        assert_eq!(stats.emotions[UNSPECIFIED_EMOTION], 1);
        assert_eq!(stats.dominant_emotion(), Some("happy"));
    }

    #[test]
    fn test_slider_averages_ignore_skips() {
        let responses = vec![
            slider("s1", 1, Some(20)),
            slider("s2", 1, Some(60)),
            slider("s3", 1, None),
            slider("s1", 2, None),
        ];
        let stats = DashboardStats::compute(&[], &responses);

        assert_eq!(stats.sliders.len(), 2);
        assert_eq!(stats.sliders[0].answered, 2);
        assert_eq!(stats.sliders[0].skipped, 1);
        assert_eq!(stats.sliders[0].average, Some(40.0));
        assert_eq!(stats.sliders[1].average, None);
        assert_eq!(stats.sliders[1].skipped, 1);
    }

    #[test]
    fn test_dominant_emotion_none_when_empty() {
        let stats = DashboardStats::compute(&[Story::new("p", "A", "a")], &[]);
        assert_eq!(stats.dominant_emotion(), None);
    }

    #[test]
    fn test_chat_context() {
        let project = Project::new("Retro", "u").with_description("Q3 retro");
        let stories = vec![Story::new("p", "Late deploy", "x".repeat(50)).with_emotional_response("tired")];
        let stats = DashboardStats::compute(&stories, &[slider("s1", 1, Some(30))]);

        let context = build_chat_context(&project, &stats, &stories, 10);
        assert!(context.starts_with("Project: Retro\n"));
        assert!(context.contains("Description: Q3 retro"));
        assert!(context.contains("Stories collected: 1"));
        assert!(context.contains("tired (1)"));
        assert!(context.contains("average 30.0, 1 answered, 0 skipped"));
        assert!(context.contains("- Late deploy: xxxxxxxxxx..."));
    }
}
