//! CSV import and export of stories.
//!
//! Exports carry a UTF-8 byte-order mark so spreadsheet tools pick the
//! right encoding. The layout is fixed except for participant questions,
//! which get one column each.

use serde::Serialize;

use crate::error::{StorageResult, ValidationError};
use crate::storage::{ParticipantResponse, SliderResponse, Storage, Story};

/// UTF-8 byte-order mark.
pub const BOM: &str = "\u{feff}";

/// Slider columns included in the fixed layout.
pub const MAX_EXPORTED_SLIDERS: usize = 3;

const TITLE: &str = "Title";
const STORY: &str = "Story";
const EMOTION: &str = "Emotional Response";
const COMMENTS: &str = "Additional Comments";

/// A story with its responses, ready for export.
#[derive(Debug, Clone)]
pub struct StoryExport {
    pub story: Story,
    pub sliders: Vec<SliderResponse>,
    pub participants: Vec<ParticipantResponse>,
}

/// A slider answer read from CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedSlider {
    pub question: String,
    pub left_label: Option<String>,
    pub right_label: Option<String>,
    /// `None` when the cell was empty (skipped).
    pub value: Option<i64>,
}

/// A story read from CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedStory {
    pub title: String,
    pub text: String,
    pub emotional_response: Option<String>,
    pub additional_comments: Option<String>,
    pub sliders: Vec<ImportedSlider>,
    /// (question label, answer) pairs with non-empty answers.
    pub participant_answers: Vec<(String, String)>,
}

/// Load every story of a project with its responses.
pub async fn collect_export_rows(
    storage: &dyn Storage,
    project_id: &str,
) -> StorageResult<Vec<StoryExport>> {
    let stories = storage.list_project_stories(project_id).await?;
    let mut rows = Vec::with_capacity(stories.len());
    for story in stories {
        let sliders = storage.get_story_slider_responses(&story.id).await?;
        let participants = storage.get_story_participant_responses(&story.id).await?;
        rows.push(StoryExport {
            story,
            sliders,
            participants,
        });
    }
    Ok(rows)
}

/// Render stories as BOM-prefixed CSV.
pub fn export_stories_csv(rows: &[StoryExport]) -> String {
    let mut participant_columns: Vec<String> = Vec::new();
    for row in rows {
        for answer in &row.participants {
            if !participant_columns.contains(&answer.question_text) {
                participant_columns.push(answer.question_text.clone());
            }
        }
    }

    let mut header: Vec<String> = vec![TITLE.into(), STORY.into(), EMOTION.into()];
    for n in 1..=MAX_EXPORTED_SLIDERS {
        header.push(format!("Slider {} Value", n));
        header.push(format!("Slider {} Question", n));
        header.push(format!("Slider {} Left", n));
        header.push(format!("Slider {} Right", n));
    }
    header.extend(participant_columns.iter().cloned());
    header.push(COMMENTS.into());

    let mut out = String::from(BOM);
    push_record(&mut out, &header);

    for row in rows {
        let story = &row.story;
        let mut record = vec![
            story.title.clone(),
            story.text.clone(),
            story.emotional_response.clone().unwrap_or_default(),
        ];
        for n in 0..MAX_EXPORTED_SLIDERS {
            match row.sliders.get(n) {
                Some(slider) => {
                    record.push(slider.value.map(|v| v.to_string()).unwrap_or_default());
                    record.push(slider.question_text.clone());
                    record.push(slider.left_label.clone().unwrap_or_default());
                    record.push(slider.right_label.clone().unwrap_or_default());
                }
                None => record.extend(std::iter::repeat(String::new()).take(4)),
            }
        }
        for column in &participant_columns {
            let answer = row
                .participants
                .iter()
                .find(|p| &p.question_text == column)
                .map(|p| p.response.clone())
                .unwrap_or_default();
            record.push(answer);
        }
        record.push(story.additional_comments.clone().unwrap_or_default());
        push_record(&mut out, &record);
    }

    out
}

/// Parse CSV produced by [`export_stories_csv`] (or a spreadsheet edit of it).
///
/// Rows with neither title nor story text are skipped.
pub fn import_stories_csv(input: &str) -> Result<Vec<ImportedStory>, ValidationError> {
    let input = input.strip_prefix(BOM).unwrap_or(input);
    let mut records = parse_csv(input)?.into_iter();

    let header = records
        .next()
        .ok_or_else(|| ValidationError::new("csv", "File is empty"))?;
    let column = |name: &str| header.iter().position(|h| h.trim().eq_ignore_ascii_case(name));

    let title_col = column(TITLE).ok_or_else(|| ValidationError::new("csv", "Missing Title column"))?;
    let story_col = column(STORY).ok_or_else(|| ValidationError::new("csv", "Missing Story column"))?;
    let emotion_col = column(EMOTION);
    let comments_col = column(COMMENTS);

    let mut slider_cols = Vec::new();
    for n in 1..=MAX_EXPORTED_SLIDERS {
        let value = column(&format!("Slider {} Value", n));
        let question = column(&format!("Slider {} Question", n));
        if let (Some(value), Some(question)) = (value, question) {
            let left = column(&format!("Slider {} Left", n));
            let right = column(&format!("Slider {} Right", n));
            slider_cols.push((value, question, left, right));
        }
    }

    let known: Vec<usize> = [Some(title_col), Some(story_col), emotion_col, comments_col]
        .into_iter()
        .flatten()
        .chain(
            slider_cols
                .iter()
                .flat_map(|(v, q, l, r)| [Some(*v), Some(*q), *l, *r])
                .flatten(),
        )
        .collect();
    let participant_cols: Vec<usize> = (0..header.len()).filter(|i| !known.contains(i)).collect();

    let mut stories = Vec::new();
    for (line, record) in records.enumerate() {
        let cell = |i: usize| record.get(i).map(|s| s.trim()).unwrap_or("");
        let optional = |i: Option<usize>| i.map(cell).filter(|s| !s.is_empty()).map(str::to_string);

        let title = cell(title_col).to_string();
        let text = cell(story_col).to_string();
        if title.is_empty() && text.is_empty() {
            continue;
        }

        let mut sliders = Vec::new();
        for (value_col, question_col, left_col, right_col) in &slider_cols {
            let question = cell(*question_col);
            if question.is_empty() {
                continue;
            }
            let raw = cell(*value_col);
            let value = if raw.is_empty() {
                None
            } else {
                let parsed = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| {
                        ValidationError::new(
                            "csv",
                            format!("Row {}: slider value '{}' is not a number", line + 2, raw),
                        )
                    })?;
                Some(parsed.round().clamp(0.0, 100.0) as i64)
            };
            sliders.push(ImportedSlider {
                question: question.to_string(),
                left_label: optional(*left_col),
                right_label: optional(*right_col),
                value,
            });
        }

        let participant_answers = participant_cols
            .iter()
            .filter_map(|&i| {
                let answer = cell(i);
                (!answer.is_empty()).then(|| (header[i].trim().to_string(), answer.to_string()))
            })
            .collect();

        stories.push(ImportedStory {
            title,
            text,
            emotional_response: optional(emotion_col),
            additional_comments: optional(comments_col),
            sliders,
            participant_answers,
        });
    }

    Ok(stories)
}

fn push_record(out: &mut String, fields: &[String]) {
    let line: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

/// Quote a field when it contains a delimiter, quote or line break.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split RFC 4180 CSV into records.
///
/// Unterminated quotes and text after a closing quote are rejected.
pub fn parse_csv(input: &str) -> Result<Vec<Vec<String>>, ValidationError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut closed_quote = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => {
                    in_quotes = false;
                    closed_quote = true;
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !closed_quote => in_quotes = true,
            ',' => {
                record.push(std::mem::take(&mut field));
                closed_quote = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                closed_quote = false;
            }
            _ if closed_quote => {
                return Err(ValidationError::new(
                    "csv",
                    format!("Row {}: unexpected text after a quoted field", records.len() + 1),
                ));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ValidationError::new("csv", "Unterminated quoted field"));
    }
    if !field.is_empty() || !record.is_empty() || closed_quote {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}
