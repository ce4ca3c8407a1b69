//! Command-line operations over the application state.

use clap::Subcommand;
use std::path::PathBuf;

use crate::assistant::user_message;
use crate::error::AppError;
use crate::forms::submission_url;
use crate::state::AppState;

/// Top-level commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage the public form identifier of a project
    FormId {
        #[command(subcommand)]
        command: FormIdCommands,
    },

    /// Inspect the story form configuration
    Form {
        #[command(subcommand)]
        command: FormCommands,
    },

    /// Export or import stories as CSV
    Stories {
        #[command(subcommand)]
        command: StoriesCommands,
    },

    /// Show dashboard aggregates for a project
    Stats {
        /// Project ID
        project_id: String,
    },

    /// Ask the assistant about a project's stories
    Ask {
        /// Project ID
        project_id: String,

        /// Question for the assistant
        prompt: String,
    },
}

/// Form identifier subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum FormIdCommands {
    /// Create the identifier, or show the existing one
    Create { project_id: String },
    /// Show the identifier and submission URL
    Show { project_id: String },
    /// Revoke the identifier so the public link stops working
    Revoke { project_id: String },
}

/// Form configuration subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum FormCommands {
    /// Show the resolved form configuration as JSON
    Show {
        /// Project ID
        #[arg(required_unless_present = "form_id")]
        project_id: Option<String>,

        /// Resolve through a public form ID instead
        #[arg(long, conflicts_with = "project_id")]
        form_id: Option<String>,

        /// Bypass the cache
        #[arg(long)]
        refresh: bool,
    },
}

/// Story CSV subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum StoriesCommands {
    /// Write a project's stories as CSV
    Export {
        project_id: String,

        /// Output file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Read stories from a CSV file into a project
    Import { project_id: String, file: PathBuf },
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

impl From<AppError> for CliResult {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Assistant(e) => CliResult::error(format!(
                "{} ({})",
                user_message(e.error_code),
                e.details.as_deref().unwrap_or(&e.error)
            )),
            other => CliResult::error(other.to_string()),
        }
    }
}

/// Execute a CLI command.
pub async fn execute_command(command: Commands, state: &AppState) -> CliResult {
    match command {
        Commands::FormId { command } => execute_form_id(command, state).await,
        Commands::Form {
            command:
                FormCommands::Show {
                    project_id,
                    form_id,
                    refresh,
                },
        } => execute_form_show(state, project_id, form_id, refresh).await,
        Commands::Stories { command } => execute_stories(command, state).await,
        Commands::Stats { project_id } => execute_stats(state, &project_id).await,
        Commands::Ask { project_id, prompt } => match state.ask(&project_id, &prompt).await {
            Ok(answer) => CliResult::success(answer.response),
            Err(e) => e.into(),
        },
    }
}

async fn execute_form_id(command: FormIdCommands, state: &AppState) -> CliResult {
    let base_url = &state.config.forms.public_base_url;
    match command {
        FormIdCommands::Create { project_id } => {
            if let Err(e) = state.projects.get(&project_id).await {
                return AppError::from(e).into();
            }
            match state.identifiers.create_or_update(&project_id).await {
                Some(form_id) => CliResult::success(format!(
                    "{}\n{}",
                    form_id,
                    submission_url(base_url, &form_id)
                )),
                None => CliResult::error("Failed to create form identifier"),
            }
        }
        FormIdCommands::Show { project_id } => {
            match state.identifiers.fetch_existing(&project_id).await {
                Some(form_id) => CliResult::success(format!(
                    "{}\n{}",
                    form_id,
                    submission_url(base_url, &form_id)
                )),
                None => CliResult::error(format!("No form identifier for project {}", project_id)),
            }
        }
        FormIdCommands::Revoke { project_id } => {
            if state.identifiers.revoke(&project_id).await {
                CliResult::success("Form identifier revoked")
            } else {
                CliResult::error("Failed to revoke form identifier")
            }
        }
    }
}

async fn execute_form_show(
    state: &AppState,
    project_id: Option<String>,
    form_id: Option<String>,
    refresh: bool,
) -> CliResult {
    let data = match (project_id, form_id) {
        (_, Some(form_id)) => state.resolver.load_by_form_id(&form_id, refresh).await,
        (Some(project_id), None) => state.resolver.load(&project_id, refresh).await,
        (None, None) => return CliResult::error("A project ID or --form-id is required"),
    };

    if let Some(error) = &data.error {
        return CliResult::error(error.clone());
    }

    match serde_json::to_string_pretty(&data) {
        Ok(json) => CliResult::success(json),
        Err(e) => CliResult::error(format!("Failed to render form: {}", e)),
    }
}

async fn execute_stories(command: StoriesCommands, state: &AppState) -> CliResult {
    match command {
        StoriesCommands::Export { project_id, output } => {
            let csv = match state.export_csv(&project_id).await {
                Ok(csv) => csv,
                Err(e) => return e.into(),
            };
            match output {
                Some(path) => match tokio::fs::write(&path, csv).await {
                    Ok(()) => CliResult::success(format!("Wrote {}", path.display())),
                    Err(e) => CliResult::error(format!("Failed to write {}: {}", path.display(), e)),
                },
                None => CliResult::success(csv),
            }
        }
        StoriesCommands::Import { project_id, file } => {
            let input = match tokio::fs::read_to_string(&file).await {
                Ok(input) => input,
                Err(e) => {
                    return CliResult::error(format!("Failed to read {}: {}", file.display(), e))
                }
            };
            match state.import_csv(&project_id, &input).await {
                Ok(count) => CliResult::success(format!("Imported {} stories", count)),
                Err(e) => e.into(),
            }
        }
    }
}

async fn execute_stats(state: &AppState, project_id: &str) -> CliResult {
    let stats = match state.dashboard(project_id).await {
        Ok(stats) => stats,
        Err(e) => return e.into(),
    };

    let mut output = String::new();
    output.push_str(&format!(
        "Stories: {} ({} public, {} imported)\n",
        stats.total_stories, stats.public_stories, stats.imported_stories
    ));
    if let Some(emotion) = stats.dominant_emotion() {
        output.push_str(&format!("Dominant emotion: {}\n", emotion));
    }
    for (emotion, count) in &stats.emotions {
        output.push_str(&format!("  {:<20} {}\n", emotion, count));
    }
    for slider in &stats.sliders {
        let average = slider
            .average
            .map(|a| format!("{:.1}", a))
            .unwrap_or_else(|| "-".to_string());
        output.push_str(&format!(
            "Slider {}: avg {} ({} answered, {} skipped)\n",
            slider.question_text, average, slider.answered, slider.skipped
        ));
    }

    CliResult::success(output)
}
