//! Shared application state.

use std::sync::Arc;
use tracing::info;

use crate::assistant::{LlmClient, ProxyRequest, ProxyResponse, RequestType};
use crate::cache::ClientCache;
use crate::config::Config;
use crate::dashboard::{build_chat_context, DashboardStats};
use crate::error::{AppError, AppResult};
use crate::export::{collect_export_rows, export_stories_csv, import_stories_csv};
use crate::forms::{FormConfigService, FormDataResolver, FormIdentifierService};
use crate::projects::ProjectService;
use crate::storage::{SqliteStorage, Storage};
use crate::submission::SubmissionHandler;
use crate::templates::TemplateCloner;

/// Characters of each story included in the assistant's project context.
const CONTEXT_STORY_CHARS: usize = 300;

/// Services wired to one storage backend and one client cache.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend.
    pub storage: SqliteStorage,
    /// Local and session key-value stores.
    pub cache: ClientCache,
    pub resolver: FormDataResolver,
    pub identifiers: FormIdentifierService,
    pub form_config: FormConfigService,
    pub submissions: SubmissionHandler,
    pub projects: ProjectService,
    /// Assistant API client.
    pub assistant: LlmClient,
}

/// Shared state handle.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create new application state.
    pub fn new(config: Config, storage: SqliteStorage, cache: ClientCache) -> AppResult<Self> {
        info!(
            loader = ?config.forms.loader,
            demo_story_limit = config.forms.demo_story_limit,
            assistant_configured = config.llm.api_key.is_some(),
            "AppState initializing"
        );

        let assistant = LlmClient::new(&config.llm)?;
        let resolver = FormDataResolver::new(storage.clone(), cache.clone(), config.forms.loader);
        let identifiers = FormIdentifierService::new(storage.clone());
        let form_config = FormConfigService::new(storage.clone(), cache.clone());
        let submissions = SubmissionHandler::new(storage.clone(), config.forms.demo_story_limit);
        let projects = ProjectService::new(
            storage.clone(),
            TemplateCloner::new(cache.local().clone()),
        );

        Ok(Self {
            config,
            storage,
            cache,
            resolver,
            identifiers,
            form_config,
            submissions,
            projects,
            assistant,
        })
    }

    /// Dashboard aggregates for a project.
    pub async fn dashboard(&self, project_id: &str) -> AppResult<DashboardStats> {
        let stories = self.storage.list_project_stories(project_id).await?;
        let sliders = self.storage.get_project_slider_responses(project_id).await?;
        Ok(DashboardStats::compute(&stories, &sliders))
    }

    /// A project's stories as CSV.
    pub async fn export_csv(&self, project_id: &str) -> AppResult<String> {
        let rows = collect_export_rows(&self.storage, project_id).await?;
        Ok(export_stories_csv(&rows))
    }

    /// Import stories from CSV into a project, returning how many were added.
    pub async fn import_csv(&self, project_id: &str, input: &str) -> AppResult<usize> {
        self.projects.get(project_id).await?;
        let stories = import_stories_csv(input)?;
        let form = self.resolver.load(project_id, false).await;
        Ok(self
            .submissions
            .import_stories(project_id, &stories, &form)
            .await?)
    }

    /// Ask the assistant a question about a project's stories.
    pub async fn ask(&self, project_id: &str, prompt: &str) -> AppResult<ProxyResponse> {
        let project = self.projects.get(project_id).await?;
        let stories = self.storage.list_project_stories(project_id).await?;
        let sliders = self.storage.get_project_slider_responses(project_id).await?;
        let stats = DashboardStats::compute(&stories, &sliders);
        let context = build_chat_context(&project, &stats, &stories, CONTEXT_STORY_CHARS);

        let request = ProxyRequest::new(prompt)
            .with_context(context)
            .with_type(RequestType::General);
        self.assistant.complete(request).await.map_err(AppError::from)
    }
}
