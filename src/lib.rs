//! # Culture Sprint
//!
//! Backend core of the Culture Sprint story-collection platform.
//!
//! Facilitators configure a story form per project (a story question,
//! slider questions and participant questions), share it through a public
//! form identifier, and collect stories with their answers. Collected
//! stories feed a dashboard and an AI assistant.
//!
//! ## Architecture
//!
//! ```text
//! CLI → AppState → services (forms, submission, projects, assistant)
//!                     ↓                  ↓
//!          ClientCache (key-value)   SQLite (Storage)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use culture_sprint::{AppState, ClientCache, Config};
//! use culture_sprint::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let state = AppState::new(config, storage, ClientCache::in_memory())?;
//!     let form = state.resolver.load("project-id", false).await;
//!     println!("{:?}", form.story_question);
//!     Ok(())
//! }
//! ```

/// AI assistant client and wire types.
pub mod assistant;
/// Local and session key-value caches.
pub mod cache;
/// Command-line operations.
pub mod cli;
/// Configuration management.
pub mod config;
/// Dashboard aggregates.
pub mod dashboard;
/// Error types and result aliases for the application.
pub mod error;
/// CSV import and export.
pub mod export;
/// Story form configuration.
pub mod forms;
/// Project management with ownership checks.
pub mod projects;
/// System prompts for the assistant.
pub mod prompts;
/// Shared application state.
pub mod state;
/// SQLite storage layer for persistence.
pub mod storage;
/// Story submission.
pub mod submission;
/// Template cloning for non-admin viewers.
pub mod templates;

pub use cache::ClientCache;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::{AppState, SharedState};
