use rand::distr::Alphanumeric;
use rand::Rng;
use tracing::{error, info, warn};

use crate::storage::{FormIdentifier, SqliteStorage, Storage};

/// Length of generated public form ids.
pub const FORM_ID_LENGTH: usize = 10;

/// Issues and resolves the public tokens used in shareable submission links.
///
/// Storage failures are logged and reported as `None`/`false`; nothing is
/// retried.
#[derive(Clone)]
pub struct FormIdentifierService {
    storage: SqliteStorage,
}

impl FormIdentifierService {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    /// The project's current public token, if any.
    pub async fn fetch_existing(&self, project_id: &str) -> Option<String> {
        match self.storage.get_form_identifier(project_id).await {
            Ok(identifier) => identifier.map(|i| i.form_id),
            Err(e) => {
                error!(project_id = %project_id, error = %e, "Failed to fetch form identifier");
                None
            }
        }
    }

    /// Return the existing token or issue a new one.
    pub async fn create_or_update(&self, project_id: &str) -> Option<String> {
        if let Some(existing) = self.fetch_existing(project_id).await {
            return Some(existing);
        }

        let identifier = FormIdentifier::new(project_id, generate_form_id());
        match self.storage.create_form_identifier(&identifier).await {
            Ok(()) => {
                info!(project_id = %project_id, form_id = %identifier.form_id, "Form identifier created");
                Some(identifier.form_id)
            }
            Err(e) => {
                // A concurrent caller may have won the one-to-one constraint.
                warn!(project_id = %project_id, error = %e, "Form identifier insert failed, re-reading");
                self.fetch_existing(project_id).await
            }
        }
    }

    /// Delete the project's token, invalidating previously shared links.
    pub async fn revoke(&self, project_id: &str) -> bool {
        match self.storage.delete_form_identifier(project_id).await {
            Ok(existed) => {
                info!(project_id = %project_id, existed, "Form identifier revoked");
                true
            }
            Err(e) => {
                error!(project_id = %project_id, error = %e, "Failed to revoke form identifier");
                false
            }
        }
    }

    /// Resolve a public token to its project.
    pub async fn resolve_project(&self, form_id: &str) -> Option<String> {
        match self.storage.find_project_by_form_id(form_id).await {
            Ok(project_id) => project_id,
            Err(e) => {
                error!(form_id = %form_id, error = %e, "Failed to resolve form identifier");
                None
            }
        }
    }
}

/// Public submission URL for a form id.
pub fn submission_url(base_url: &str, form_id: &str) -> String {
    format!("{}/submit-story/{}", base_url.trim_end_matches('/'), form_id)
}

/// Generate a short random token.
pub fn generate_form_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(FORM_ID_LENGTH)
        .map(char::from)
        .collect()
}
