//! Template projects and their per-viewer local clones.
//!
//! Admins always work on the live template. Everyone else gets a shallow
//! copy kept in the local key-value store, created on first view and
//! reused afterwards, so the shared template is never mutated. Clones are
//! never promoted to server-side projects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::KeyValueStore;
use crate::storage::Project;

const CLONE_KEY_PREFIX: &str = "template-clone";

/// Local copy of a template project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateClone {
    /// Always `true`; marks the object as a clone on the wire.
    #[serde(rename = "_clone")]
    pub is_clone: bool,
    pub id: String,
    pub template_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Viewer the clone belongs to.
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl TemplateClone {
    fn from_template(template: &Project, viewer_id: &str) -> Self {
        Self {
            is_clone: true,
            id: Uuid::new_v4().to_string(),
            template_id: template.id.clone(),
            name: template.name.clone(),
            description: template.description.clone(),
            user_id: viewer_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// What a viewer gets when opening a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProjectView {
    Live(Project),
    Clone(TemplateClone),
}

impl ProjectView {
    pub fn is_clone(&self) -> bool {
        matches!(self, ProjectView::Clone(_))
    }

    /// Id of the project or clone.
    pub fn id(&self) -> &str {
        match self {
            ProjectView::Live(project) => &project.id,
            ProjectView::Clone(clone) => &clone.id,
        }
    }
}

/// Hands out live templates to admins and local clones to everyone else.
#[derive(Clone)]
pub struct TemplateCloner {
    store: Arc<dyn KeyValueStore>,
}

impl TemplateCloner {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Resolve what `viewer_id` sees for `project`.
    pub fn view_project(&self, project: &Project, viewer_id: &str, viewer_is_admin: bool) -> ProjectView {
        if !project.is_template || viewer_is_admin {
            return ProjectView::Live(project.clone());
        }

        let key = clone_key(&project.id, viewer_id);
        if let Some(existing) = self.load_clone(&key) {
            return ProjectView::Clone(existing);
        }

        let clone = TemplateClone::from_template(project, viewer_id);
        match serde_json::to_string(&clone) {
            Ok(raw) => self.store.set(&key, raw),
            Err(e) => warn!(template_id = %project.id, error = %e, "Failed to persist template clone"),
        }
        info!(template_id = %project.id, clone_id = %clone.id, viewer = %viewer_id, "Template cloned");
        ProjectView::Clone(clone)
    }

    /// The viewer's existing clone of a template, if any.
    pub fn existing_clone(&self, template_id: &str, viewer_id: &str) -> Option<TemplateClone> {
        self.load_clone(&clone_key(template_id, viewer_id))
    }

    fn load_clone(&self, key: &str) -> Option<TemplateClone> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(clone) => Some(clone),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding corrupt template clone");
                self.store.remove(key);
                None
            }
        }
    }
}

fn clone_key(template_id: &str, viewer_id: &str) -> String {
    format!("{}:{}:{}", CLONE_KEY_PREFIX, template_id, viewer_id)
}
