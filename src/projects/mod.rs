//! Project management with ownership checks.
//!
//! Row-level security of the hosted database is mirrored here: only the
//! owner (or a super admin) may change a project, and only super admins may
//! create or edit templates. Violations surface as
//! [`StorageError::PermissionDenied`] (code `42501`).

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{StorageError, StorageResult};
use crate::storage::{Project, SqliteStorage, Storage, UserRole};
use crate::templates::{ProjectView, TemplateCloner};

/// The user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    fn may_modify(&self, project: &Project) -> bool {
        if project.is_template {
            return self.role == UserRole::SuperAdmin;
        }
        self.role == UserRole::SuperAdmin || project.user_id == self.user_id
    }
}

/// Project CRUD plus template-aware viewing.
#[derive(Clone)]
pub struct ProjectService {
    storage: SqliteStorage,
    cloner: TemplateCloner,
}

impl ProjectService {
    pub fn new(storage: SqliteStorage, cloner: TemplateCloner) -> Self {
        Self { storage, cloner }
    }

    /// Look up an actor's role; unknown users are regular users.
    pub async fn actor(&self, user_id: &str) -> StorageResult<Actor> {
        let role = self.storage.get_user_role(user_id).await?.unwrap_or_default();
        Ok(Actor::new(user_id, role))
    }

    /// Create a project owned by the actor.
    pub async fn create(&self, actor: &Actor, project: Project) -> StorageResult<Project> {
        let mut project = project;
        project.user_id = actor.user_id.clone();

        if project.is_template && actor.role != UserRole::SuperAdmin {
            return Err(permission_denied(actor, "only super admins can create templates"));
        }

        self.storage.create_project(&project).await?;
        info!(project_id = %project.id, user_id = %actor.user_id, "Project created");
        Ok(project)
    }

    /// Get a project by id.
    pub async fn get(&self, project_id: &str) -> StorageResult<Project> {
        self.storage
            .get_project(project_id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: "Project",
                id: project_id.to_string(),
            })
    }

    /// Projects the user owns plus all templates.
    pub async fn list_for_user(&self, user_id: &str) -> StorageResult<Vec<Project>> {
        self.storage.list_projects(user_id).await
    }

    /// Update name, description or template flag.
    pub async fn update(&self, actor: &Actor, project: &Project) -> StorageResult<Project> {
        let existing = self.get(&project.id).await?;
        if !actor.may_modify(&existing) || (project.is_template && actor.role != UserRole::SuperAdmin) {
            return Err(permission_denied(actor, "cannot modify this project"));
        }

        let mut updated = project.clone();
        updated.user_id = existing.user_id;
        updated.created_at = existing.created_at;
        updated.updated_at = Utc::now();

        self.storage.update_project(&updated).await?;
        info!(project_id = %updated.id, "Project updated");
        Ok(updated)
    }

    /// Delete a project and all of its data.
    pub async fn delete(&self, actor: &Actor, project_id: &str) -> StorageResult<()> {
        let existing = self.get(project_id).await?;
        if !actor.may_modify(&existing) {
            return Err(permission_denied(actor, "cannot delete this project"));
        }

        self.storage.delete_project(project_id).await?;
        info!(project_id = %project_id, "Project deleted");
        Ok(())
    }

    /// Open a project as the actor sees it (live, or a local template clone).
    pub async fn open(&self, actor: &Actor, project_id: &str) -> StorageResult<ProjectView> {
        let project = self.get(project_id).await?;
        Ok(self
            .cloner
            .view_project(&project, &actor.user_id, actor.role.is_admin()))
    }
}

fn permission_denied(actor: &Actor, message: &str) -> StorageError {
    warn!(user_id = %actor.user_id, role = %actor.role, "Permission denied: {}", message);
    StorageError::PermissionDenied {
        message: message.to_string(),
    }
}
