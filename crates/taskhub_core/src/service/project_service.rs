//! Project lifecycle use-cases.
//!
//! # Responsibility
//! - Create projects and record the creator.
//! - Gate project updates, status moves and deletion through authorization.
//!
//! # Invariants
//! - Creation is open to any authenticated actor; the actor becomes creator.
//! - Status moves are forward only except the explicit `reopen`.
//! - Deleting a project cascades to every owned row.

use crate::authz::{Action, AuthorizationEngine};
use crate::model::principal::Principal;
use crate::model::project::{Project, ProjectDraft, ProjectId, ProjectStatus};
use crate::model::stage::StageId;
use crate::model::validation::ValidationError;
use crate::repo::project_repo::{ProjectListQuery, ProjectRepository, SqliteProjectRepository};
use crate::repo::stage_repo::{SqliteStageRepository, StageRepository};
use crate::repo::{ensure_schema_ready, EntityKind};
use crate::service::{begin_write, require, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;

/// Service facade for projects.
pub struct ProjectService<'conn> {
    conn: &'conn mut Connection,
    engine: AuthorizationEngine,
}

impl<'conn> ProjectService<'conn> {
    pub fn try_new(
        conn: &'conn mut Connection,
        engine: AuthorizationEngine,
    ) -> ServiceResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, engine })
    }

    /// Creates a project in `INIT` status owned by `actor`.
    pub fn create_project(
        &mut self,
        actor: &Principal,
        draft: &ProjectDraft,
    ) -> ServiceResult<Project> {
        let tx = begin_write(self.conn)?;
        let project = SqliteProjectRepository::new(&tx).insert_project(draft, actor)?;
        tx.commit()?;
        info!(
            "event=project_create module=service status=ok project_id={} creator_type={}",
            project.id,
            actor.kind().as_str()
        );
        Ok(project)
    }

    pub fn get_project(&self, actor: &Principal, id: ProjectId) -> ServiceResult<Project> {
        require(&self.engine, self.conn, actor, id, Action::ViewProject)?;
        load_project(&SqliteProjectRepository::new(self.conn), id)
    }

    /// Lists project metadata. Not gated.
    pub fn list_projects(&self, query: &ProjectListQuery) -> ServiceResult<Vec<Project>> {
        Ok(SqliteProjectRepository::new(self.conn).list_projects(query)?)
    }

    /// Replaces name and description.
    pub fn update_project(
        &mut self,
        actor: &Principal,
        id: ProjectId,
        draft: &ProjectDraft,
    ) -> ServiceResult<Project> {
        let tx = begin_write(self.conn)?;
        require(&self.engine, &tx, actor, id, Action::UpdateProject)?;
        let project = SqliteProjectRepository::new(&tx).update_details(id, draft)?;
        tx.commit()?;
        info!("event=project_update module=service status=ok project_id={id}");
        Ok(project)
    }

    /// Moves the project forward to `target`. Same status is a no-op.
    pub fn change_status(
        &mut self,
        actor: &Principal,
        id: ProjectId,
        target: ProjectStatus,
    ) -> ServiceResult<Project> {
        self.transition(actor, id, |current| current.advance_to(target))
    }

    /// Moves a `COMPLETED` or `ARCHIVED` project back to `ACTIVE`.
    pub fn reopen(&mut self, actor: &Principal, id: ProjectId) -> ServiceResult<Project> {
        self.transition(actor, id, ProjectStatus::reopen)
    }

    fn transition(
        &mut self,
        actor: &Principal,
        id: ProjectId,
        next: impl FnOnce(ProjectStatus) -> Result<ProjectStatus, ValidationError>,
    ) -> ServiceResult<Project> {
        let tx = begin_write(self.conn)?;
        require(&self.engine, &tx, actor, id, Action::ChangeProjectStatus)?;
        let projects = SqliteProjectRepository::new(&tx);
        let current = load_project(&projects, id)?;
        let target = next(current.status)?;
        if target == current.status {
            return Ok(current);
        }
        let project = projects.set_status(id, target)?;
        tx.commit()?;
        info!(
            "event=project_status module=service status=ok project_id={id} from={} to={}",
            current.status.as_str(),
            target.as_str()
        );
        Ok(project)
    }

    /// Points the project at one of its stages, or clears the pointer.
    pub fn set_current_stage(
        &mut self,
        actor: &Principal,
        id: ProjectId,
        stage_id: Option<StageId>,
    ) -> ServiceResult<Project> {
        let tx = begin_write(self.conn)?;
        require(&self.engine, &tx, actor, id, Action::UpdateProject)?;
        if let Some(stage_id) = stage_id {
            if !SqliteStageRepository::new(&tx).stage_in_project(id, stage_id)? {
                return Err(ServiceError::DanglingReference {
                    entity: EntityKind::Stage,
                    id: stage_id.to_string(),
                });
            }
        }
        let project = SqliteProjectRepository::new(&tx).set_current_stage(id, stage_id)?;
        tx.commit()?;
        info!("event=project_stage module=service status=ok project_id={id}");
        Ok(project)
    }

    /// Deletes the project and everything it owns.
    pub fn delete_project(&mut self, actor: &Principal, id: ProjectId) -> ServiceResult<()> {
        let tx = begin_write(self.conn)?;
        require(&self.engine, &tx, actor, id, Action::DeleteProject)?;
        SqliteProjectRepository::new(&tx).delete_project(id)?;
        tx.commit()?;
        info!("event=project_delete module=service status=ok project_id={id}");
        Ok(())
    }
}

fn load_project(projects: &SqliteProjectRepository<'_>, id: ProjectId) -> ServiceResult<Project> {
    projects.get_project(id)?.ok_or_else(|| ServiceError::NotFound {
        entity: EntityKind::Project,
        id: id.to_string(),
    })
}
