//! Stage use-cases.
//!
//! # Invariants
//! - The acting principal is recorded as `last_modifier` on create and on
//!   every update.
//! - Deleting a stage keeps its tasks; they lose the stage reference.

use crate::authz::{Action, AuthorizationEngine};
use crate::model::principal::Principal;
use crate::model::project::ProjectId;
use crate::model::stage::{Stage, StageDraft, StageId, StageStatus};
use crate::repo::stage_repo::{SqliteStageRepository, StageRepository};
use crate::repo::{ensure_schema_ready, EntityKind};
use crate::service::{begin_write, require, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;

/// Service facade for project stages.
pub struct StageService<'conn> {
    conn: &'conn mut Connection,
    engine: AuthorizationEngine,
}

impl<'conn> StageService<'conn> {
    pub fn try_new(
        conn: &'conn mut Connection,
        engine: AuthorizationEngine,
    ) -> ServiceResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, engine })
    }

    pub fn create_stage(
        &mut self,
        actor: &Principal,
        project_id: ProjectId,
        draft: &StageDraft,
    ) -> ServiceResult<Stage> {
        let tx = begin_write(self.conn)?;
        require(&self.engine, &tx, actor, project_id, Action::CreateStage)?;
        let stage = SqliteStageRepository::new(&tx).insert_stage(project_id, draft, actor)?;
        tx.commit()?;
        info!(
            "event=stage_create module=service status=ok project_id={project_id} stage_id={}",
            stage.id
        );
        Ok(stage)
    }

    pub fn list_stages(
        &self,
        actor: &Principal,
        project_id: ProjectId,
    ) -> ServiceResult<Vec<Stage>> {
        require(&self.engine, self.conn, actor, project_id, Action::ViewProject)?;
        Ok(SqliteStageRepository::new(self.conn).list_stages(project_id)?)
    }

    pub fn get_stage(&self, actor: &Principal, id: StageId) -> ServiceResult<Stage> {
        let stage = load_stage(&SqliteStageRepository::new(self.conn), id)?;
        require(&self.engine, self.conn, actor, stage.project_id, Action::ViewProject)?;
        Ok(stage)
    }

    /// Replaces name and dates.
    pub fn update_stage(
        &mut self,
        actor: &Principal,
        id: StageId,
        draft: &StageDraft,
    ) -> ServiceResult<Stage> {
        let tx = begin_write(self.conn)?;
        let stages = SqliteStageRepository::new(&tx);
        let current = load_stage(&stages, id)?;
        require(&self.engine, &tx, actor, current.project_id, Action::UpdateStage)?;
        let stage = stages.update_stage(id, draft, actor)?;
        tx.commit()?;
        info!("event=stage_update module=service status=ok stage_id={id}");
        Ok(stage)
    }

    /// Moves the stage forward to `target`. Same status is a no-op.
    pub fn change_stage_status(
        &mut self,
        actor: &Principal,
        id: StageId,
        target: StageStatus,
    ) -> ServiceResult<Stage> {
        let tx = begin_write(self.conn)?;
        let stages = SqliteStageRepository::new(&tx);
        let current = load_stage(&stages, id)?;
        require(&self.engine, &tx, actor, current.project_id, Action::UpdateStage)?;
        let target = current.status.advance_to(target)?;
        if target == current.status {
            return Ok(current);
        }
        let stage = stages.set_status(id, target, actor)?;
        tx.commit()?;
        info!(
            "event=stage_status module=service status=ok stage_id={id} from={} to={}",
            current.status.as_str(),
            target.as_str()
        );
        Ok(stage)
    }

    /// Deletes the stage; its tasks stay in the project without a stage.
    pub fn delete_stage(&mut self, actor: &Principal, id: StageId) -> ServiceResult<()> {
        let tx = begin_write(self.conn)?;
        let stages = SqliteStageRepository::new(&tx);
        let current = load_stage(&stages, id)?;
        require(&self.engine, &tx, actor, current.project_id, Action::DeleteStage)?;
        stages.delete_stage(id)?;
        tx.commit()?;
        info!(
            "event=stage_delete module=service status=ok project_id={} stage_id={id}",
            current.project_id
        );
        Ok(())
    }
}

fn load_stage(stages: &SqliteStageRepository<'_>, id: StageId) -> ServiceResult<Stage> {
    stages.get_stage(id)?.ok_or_else(|| ServiceError::NotFound {
        entity: EntityKind::Stage,
        id: id.to_string(),
    })
}
