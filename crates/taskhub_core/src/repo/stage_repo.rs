//! Stage repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Every write records the acting principal as `last_modifier`.
//! - Deleting a stage detaches its tasks and clears the project's current
//!   stage pointer when it named the deleted stage.

use crate::model::principal::Principal;
use crate::model::project::ProjectId;
use crate::model::stage::{Stage, StageDraft, StageId, StageStatus};
use crate::repo::common::{
    invalid_enum, principal_columns, uuid_column, EntityKind, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const STAGE_SELECT_SQL: &str = "SELECT
    id,
    project_id,
    name,
    status,
    start_date,
    end_date,
    modifier_type,
    modifier_id,
    created_at,
    updated_at
FROM stages";

/// Repository interface for project stages.
pub trait StageRepository {
    fn insert_stage(
        &self,
        project_id: ProjectId,
        draft: &StageDraft,
        modifier: &Principal,
    ) -> RepoResult<Stage>;
    fn get_stage(&self, id: StageId) -> RepoResult<Option<Stage>>;
    /// Lists stages of a project in creation order.
    fn list_stages(&self, project_id: ProjectId) -> RepoResult<Vec<Stage>>;
    fn update_stage(
        &self,
        id: StageId,
        draft: &StageDraft,
        modifier: &Principal,
    ) -> RepoResult<Stage>;
    fn set_status(
        &self,
        id: StageId,
        status: StageStatus,
        modifier: &Principal,
    ) -> RepoResult<Stage>;
    fn delete_stage(&self, id: StageId) -> RepoResult<()>;
    /// Returns whether `id` names a stage of `project_id`.
    fn stage_in_project(&self, project_id: ProjectId, id: StageId) -> RepoResult<bool>;
}

/// SQLite-backed stage repository.
pub struct SqliteStageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStageRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_required(&self, id: StageId) -> RepoResult<Stage> {
        self.get_stage(id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Stage, id))
    }
}

impl StageRepository for SqliteStageRepository<'_> {
    fn insert_stage(
        &self,
        project_id: ProjectId,
        draft: &StageDraft,
        modifier: &Principal,
    ) -> RepoResult<Stage> {
        let draft = draft.validated()?;
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO stages (
                id,
                project_id,
                name,
                status,
                start_date,
                end_date,
                modifier_type,
                modifier_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id.to_string(),
                project_id.to_string(),
                draft.name,
                StageStatus::NotStarted.as_str(),
                draft.start_date,
                draft.end_date,
                modifier.kind().as_str(),
                modifier.id().as_str(),
            ],
        )?;
        self.load_required(id)
    }

    fn get_stage(&self, id: StageId) -> RepoResult<Option<Stage>> {
        self.conn
            .query_row(
                &format!("{STAGE_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_stage_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_stages(&self, project_id: ProjectId) -> RepoResult<Vec<Stage>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STAGE_SELECT_SQL}
             WHERE project_id = ?1
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([project_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_stage_row(row)?);
        }
        Ok(items)
    }

    fn update_stage(
        &self,
        id: StageId,
        draft: &StageDraft,
        modifier: &Principal,
    ) -> RepoResult<Stage> {
        let draft = draft.validated()?;
        let changed = self.conn.execute(
            "UPDATE stages
             SET name = ?2,
                 start_date = ?3,
                 end_date = ?4,
                 modifier_type = ?5,
                 modifier_id = ?6,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id.to_string(),
                draft.name,
                draft.start_date,
                draft.end_date,
                modifier.kind().as_str(),
                modifier.id().as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Stage, id));
        }
        self.load_required(id)
    }

    fn set_status(
        &self,
        id: StageId,
        status: StageStatus,
        modifier: &Principal,
    ) -> RepoResult<Stage> {
        let changed = self.conn.execute(
            "UPDATE stages
             SET status = ?2,
                 modifier_type = ?3,
                 modifier_id = ?4,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id.to_string(),
                status.as_str(),
                modifier.kind().as_str(),
                modifier.id().as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Stage, id));
        }
        self.load_required(id)
    }

    fn delete_stage(&self, id: StageId) -> RepoResult<()> {
        // The FK would null these as well, but without touching `updated_at`.
        self.conn.execute(
            "UPDATE tasks
             SET stage_id = NULL,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE stage_id = ?1;",
            [id.to_string()],
        )?;
        self.conn.execute(
            "UPDATE projects
             SET current_stage_id = NULL,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE current_stage_id = ?1;",
            [id.to_string()],
        )?;

        let changed = self
            .conn
            .execute("DELETE FROM stages WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Stage, id));
        }
        Ok(())
    }

    fn stage_in_project(&self, project_id: ProjectId, id: StageId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM stages WHERE id = ?1 AND project_id = ?2
            );",
            params![id.to_string(), project_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_stage_row(row: &Row<'_>) -> RepoResult<Stage> {
    let status_text: String = row.get("status")?;
    let status = StageStatus::parse(&status_text)
        .ok_or_else(|| invalid_enum(&status_text, "stages.status"))?;

    Ok(Stage {
        id: uuid_column(row, "id")?,
        project_id: uuid_column(row, "project_id")?,
        name: row.get("name")?,
        status,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        last_modifier: principal_columns(row, "modifier_type", "modifier_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
