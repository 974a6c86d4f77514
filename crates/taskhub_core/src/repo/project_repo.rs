//! Project repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Deleting a project cascades to stages, tasks, assignees, members and
//!   grants through foreign keys; callers must hold `foreign_keys=ON`.
//! - Every mutation refreshes `updated_at`.

use crate::model::principal::Principal;
use crate::model::project::{Project, ProjectDraft, ProjectId, ProjectStatus};
use crate::model::stage::StageId;
use crate::repo::common::{
    invalid_enum, optional_uuid_column, principal_columns, uuid_column, EntityKind, RepoError,
    RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    status,
    current_stage_id,
    creator_type,
    creator_id,
    created_at,
    updated_at
FROM projects";

/// Filter options for listing projects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectListQuery {
    pub status: Option<ProjectStatus>,
}

/// Repository interface for project CRUD operations.
pub trait ProjectRepository {
    fn insert_project(&self, draft: &ProjectDraft, creator: &Principal) -> RepoResult<Project>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    /// Lists projects newest first.
    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>>;
    fn update_details(&self, id: ProjectId, draft: &ProjectDraft) -> RepoResult<Project>;
    fn set_status(&self, id: ProjectId, status: ProjectStatus) -> RepoResult<Project>;
    fn set_current_stage(
        &self,
        id: ProjectId,
        stage_id: Option<StageId>,
    ) -> RepoResult<Project>;
    fn delete_project(&self, id: ProjectId) -> RepoResult<()>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_required(&self, id: ProjectId) -> RepoResult<Project> {
        self.get_project(id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Project, id))
    }

    fn check_changed(changed: usize, id: ProjectId) -> RepoResult<()> {
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Project, id));
        }
        Ok(())
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn insert_project(&self, draft: &ProjectDraft, creator: &Principal) -> RepoResult<Project> {
        let draft = draft.validated()?;
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO projects (
                id,
                name,
                description,
                status,
                creator_type,
                creator_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id.to_string(),
                draft.name,
                draft.description,
                ProjectStatus::Init.as_str(),
                creator.kind().as_str(),
                creator.id().as_str(),
            ],
        )?;
        self.load_required(id)
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        self.conn
            .query_row(
                &format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_project_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>> {
        let mut sql = format!("{PROJECT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC, id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_project_row(row)?);
        }
        Ok(items)
    }

    fn update_details(&self, id: ProjectId, draft: &ProjectDraft) -> RepoResult<Project> {
        let draft = draft.validated()?;
        let changed = self.conn.execute(
            "UPDATE projects
             SET name = ?2,
                 description = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), draft.name, draft.description],
        )?;
        Self::check_changed(changed, id)?;
        self.load_required(id)
    }

    fn set_status(&self, id: ProjectId, status: ProjectStatus) -> RepoResult<Project> {
        let changed = self.conn.execute(
            "UPDATE projects
             SET status = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), status.as_str()],
        )?;
        Self::check_changed(changed, id)?;
        self.load_required(id)
    }

    fn set_current_stage(
        &self,
        id: ProjectId,
        stage_id: Option<StageId>,
    ) -> RepoResult<Project> {
        let changed = self.conn.execute(
            "UPDATE projects
             SET current_stage_id = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), stage_id.map(|value| value.to_string())],
        )?;
        Self::check_changed(changed, id)?;
        self.load_required(id)
    }

    fn delete_project(&self, id: ProjectId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [id.to_string()])?;
        Self::check_changed(changed, id)
    }
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let status_text: String = row.get("status")?;
    let status = ProjectStatus::parse(&status_text)
        .ok_or_else(|| invalid_enum(&status_text, "projects.status"))?;

    Ok(Project {
        id: uuid_column(row, "id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        status,
        current_stage_id: optional_uuid_column(row, "current_stage_id")?,
        creator: principal_columns(row, "creator_type", "creator_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
