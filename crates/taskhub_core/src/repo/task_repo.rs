//! Task and assignee repository.
//!
//! # Responsibility
//! - Persist tasks together with their initial assignee set.
//! - Provide CRUD for assignees owned by a task.
//!
//! # Invariants
//! - A task's stage, when set, belongs to the task's project.
//! - `(task, principal)` is unique among assignees.
//! - `insert_task` writes several rows; atomicity comes from the caller's
//!   transaction, so a failing assignee leaves nothing behind.

use crate::model::principal::Principal;
use crate::model::project::ProjectId;
use crate::model::stage::StageId;
use crate::model::task::{
    AssigneeDraft, AssigneeId, Task, TaskAssignee, TaskDraft, TaskId, TaskStatus, TaskUpdate,
};
use crate::repo::common::{
    invalid_enum, optional_uuid_column, principal_columns, uuid_column, ConflictKind, EntityKind,
    RepoError, RepoResult,
};
use crate::repo::stage_repo::{SqliteStageRepository, StageRepository};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    project_id,
    stage_id,
    name,
    description,
    status,
    priority,
    created_at,
    updated_at
FROM tasks";

const ASSIGNEE_SELECT_SQL: &str = "SELECT
    id,
    task_id,
    assignee_type,
    assignee_id,
    role,
    created_at
FROM task_assignees";

/// Repository interface for tasks and their assignees.
pub trait TaskRepository {
    /// Inserts a task and all draft assignees.
    fn insert_task(&self, project_id: ProjectId, draft: &TaskDraft) -> RepoResult<Task>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Lists project tasks in creation order, optionally narrowed to a stage.
    fn list_tasks(
        &self,
        project_id: ProjectId,
        stage_id: Option<StageId>,
    ) -> RepoResult<Vec<Task>>;
    fn update_task(&self, id: TaskId, update: &TaskUpdate) -> RepoResult<Task>;
    fn set_status(&self, id: TaskId, status: TaskStatus) -> RepoResult<Task>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    fn insert_assignee(
        &self,
        task_id: TaskId,
        draft: &AssigneeDraft,
    ) -> RepoResult<TaskAssignee>;
    fn get_assignee(&self, id: AssigneeId) -> RepoResult<Option<TaskAssignee>>;
    fn list_assignees(&self, task_id: TaskId) -> RepoResult<Vec<TaskAssignee>>;
    fn update_assignee_role(&self, id: AssigneeId, role: &str) -> RepoResult<TaskAssignee>;
    fn delete_assignee(&self, id: AssigneeId) -> RepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_required(&self, id: TaskId) -> RepoResult<Task> {
        self.get_task(id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Task, id))
    }

    fn load_assignee(&self, id: AssigneeId) -> RepoResult<TaskAssignee> {
        self.get_assignee(id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Assignee, id))
    }

    /// Assignee writes count as task mutations.
    fn touch_task(&self, id: TaskId) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE tasks SET updated_at = (strftime('%s', 'now') * 1000) WHERE id = ?1;",
            [id.to_string()],
        )?;
        Ok(())
    }

    fn ensure_stage_in_project(
        &self,
        project_id: ProjectId,
        stage_id: Option<StageId>,
    ) -> RepoResult<()> {
        let Some(stage_id) = stage_id else {
            return Ok(());
        };
        let stages = SqliteStageRepository::new(self.conn);
        if !stages.stage_in_project(project_id, stage_id)? {
            return Err(RepoError::DanglingReference {
                entity: EntityKind::Stage,
                id: stage_id,
            });
        }
        Ok(())
    }

    fn is_assigned(&self, task_id: TaskId, principal: &Principal) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM task_assignees
                WHERE task_id = ?1 AND assignee_type = ?2 AND assignee_id = ?3
            );",
            params![
                task_id.to_string(),
                principal.kind().as_str(),
                principal.id().as_str(),
            ],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn write_assignee(&self, task_id: TaskId, draft: &AssigneeDraft) -> RepoResult<AssigneeId> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO task_assignees (
                id,
                task_id,
                assignee_type,
                assignee_id,
                role
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                id.to_string(),
                task_id.to_string(),
                draft.assignee.kind().as_str(),
                draft.assignee.id().as_str(),
                draft.role,
            ],
        )?;
        Ok(id)
    }

    fn hydrate(&self, mut task: Task) -> RepoResult<Task> {
        task.assignees = self.list_assignees(task.id)?;
        Ok(task)
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn insert_task(&self, project_id: ProjectId, draft: &TaskDraft) -> RepoResult<Task> {
        let draft = draft.validated()?;
        self.ensure_stage_in_project(project_id, draft.fields.stage_id)?;

        let mut seen = HashSet::new();
        for assignee in &draft.assignees {
            if !seen.insert(&assignee.assignee) {
                return Err(RepoError::Conflict(ConflictKind::DuplicateAssignee(
                    assignee.assignee.clone(),
                )));
            }
        }

        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO tasks (
                id,
                project_id,
                stage_id,
                name,
                description,
                status,
                priority
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id.to_string(),
                project_id.to_string(),
                draft.fields.stage_id.map(|value| value.to_string()),
                draft.fields.name,
                draft.fields.description,
                TaskStatus::Todo.as_str(),
                draft.fields.priority,
            ],
        )?;

        for assignee in &draft.assignees {
            self.write_assignee(id, assignee)?;
        }

        self.load_required(id)
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!("{TASK_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_task_row(row)),
            )
            .optional()?
            .transpose()?;
        task.map(|task| self.hydrate(task)).transpose()
    }

    fn list_tasks(
        &self,
        project_id: ProjectId,
        stage_id: Option<StageId>,
    ) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE project_id = ?");
        let mut bind_values = vec![Value::Text(project_id.to_string())];
        if let Some(stage_id) = stage_id {
            sql.push_str(" AND stage_id = ?");
            bind_values.push(Value::Text(stage_id.to_string()));
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_task_row(row)?);
        }
        items.into_iter().map(|task| self.hydrate(task)).collect()
    }

    fn update_task(&self, id: TaskId, update: &TaskUpdate) -> RepoResult<Task> {
        let update = update.validated()?;
        let current = self.load_required(id)?;
        self.ensure_stage_in_project(current.project_id, update.stage_id)?;

        self.conn.execute(
            "UPDATE tasks
             SET name = ?2,
                 description = ?3,
                 stage_id = ?4,
                 priority = ?5,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id.to_string(),
                update.name,
                update.description,
                update.stage_id.map(|value| value.to_string()),
                update.priority,
            ],
        )?;
        self.load_required(id)
    }

    fn set_status(&self, id: TaskId, status: TaskStatus) -> RepoResult<Task> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET status = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), status.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Task, id));
        }
        self.load_required(id)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Task, id));
        }
        Ok(())
    }

    fn insert_assignee(
        &self,
        task_id: TaskId,
        draft: &AssigneeDraft,
    ) -> RepoResult<TaskAssignee> {
        let draft = draft.validated()?;
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1);",
            [task_id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::not_found(EntityKind::Task, task_id));
        }
        if self.is_assigned(task_id, &draft.assignee)? {
            return Err(RepoError::Conflict(ConflictKind::DuplicateAssignee(
                draft.assignee,
            )));
        }

        let id = self.write_assignee(task_id, &draft)?;
        self.touch_task(task_id)?;
        self.load_assignee(id)
    }

    fn get_assignee(&self, id: AssigneeId) -> RepoResult<Option<TaskAssignee>> {
        self.conn
            .query_row(
                &format!("{ASSIGNEE_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_assignee_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_assignees(&self, task_id: TaskId) -> RepoResult<Vec<TaskAssignee>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ASSIGNEE_SELECT_SQL}
             WHERE task_id = ?1
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([task_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_assignee_row(row)?);
        }
        Ok(items)
    }

    fn update_assignee_role(&self, id: AssigneeId, role: &str) -> RepoResult<TaskAssignee> {
        let current = self.load_assignee(id)?;
        self.conn.execute(
            "UPDATE task_assignees SET role = ?2 WHERE id = ?1;",
            params![id.to_string(), role],
        )?;
        self.touch_task(current.task_id)?;
        self.load_assignee(id)
    }

    fn delete_assignee(&self, id: AssigneeId) -> RepoResult<()> {
        let current = self.load_assignee(id)?;
        self.conn
            .execute("DELETE FROM task_assignees WHERE id = ?1;", [id.to_string()])?;
        self.touch_task(current.task_id)
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let status_text: String = row.get("status")?;
    let status = TaskStatus::parse(&status_text)
        .ok_or_else(|| invalid_enum(&status_text, "tasks.status"))?;

    Ok(Task {
        id: uuid_column(row, "id")?,
        project_id: uuid_column(row, "project_id")?,
        stage_id: optional_uuid_column(row, "stage_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        status,
        priority: row.get("priority")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        assignees: Vec::new(),
    })
}

fn parse_assignee_row(row: &Row<'_>) -> RepoResult<TaskAssignee> {
    Ok(TaskAssignee {
        id: uuid_column(row, "id")?,
        task_id: uuid_column(row, "task_id")?,
        assignee: principal_columns(row, "assignee_type", "assignee_id")?,
        role: row.get("role")?,
        created_at: row.get("created_at")?,
    })
}
