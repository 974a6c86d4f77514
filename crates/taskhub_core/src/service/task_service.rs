//! Task and assignee use-cases.
//!
//! # Responsibility
//! - Create tasks atomically with their initial assignees.
//! - Gate task and assignee mutations through authorization.
//!
//! # Invariants
//! - A task and all draft assignees commit together or not at all.
//! - Task-keyed and assignee-keyed calls authorize against the owning
//!   project after resolving the target.

use crate::authz::{Action, AuthorizationEngine};
use crate::model::member::normalize_role;
use crate::model::principal::Principal;
use crate::model::project::ProjectId;
use crate::model::stage::StageId;
use crate::model::task::{
    AssigneeDraft, AssigneeId, Task, TaskAssignee, TaskDraft, TaskId, TaskStatus, TaskUpdate,
};
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use crate::repo::{ensure_schema_ready, EntityKind};
use crate::service::{begin_write, require, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;

/// Service facade for tasks and their assignees.
pub struct TaskService<'conn> {
    conn: &'conn mut Connection,
    engine: AuthorizationEngine,
}

impl<'conn> TaskService<'conn> {
    pub fn try_new(
        conn: &'conn mut Connection,
        engine: AuthorizationEngine,
    ) -> ServiceResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, engine })
    }

    /// Creates a task with every assignee in `draft`, or nothing on failure.
    pub fn create_task(
        &mut self,
        actor: &Principal,
        project_id: ProjectId,
        draft: &TaskDraft,
    ) -> ServiceResult<Task> {
        let tx = begin_write(self.conn)?;
        require(&self.engine, &tx, actor, project_id, Action::CreateTask)?;
        let task = SqliteTaskRepository::new(&tx).insert_task(project_id, draft)?;
        tx.commit()?;
        info!(
            "event=task_create module=service status=ok project_id={project_id} task_id={} assignees={}",
            task.id,
            task.assignees.len()
        );
        Ok(task)
    }

    pub fn get_task(&self, actor: &Principal, id: TaskId) -> ServiceResult<Task> {
        let task = load_task(&SqliteTaskRepository::new(self.conn), id)?;
        require(&self.engine, self.conn, actor, task.project_id, Action::ViewProject)?;
        Ok(task)
    }

    /// Lists project tasks, optionally only those in `stage_id`.
    pub fn list_tasks(
        &self,
        actor: &Principal,
        project_id: ProjectId,
        stage_id: Option<StageId>,
    ) -> ServiceResult<Vec<Task>> {
        require(&self.engine, self.conn, actor, project_id, Action::ViewProject)?;
        Ok(SqliteTaskRepository::new(self.conn).list_tasks(project_id, stage_id)?)
    }

    pub fn update_task(
        &mut self,
        actor: &Principal,
        id: TaskId,
        update: &TaskUpdate,
    ) -> ServiceResult<Task> {
        let tx = begin_write(self.conn)?;
        let tasks = SqliteTaskRepository::new(&tx);
        let current = load_task(&tasks, id)?;
        require(&self.engine, &tx, actor, current.project_id, Action::UpdateTask)?;
        let task = tasks.update_task(id, update)?;
        tx.commit()?;
        info!("event=task_update module=service status=ok task_id={id}");
        Ok(task)
    }

    /// Moves the task forward to `target`. Same status is a no-op.
    pub fn change_task_status(
        &mut self,
        actor: &Principal,
        id: TaskId,
        target: TaskStatus,
    ) -> ServiceResult<Task> {
        let tx = begin_write(self.conn)?;
        let tasks = SqliteTaskRepository::new(&tx);
        let current = load_task(&tasks, id)?;
        require(&self.engine, &tx, actor, current.project_id, Action::UpdateTask)?;
        let target = current.status.advance_to(target)?;
        if target == current.status {
            return Ok(current);
        }
        let task = tasks.set_status(id, target)?;
        tx.commit()?;
        info!(
            "event=task_status module=service status=ok task_id={id} from={} to={}",
            current.status.as_str(),
            target.as_str()
        );
        Ok(task)
    }

    /// Deletes the task and its assignees.
    pub fn delete_task(&mut self, actor: &Principal, id: TaskId) -> ServiceResult<()> {
        let tx = begin_write(self.conn)?;
        let tasks = SqliteTaskRepository::new(&tx);
        let current = load_task(&tasks, id)?;
        require(&self.engine, &tx, actor, current.project_id, Action::DeleteTask)?;
        tasks.delete_task(id)?;
        tx.commit()?;
        info!("event=task_delete module=service status=ok task_id={id}");
        Ok(())
    }

    pub fn add_assignee(
        &mut self,
        actor: &Principal,
        task_id: TaskId,
        draft: &AssigneeDraft,
    ) -> ServiceResult<TaskAssignee> {
        let tx = begin_write(self.conn)?;
        let tasks = SqliteTaskRepository::new(&tx);
        let task = load_task(&tasks, task_id)?;
        require(&self.engine, &tx, actor, task.project_id, Action::AssignTask)?;
        let assignee = tasks.insert_assignee(task_id, draft)?;
        tx.commit()?;
        info!(
            "event=assignee_add module=service status=ok task_id={task_id} assignee_id={}",
            assignee.id
        );
        Ok(assignee)
    }

    pub fn list_assignees(
        &self,
        actor: &Principal,
        task_id: TaskId,
    ) -> ServiceResult<Vec<TaskAssignee>> {
        let tasks = SqliteTaskRepository::new(self.conn);
        let task = load_task(&tasks, task_id)?;
        require(&self.engine, self.conn, actor, task.project_id, Action::ViewProject)?;
        Ok(task.assignees)
    }

    /// Replaces the assignee's role label.
    pub fn update_assignee(
        &mut self,
        actor: &Principal,
        id: AssigneeId,
        role: &str,
    ) -> ServiceResult<TaskAssignee> {
        let role = normalize_role(role)?;
        let tx = begin_write(self.conn)?;
        let tasks = SqliteTaskRepository::new(&tx);
        let project_id = owning_project(&tasks, id)?;
        require(&self.engine, &tx, actor, project_id, Action::AssignTask)?;
        let assignee = tasks.update_assignee_role(id, &role)?;
        tx.commit()?;
        info!("event=assignee_update module=service status=ok assignee_id={id}");
        Ok(assignee)
    }

    pub fn remove_assignee(&mut self, actor: &Principal, id: AssigneeId) -> ServiceResult<()> {
        let tx = begin_write(self.conn)?;
        let tasks = SqliteTaskRepository::new(&tx);
        let project_id = owning_project(&tasks, id)?;
        require(&self.engine, &tx, actor, project_id, Action::AssignTask)?;
        tasks.delete_assignee(id)?;
        tx.commit()?;
        info!("event=assignee_remove module=service status=ok assignee_id={id}");
        Ok(())
    }
}

fn load_task(tasks: &SqliteTaskRepository<'_>, id: TaskId) -> ServiceResult<Task> {
    tasks.get_task(id)?.ok_or_else(|| ServiceError::NotFound {
        entity: EntityKind::Task,
        id: id.to_string(),
    })
}

fn owning_project(tasks: &SqliteTaskRepository<'_>, id: AssigneeId) -> ServiceResult<ProjectId> {
    let assignee = tasks.get_assignee(id)?.ok_or_else(|| ServiceError::NotFound {
        entity: EntityKind::Assignee,
        id: id.to_string(),
    })?;
    Ok(load_task(tasks, assignee.task_id)?.project_id)
}
