//! Task and assignee models.
//!
//! # Responsibility
//! - Define the task record and the assignees it owns.
//! - Validate task/assignee drafts, including the 1..=5 priority range.
//!
//! # Invariants
//! - Assignees are owned by their task and never outlive it.
//! - One principal appears at most once among a task's assignees.
//! - Status only moves forward: `TODO -> IN_PROGRESS -> DONE`.

use crate::model::principal::Principal;
use crate::model::project::ProjectId;
use crate::model::stage::StageId;
use crate::model::validation::{
    forward_only, optional_text, required_text, ValidationError, DESCRIPTION_MAX_CHARS,
    NAME_MAX_CHARS, ROLE_MAX_CHARS,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;
pub type AssigneeId = Uuid;

const PRIORITY_MIN: u8 = 1;
const PRIORITY_MAX: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TODO" => Some(Self::Todo),
            "IN_PROGRESS" => Some(Self::InProgress),
            "DONE" => Some(Self::Done),
            _ => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Todo => 0,
            Self::InProgress => 1,
            Self::Done => 2,
        }
    }

    pub fn advance_to(self, next: Self) -> Result<Self, ValidationError> {
        forward_only(
            "task",
            (self.as_str(), self.rank()),
            (next.as_str(), next.rank()),
        )?;
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssignee {
    pub id: AssigneeId,
    pub task_id: TaskId,
    pub assignee: Principal,
    /// Free-text responsibility label, e.g. `reviewer`.
    pub role: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub stage_id: Option<StageId>,
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Option<u8>,
    pub created_at: i64,
    pub updated_at: i64,
    pub assignees: Vec<TaskAssignee>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssigneeDraft {
    pub assignee: Principal,
    pub role: String,
}

impl AssigneeDraft {
    pub fn new(assignee: Principal, role: impl Into<String>) -> Self {
        Self {
            assignee,
            role: role.into(),
        }
    }

    pub fn validated(&self) -> Result<Self, ValidationError> {
        Ok(Self {
            assignee: self.assignee.clone(),
            role: required_text("role", &self.role, ROLE_MAX_CHARS)?,
        })
    }
}

/// Editable task fields shared by create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stage_id: Option<StageId>,
    #[serde(default)]
    pub priority: Option<u8>,
}

impl TaskUpdate {
    pub fn validated(&self) -> Result<Self, ValidationError> {
        if let Some(priority) = self.priority {
            if !(PRIORITY_MIN..=PRIORITY_MAX).contains(&priority) {
                return Err(ValidationError::PriorityOutOfRange(priority));
            }
        }
        Ok(Self {
            name: required_text("name", &self.name, NAME_MAX_CHARS)?,
            description: optional_text(
                "description",
                self.description.as_deref(),
                DESCRIPTION_MAX_CHARS,
            )?,
            stage_id: self.stage_id,
            priority: self.priority,
        })
    }
}

/// Client input for creating a task together with its initial assignees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    #[serde(flatten)]
    pub fields: TaskUpdate,
    #[serde(default)]
    pub assignees: Vec<AssigneeDraft>,
}

impl TaskDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            fields: TaskUpdate {
                name: name.into(),
                ..TaskUpdate::default()
            },
            assignees: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage_id: StageId) -> Self {
        self.fields.stage_id = Some(stage_id);
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.fields.priority = Some(priority);
        self
    }

    pub fn with_assignee(mut self, assignee: Principal, role: impl Into<String>) -> Self {
        self.assignees.push(AssigneeDraft::new(assignee, role));
        self
    }

    pub fn validated(&self) -> Result<Self, ValidationError> {
        let assignees = self
            .assignees
            .iter()
            .map(AssigneeDraft::validated)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            fields: self.fields.validated()?,
            assignees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{TaskDraft, TaskStatus};
    use crate::model::principal::Principal;
    use crate::model::validation::ValidationError;

    #[test]
    fn priority_must_be_between_one_and_five() {
        assert!(TaskDraft::new("ship").with_priority(1).validated().is_ok());
        assert!(TaskDraft::new("ship").with_priority(5).validated().is_ok());
        assert_eq!(
            TaskDraft::new("ship").with_priority(0).validated().unwrap_err(),
            ValidationError::PriorityOutOfRange(0)
        );
        assert_eq!(
            TaskDraft::new("ship").with_priority(6).validated().unwrap_err(),
            ValidationError::PriorityOutOfRange(6)
        );
    }

    #[test]
    fn assignee_role_is_validated() {
        let draft = TaskDraft::new("ship").with_assignee(Principal::user("u1").unwrap(), " ");
        assert_eq!(
            draft.validated().unwrap_err(),
            ValidationError::EmptyField("role")
        );
    }

    #[test]
    fn draft_wire_shape_is_flat() {
        let json = serde_json::json!({
            "name": "Write docs",
            "priority": 2,
            "assignees": [
                {"assignee": {"type": "AGENT", "id": "writer"}, "role": "author"}
            ]
        });
        let draft: TaskDraft = serde_json::from_value(json).unwrap();
        assert_eq!(draft.fields.name, "Write docs");
        assert_eq!(draft.fields.priority, Some(2));
        assert_eq!(draft.assignees.len(), 1);
        assert_eq!(
            draft.assignees[0].assignee,
            Principal::agent("writer").unwrap()
        );
    }

    #[test]
    fn status_is_forward_only() {
        assert!(TaskStatus::InProgress.advance_to(TaskStatus::Done).is_ok());
        assert!(TaskStatus::Done.advance_to(TaskStatus::Todo).is_err());
    }
}
