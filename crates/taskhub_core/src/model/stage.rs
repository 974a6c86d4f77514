//! Project stage model.
//!
//! # Invariants
//! - A stage belongs to exactly one project.
//! - `end_date >= start_date` when both are set (epoch ms).
//! - Status only moves forward: `NOT_STARTED -> IN_PROGRESS -> DONE`.

use crate::model::principal::Principal;
use crate::model::project::ProjectId;
use crate::model::validation::{
    check_date_range, forward_only, required_text, ValidationError, NAME_MAX_CHARS,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type StageId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    NotStarted,
    InProgress,
    Done,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NOT_STARTED" => Some(Self::NotStarted),
            "IN_PROGRESS" => Some(Self::InProgress),
            "DONE" => Some(Self::Done),
            _ => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::InProgress => 1,
            Self::Done => 2,
        }
    }

    pub fn advance_to(self, next: Self) -> Result<Self, ValidationError> {
        forward_only(
            "stage",
            (self.as_str(), self.rank()),
            (next.as_str(), next.rank()),
        )?;
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub project_id: ProjectId,
    pub name: String,
    pub status: StageStatus,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    /// Actor of the latest create/update.
    pub last_modifier: Principal,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Client input for creating or replacing a stage's editable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDraft {
    pub name: String,
    #[serde(default)]
    pub start_date: Option<i64>,
    #[serde(default)]
    pub end_date: Option<i64>,
}

impl StageDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_dates(mut self, start_date: Option<i64>, end_date: Option<i64>) -> Self {
        self.start_date = start_date;
        self.end_date = end_date;
        self
    }

    pub fn validated(&self) -> Result<Self, ValidationError> {
        check_date_range(self.start_date, self.end_date)?;
        Ok(Self {
            name: required_text("name", &self.name, NAME_MAX_CHARS)?,
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }
}
