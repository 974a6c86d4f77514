//! Project aggregate root.
//!
//! # Responsibility
//! - Define the project record and its lifecycle status.
//! - Validate client drafts before they reach persistence.
//!
//! # Invariants
//! - Status only moves forward: `INIT -> ACTIVE -> COMPLETED -> ARCHIVED`.
//! - `reopen` is the single backward move and always lands on `ACTIVE`.
//! - `current_stage_id`, when set, names a stage of the same project.

use crate::model::principal::Principal;
use crate::model::stage::StageId;
use crate::model::validation::{
    forward_only, optional_text, required_text, ValidationError, DESCRIPTION_MAX_CHARS,
    NAME_MAX_CHARS,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ProjectId = Uuid;

/// Project lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Init,
    Active,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Archived => "ARCHIVED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INIT" => Some(Self::Init),
            "ACTIVE" => Some(Self::Active),
            "COMPLETED" => Some(Self::Completed),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Active => 1,
            Self::Completed => 2,
            Self::Archived => 3,
        }
    }

    /// Checks a forward move to `next`. Skipping ahead is allowed.
    pub fn advance_to(self, next: Self) -> Result<Self, ValidationError> {
        forward_only(
            "project",
            (self.as_str(), self.rank()),
            (next.as_str(), next.rank()),
        )?;
        Ok(next)
    }

    /// Checks the explicit reopen move back to `ACTIVE`.
    pub fn reopen(self) -> Result<Self, ValidationError> {
        match self {
            Self::Completed | Self::Archived => Ok(Self::Active),
            other => Err(ValidationError::IllegalTransition {
                entity: "project",
                from: other.as_str(),
                to: Self::Active.as_str(),
            }),
        }
    }
}

/// Persisted project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub current_stage_id: Option<StageId>,
    /// Holds non-revocable full control over this project.
    pub creator: Principal,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Client input for creating or renaming a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProjectDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the normalized draft or the first constraint violation.
    pub fn validated(&self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: required_text("name", &self.name, NAME_MAX_CHARS)?,
            description: optional_text(
                "description",
                self.description.as_deref(),
                DESCRIPTION_MAX_CHARS,
            )?,
        })
    }
}
