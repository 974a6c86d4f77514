//! Permission catalog and project membership models.
//!
//! # Responsibility
//! - Define reusable named permissions (process-wide, not project scoped).
//! - Define project members and the grants they hold.
//!
//! # Invariants
//! - Permission names match `^[a-z][a-z0-9_]{0,63}$` and are unique.
//! - One principal is a member of a given project at most once.
//! - Grants are owned by the member; permissions are only referenced.

use crate::model::principal::Principal;
use crate::model::project::ProjectId;
use crate::model::validation::{
    optional_text, required_text, ValidationError, DESCRIPTION_MAX_CHARS, ROLE_MAX_CHARS,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PermissionId = Uuid;
pub type MemberId = Uuid;

static PERMISSION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("valid permission name regex"));

/// Returns whether `value` is an acceptable permission name.
pub fn is_valid_permission_name(value: &str) -> bool {
    PERMISSION_NAME_RE.is_match(value)
}

/// Named capability that can be granted to project members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl PermissionDraft {
    pub fn new(name: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            name: name.into(),
            description: description.map(str::to_string),
        }
    }

    pub fn validated(&self) -> Result<Self, ValidationError> {
        let name = self.name.trim();
        if !is_valid_permission_name(name) {
            return Err(ValidationError::InvalidPermissionName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            description: optional_text(
                "description",
                self.description.as_deref(),
                DESCRIPTION_MAX_CHARS,
            )?,
        })
    }
}

/// Membership of one principal in one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub id: MemberId,
    pub project_id: ProjectId,
    pub member: Principal,
    /// Descriptive label such as `editor`; carries no authority by itself.
    pub role: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Client input for inviting a member with an initial grant set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDraft {
    pub member: Principal,
    pub role: String,
    #[serde(default)]
    pub permission_ids: Vec<PermissionId>,
}

impl MemberDraft {
    pub fn new(member: Principal, role: impl Into<String>) -> Self {
        Self {
            member,
            role: role.into(),
            permission_ids: Vec::new(),
        }
    }

    pub fn with_permissions(
        mut self,
        permission_ids: impl IntoIterator<Item = PermissionId>,
    ) -> Self {
        self.permission_ids.extend(permission_ids);
        self
    }

    /// Normalizes role text and drops repeated permission ids.
    pub fn validated(&self) -> Result<Self, ValidationError> {
        let mut permission_ids = Vec::with_capacity(self.permission_ids.len());
        for id in &self.permission_ids {
            if !permission_ids.contains(id) {
                permission_ids.push(*id);
            }
        }
        Ok(Self {
            member: self.member.clone(),
            role: normalize_role(&self.role)?,
            permission_ids,
        })
    }
}

pub(crate) fn normalize_role(value: &str) -> Result<String, ValidationError> {
    required_text("role", value, ROLE_MAX_CHARS)
}
