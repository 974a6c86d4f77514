//! Authorization policy: which actions are open and which permissions gate
//! the rest.
//!
//! # Invariants
//! - An action absent from both `open_actions` and `action_requirements`
//!   is denied for every member (fail closed).
//! - Requirement names must be valid permission names; they are not required
//!   to exist in the catalog, a missing name simply never matches.

use crate::authz::action::Action;
use crate::model::member::is_valid_permission_name;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Action-to-permission mapping consulted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationPolicy {
    /// Actions any member (or non-member) may perform.
    #[serde(default)]
    pub open_actions: BTreeSet<Action>,
    /// Permission names of which a member must hold at least one.
    #[serde(default)]
    pub action_requirements: BTreeMap<Action, BTreeSet<String>>,
}

impl AuthorizationPolicy {
    /// Builds the built-in policy.
    pub fn standard() -> Self {
        let mut policy = Self {
            open_actions: BTreeSet::from([Action::ViewProject]),
            action_requirements: BTreeMap::new(),
        };
        policy.require(
            &[Action::UpdateProject, Action::ChangeProjectStatus],
            &["project_manage"],
        );
        policy.require(&[Action::DeleteProject], &["project_delete"]);
        policy.require(
            &[Action::CreateStage, Action::UpdateStage, Action::DeleteStage],
            &["stage_manage"],
        );
        policy.require(&[Action::CreateTask], &["task_create"]);
        policy.require(&[Action::UpdateTask], &["task_update"]);
        policy.require(&[Action::DeleteTask], &["task_delete"]);
        policy.require(&[Action::AssignTask], &["task_assign", "task_update"]);
        policy.require(
            &[
                Action::InviteMember,
                Action::UpdateMember,
                Action::RemoveMember,
            ],
            &["member_invite"],
        );
        policy.require(
            &[Action::GrantPermission, Action::RevokePermission],
            &["permission_grant"],
        );
        policy
    }

    fn require(&mut self, actions: &[Action], names: &[&str]) {
        for action in actions {
            self.action_requirements
                .entry(*action)
                .or_default()
                .extend(names.iter().map(|name| name.to_string()));
        }
    }

    pub fn is_open(&self, action: Action) -> bool {
        self.open_actions.contains(&action)
    }

    /// Required names for `action`; `None` when the policy has no entry.
    pub fn requirements(&self, action: Action) -> Option<&BTreeSet<String>> {
        self.action_requirements.get(&action)
    }

    /// Every permission name referenced by any requirement.
    pub fn permission_names(&self) -> BTreeSet<&str> {
        self.action_requirements
            .values()
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Parses and validates a JSON policy document.
    pub fn from_json_str(value: &str) -> Result<Self, PolicyError> {
        let policy: Self = serde_json::from_str(value).map_err(PolicyError::Parse)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Reads a JSON policy document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        for (action, names) in &self.action_requirements {
            if let Some(name) = names.iter().find(|name| !is_valid_permission_name(name)) {
                return Err(PolicyError::InvalidPermissionName {
                    action: *action,
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Policy loading failures.
#[derive(Debug)]
pub enum PolicyError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidPermissionName {
        action: Action,
        name: String,
    },
}

impl Display for PolicyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read policy `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid policy document: {err}"),
            Self::InvalidPermissionName { action, name } => {
                write!(f, "policy for `{action}` names invalid permission `{name}`")
            }
        }
    }
}

impl Error for PolicyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidPermissionName { .. } => None,
        }
    }
}
