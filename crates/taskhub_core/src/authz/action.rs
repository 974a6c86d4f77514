//! Abstract operations subject to project authorization.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One gated operation on a project or its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewProject,
    UpdateProject,
    ChangeProjectStatus,
    DeleteProject,
    CreateStage,
    UpdateStage,
    DeleteStage,
    CreateTask,
    UpdateTask,
    DeleteTask,
    AssignTask,
    InviteMember,
    UpdateMember,
    RemoveMember,
    GrantPermission,
    RevokePermission,
}

impl Action {
    /// Every action, in declaration order.
    pub const ALL: [Action; 16] = [
        Self::ViewProject,
        Self::UpdateProject,
        Self::ChangeProjectStatus,
        Self::DeleteProject,
        Self::CreateStage,
        Self::UpdateStage,
        Self::DeleteStage,
        Self::CreateTask,
        Self::UpdateTask,
        Self::DeleteTask,
        Self::AssignTask,
        Self::InviteMember,
        Self::UpdateMember,
        Self::RemoveMember,
        Self::GrantPermission,
        Self::RevokePermission,
    ];

    /// Stable snake_case id used in policy files and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewProject => "view_project",
            Self::UpdateProject => "update_project",
            Self::ChangeProjectStatus => "change_project_status",
            Self::DeleteProject => "delete_project",
            Self::CreateStage => "create_stage",
            Self::UpdateStage => "update_stage",
            Self::DeleteStage => "delete_stage",
            Self::CreateTask => "create_task",
            Self::UpdateTask => "update_task",
            Self::DeleteTask => "delete_task",
            Self::AssignTask => "assign_task",
            Self::InviteMember => "invite_member",
            Self::UpdateMember => "update_member",
            Self::RemoveMember => "remove_member",
            Self::GrantPermission => "grant_permission",
            Self::RevokePermission => "revoke_permission",
        }
    }

    pub fn parse(value: &str) -> Result<Self, UnknownAction> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| UnknownAction(value.to_string()))
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl Display for UnknownAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown action `{}`", self.0)
    }
}

impl Error for UnknownAction {}

#[cfg(test)]
mod tests {
    use super::{Action, UnknownAction};

    #[test]
    fn parse_round_trips_every_action() {
        for action in Action::ALL {
            assert_eq!(Action::parse(action.as_str()), Ok(action));
        }
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert_eq!(
            Action::parse("CreateTask"),
            Err(UnknownAction("CreateTask".to_string()))
        );
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_value(Action::ChangeProjectStatus).unwrap();
        assert_eq!(json, "change_project_status");
        let decoded: Action = serde_json::from_str("\"assign_task\"").unwrap();
        assert_eq!(decoded, Action::AssignTask);
    }
}
