//! Read seam between the authorization engine and storage.

use crate::model::member::MemberId;
use crate::model::principal::Principal;
use crate::model::project::ProjectId;
use crate::repo::member_repo::{MemberRepository, SqliteMemberRepository};
use crate::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use crate::repo::RepoResult;
use rusqlite::Connection;
use std::collections::BTreeSet;

/// Membership facts the engine needs for one (project, principal) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipGrants {
    pub member_id: MemberId,
    pub role: String,
    /// Names of granted permissions.
    pub permissions: BTreeSet<String>,
}

/// Read-only access facts consulted per decision.
pub trait AccessSource {
    /// Creator of the project, or `None` when the project does not exist.
    fn project_creator(&self, project_id: ProjectId) -> RepoResult<Option<Principal>>;
    /// Membership of `principal` in the project, if any.
    fn membership(
        &self,
        project_id: ProjectId,
        principal: &Principal,
    ) -> RepoResult<Option<MembershipGrants>>;
}

/// Access source reading through the caller's connection or transaction.
pub struct SqliteAccessSource<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccessSource<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AccessSource for SqliteAccessSource<'_> {
    fn project_creator(&self, project_id: ProjectId) -> RepoResult<Option<Principal>> {
        let projects = SqliteProjectRepository::new(self.conn);
        Ok(projects
            .get_project(project_id)?
            .map(|project| project.creator))
    }

    fn membership(
        &self,
        project_id: ProjectId,
        principal: &Principal,
    ) -> RepoResult<Option<MembershipGrants>> {
        let members = SqliteMemberRepository::new(self.conn);
        let Some(member) = members.find_member(project_id, principal)? else {
            return Ok(None);
        };
        let permissions = members.permission_names(member.id)?;
        Ok(Some(MembershipGrants {
            member_id: member.id,
            role: member.role,
            permissions,
        }))
    }
}
