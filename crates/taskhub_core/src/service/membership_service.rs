//! Project membership use-cases.
//!
//! # Invariants
//! - Member-keyed calls resolve the member first, then authorize against
//!   the member's project.
//! - A member and its initial grants are written in one transaction.

use crate::authz::{Action, AuthorizationEngine};
use crate::model::member::{normalize_role, MemberDraft, MemberId, PermissionId, ProjectMember};
use crate::model::principal::Principal;
use crate::model::project::ProjectId;
use crate::repo::member_repo::{MemberRepository, SqliteMemberRepository};
use crate::repo::{ensure_schema_ready, EntityKind};
use crate::service::{begin_write, require, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;
use std::collections::BTreeSet;

/// Service facade for members and their grants.
pub struct MembershipService<'conn> {
    conn: &'conn mut Connection,
    engine: AuthorizationEngine,
}

impl<'conn> MembershipService<'conn> {
    pub fn try_new(
        conn: &'conn mut Connection,
        engine: AuthorizationEngine,
    ) -> ServiceResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, engine })
    }

    /// Adds `draft.member` to the project with its initial grants.
    pub fn add_member(
        &mut self,
        actor: &Principal,
        project_id: ProjectId,
        draft: &MemberDraft,
    ) -> ServiceResult<ProjectMember> {
        let tx = begin_write(self.conn)?;
        require(&self.engine, &tx, actor, project_id, Action::InviteMember)?;
        let member = SqliteMemberRepository::new(&tx).insert_member(project_id, draft)?;
        tx.commit()?;
        info!(
            "event=member_add module=service status=ok project_id={project_id} member_id={} grants={}",
            member.id,
            draft.permission_ids.len()
        );
        Ok(member)
    }

    /// Grants a permission. Returns `false` when it was already held.
    pub fn grant_permission(
        &mut self,
        actor: &Principal,
        member_id: MemberId,
        permission_id: PermissionId,
    ) -> ServiceResult<bool> {
        let tx = begin_write(self.conn)?;
        let members = SqliteMemberRepository::new(&tx);
        let member = load_member(&members, member_id)?;
        require(&self.engine, &tx, actor, member.project_id, Action::GrantPermission)?;
        let granted = members.grant(member_id, permission_id)?;
        tx.commit()?;
        info!(
            "event=permission_grant module=service status=ok member_id={member_id} permission_id={permission_id} changed={granted}"
        );
        Ok(granted)
    }

    /// Revokes a permission. Returns `false` when it was not held.
    pub fn revoke_permission(
        &mut self,
        actor: &Principal,
        member_id: MemberId,
        permission_id: PermissionId,
    ) -> ServiceResult<bool> {
        let tx = begin_write(self.conn)?;
        let members = SqliteMemberRepository::new(&tx);
        let member = load_member(&members, member_id)?;
        require(&self.engine, &tx, actor, member.project_id, Action::RevokePermission)?;
        let revoked = members.revoke(member_id, permission_id)?;
        tx.commit()?;
        info!(
            "event=permission_revoke module=service status=ok member_id={member_id} permission_id={permission_id} changed={revoked}"
        );
        Ok(revoked)
    }

    /// Removes `principal` from the project together with its grants.
    pub fn remove_member(
        &mut self,
        actor: &Principal,
        project_id: ProjectId,
        principal: &Principal,
    ) -> ServiceResult<()> {
        let tx = begin_write(self.conn)?;
        require(&self.engine, &tx, actor, project_id, Action::RemoveMember)?;
        let members = SqliteMemberRepository::new(&tx);
        let member = members
            .find_member(project_id, principal)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: EntityKind::Member,
                id: principal.to_string(),
            })?;
        members.delete_member(member.id)?;
        tx.commit()?;
        info!(
            "event=member_remove module=service status=ok project_id={project_id} member_id={}",
            member.id
        );
        Ok(())
    }

    /// Replaces the member's descriptive role label.
    pub fn update_member_role(
        &mut self,
        actor: &Principal,
        member_id: MemberId,
        role: &str,
    ) -> ServiceResult<ProjectMember> {
        let role = normalize_role(role)?;
        let tx = begin_write(self.conn)?;
        let members = SqliteMemberRepository::new(&tx);
        let member = load_member(&members, member_id)?;
        require(&self.engine, &tx, actor, member.project_id, Action::UpdateMember)?;
        let updated = members.update_role(member_id, &role)?;
        tx.commit()?;
        info!("event=member_update module=service status=ok member_id={member_id}");
        Ok(updated)
    }

    pub fn list_members(
        &self,
        actor: &Principal,
        project_id: ProjectId,
    ) -> ServiceResult<Vec<ProjectMember>> {
        require(&self.engine, self.conn, actor, project_id, Action::ViewProject)?;
        Ok(SqliteMemberRepository::new(self.conn).list_members(project_id)?)
    }

    /// Names of the permissions the member holds.
    pub fn list_permissions(
        &self,
        actor: &Principal,
        member_id: MemberId,
    ) -> ServiceResult<BTreeSet<String>> {
        let members = SqliteMemberRepository::new(self.conn);
        let member = load_member(&members, member_id)?;
        require(&self.engine, self.conn, actor, member.project_id, Action::ViewProject)?;
        Ok(members.permission_names(member_id)?)
    }
}

fn load_member(
    members: &SqliteMemberRepository<'_>,
    member_id: MemberId,
) -> ServiceResult<ProjectMember> {
    members.get_member(member_id)?.ok_or_else(|| ServiceError::NotFound {
        entity: EntityKind::Member,
        id: member_id.to_string(),
    })
}
