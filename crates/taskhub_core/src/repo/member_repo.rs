//! Membership store: project members and their permission grants.
//!
//! # Responsibility
//! - Persist members with their initial grant set.
//! - Provide idempotent grant/revoke primitives.
//!
//! # Invariants
//! - `(project, principal)` is unique; inserts check before writing.
//! - Every granted permission id must exist in the catalog.
//! - Removing a member removes its grants (FK cascade).
//! - Multi-row writes rely on the caller's transaction for atomicity.

use crate::model::member::{MemberDraft, MemberId, PermissionId, ProjectMember};
use crate::model::principal::Principal;
use crate::model::project::ProjectId;
use crate::repo::common::{
    principal_columns, uuid_column, ConflictKind, EntityKind, RepoError, RepoResult,
};
use crate::repo::permission_repo::{PermissionRepository, SqlitePermissionRepository};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use uuid::Uuid;

const MEMBER_SELECT_SQL: &str = "SELECT
    id,
    project_id,
    member_type,
    member_id,
    role,
    created_at,
    updated_at
FROM project_members";

/// Repository interface for project membership.
pub trait MemberRepository {
    /// Inserts a member plus its initial grants.
    fn insert_member(
        &self,
        project_id: ProjectId,
        draft: &MemberDraft,
    ) -> RepoResult<ProjectMember>;
    fn get_member(&self, id: MemberId) -> RepoResult<Option<ProjectMember>>;
    fn find_member(
        &self,
        project_id: ProjectId,
        principal: &Principal,
    ) -> RepoResult<Option<ProjectMember>>;
    /// Lists members ordered by join time.
    fn list_members(&self, project_id: ProjectId) -> RepoResult<Vec<ProjectMember>>;
    fn update_role(&self, id: MemberId, role: &str) -> RepoResult<ProjectMember>;
    fn delete_member(&self, id: MemberId) -> RepoResult<()>;
    /// Grants a permission. Returns `false` when it was already held.
    fn grant(&self, id: MemberId, permission_id: PermissionId) -> RepoResult<bool>;
    /// Revokes a permission. Returns `false` when it was not held.
    fn revoke(&self, id: MemberId, permission_id: PermissionId) -> RepoResult<bool>;
    /// Names of all permissions held by the member.
    fn permission_names(&self, id: MemberId) -> RepoResult<BTreeSet<String>>;
}

/// SQLite-backed membership store.
pub struct SqliteMemberRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMemberRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn ensure_member_exists(&self, id: MemberId) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM project_members WHERE id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::not_found(EntityKind::Member, id));
        }
        Ok(())
    }

    fn load_required(&self, id: MemberId) -> RepoResult<ProjectMember> {
        self.get_member(id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Member, id))
    }
}

impl MemberRepository for SqliteMemberRepository<'_> {
    fn insert_member(
        &self,
        project_id: ProjectId,
        draft: &MemberDraft,
    ) -> RepoResult<ProjectMember> {
        let draft = draft.validated()?;
        if self.find_member(project_id, &draft.member)?.is_some() {
            return Err(RepoError::Conflict(ConflictKind::AlreadyMember(
                draft.member,
            )));
        }

        let catalog = SqlitePermissionRepository::new(self.conn);
        if let Some(unknown) = catalog.unknown_ids(&draft.permission_ids)?.first() {
            return Err(RepoError::DanglingReference {
                entity: EntityKind::Permission,
                id: *unknown,
            });
        }

        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO project_members (
                id,
                project_id,
                member_type,
                member_id,
                role
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                id.to_string(),
                project_id.to_string(),
                draft.member.kind().as_str(),
                draft.member.id().as_str(),
                draft.role,
            ],
        )?;

        for permission_id in &draft.permission_ids {
            self.conn.execute(
                "INSERT INTO member_permissions (member_id, permission_id) VALUES (?1, ?2);",
                params![id.to_string(), permission_id.to_string()],
            )?;
        }

        self.load_required(id)
    }

    fn get_member(&self, id: MemberId) -> RepoResult<Option<ProjectMember>> {
        self.conn
            .query_row(
                &format!("{MEMBER_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_member_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn find_member(
        &self,
        project_id: ProjectId,
        principal: &Principal,
    ) -> RepoResult<Option<ProjectMember>> {
        self.conn
            .query_row(
                &format!(
                    "{MEMBER_SELECT_SQL}
                     WHERE project_id = ?1
                       AND member_type = ?2
                       AND member_id = ?3;"
                ),
                params![
                    project_id.to_string(),
                    principal.kind().as_str(),
                    principal.id().as_str(),
                ],
                |row| Ok(parse_member_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_members(&self, project_id: ProjectId) -> RepoResult<Vec<ProjectMember>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL}
             WHERE project_id = ?1
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([project_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_member_row(row)?);
        }
        Ok(items)
    }

    fn update_role(&self, id: MemberId, role: &str) -> RepoResult<ProjectMember> {
        let changed = self.conn.execute(
            "UPDATE project_members
             SET role = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), role],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Member, id));
        }
        self.load_required(id)
    }

    fn delete_member(&self, id: MemberId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM project_members WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Member, id));
        }
        Ok(())
    }

    fn grant(&self, id: MemberId, permission_id: PermissionId) -> RepoResult<bool> {
        self.ensure_member_exists(id)?;
        let catalog = SqlitePermissionRepository::new(self.conn);
        if catalog.get_permission(permission_id)?.is_none() {
            return Err(RepoError::DanglingReference {
                entity: EntityKind::Permission,
                id: permission_id,
            });
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO member_permissions (member_id, permission_id)
             VALUES (?1, ?2);",
            params![id.to_string(), permission_id.to_string()],
        )?;
        if inserted > 0 {
            touch_member(self.conn, id)?;
        }
        Ok(inserted > 0)
    }

    fn revoke(&self, id: MemberId, permission_id: PermissionId) -> RepoResult<bool> {
        self.ensure_member_exists(id)?;
        let removed = self.conn.execute(
            "DELETE FROM member_permissions
             WHERE member_id = ?1
               AND permission_id = ?2;",
            params![id.to_string(), permission_id.to_string()],
        )?;
        if removed > 0 {
            touch_member(self.conn, id)?;
        }
        Ok(removed > 0)
    }

    fn permission_names(&self, id: MemberId) -> RepoResult<BTreeSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.name
             FROM member_permissions mp
             INNER JOIN permissions p ON p.id = mp.permission_id
             WHERE mp.member_id = ?1;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut names = BTreeSet::new();
        while let Some(row) = rows.next()? {
            names.insert(row.get::<_, String>(0)?);
        }
        Ok(names)
    }
}

fn touch_member(conn: &Connection, id: MemberId) -> RepoResult<()> {
    conn.execute(
        "UPDATE project_members
         SET updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        [id.to_string()],
    )?;
    Ok(())
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<ProjectMember> {
    Ok(ProjectMember {
        id: uuid_column(row, "id")?,
        project_id: uuid_column(row, "project_id")?,
        member: principal_columns(row, "member_type", "member_id")?,
        role: row.get("role")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
