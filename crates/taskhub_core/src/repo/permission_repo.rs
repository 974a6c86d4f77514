//! Permission catalog repository.
//!
//! # Invariants
//! - Names are unique across the whole catalog.
//! - Deletion is refused while any member grant references the permission.

use crate::model::member::{Permission, PermissionDraft, PermissionId};
use crate::repo::common::{uuid_column, ConflictKind, EntityKind, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const PERMISSION_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    created_at
FROM permissions";

/// Repository interface for the process-wide permission catalog.
pub trait PermissionRepository {
    /// Inserts a validated draft; duplicate names are a conflict.
    fn create_permission(&self, draft: &PermissionDraft) -> RepoResult<Permission>;
    fn get_permission(&self, id: PermissionId) -> RepoResult<Option<Permission>>;
    fn find_by_name(&self, name: &str) -> RepoResult<Option<Permission>>;
    /// Lists all permissions ordered by name.
    fn list_permissions(&self) -> RepoResult<Vec<Permission>>;
    /// Counts member grants referencing the permission.
    fn count_grants(&self, id: PermissionId) -> RepoResult<u64>;
    /// Deletes an unreferenced permission.
    fn delete_permission(&self, id: PermissionId) -> RepoResult<()>;
    /// Returns the subset of `ids` absent from the catalog, in input order.
    fn unknown_ids(&self, ids: &[PermissionId]) -> RepoResult<Vec<PermissionId>>;
}

/// SQLite-backed permission catalog.
pub struct SqlitePermissionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePermissionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PermissionRepository for SqlitePermissionRepository<'_> {
    fn create_permission(&self, draft: &PermissionDraft) -> RepoResult<Permission> {
        let draft = draft.validated()?;
        if self.find_by_name(&draft.name)?.is_some() {
            return Err(RepoError::Conflict(ConflictKind::DuplicatePermissionName(
                draft.name,
            )));
        }

        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO permissions (id, name, description) VALUES (?1, ?2, ?3);",
            params![id.to_string(), draft.name, draft.description],
        )?;
        self.get_permission(id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Permission, id))
    }

    fn get_permission(&self, id: PermissionId) -> RepoResult<Option<Permission>> {
        self.conn
            .query_row(
                &format!("{PERMISSION_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_permission_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn find_by_name(&self, name: &str) -> RepoResult<Option<Permission>> {
        self.conn
            .query_row(
                &format!("{PERMISSION_SELECT_SQL} WHERE name = ?1;"),
                [name],
                |row| Ok(parse_permission_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_permissions(&self) -> RepoResult<Vec<Permission>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PERMISSION_SELECT_SQL} ORDER BY name ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_permission_row(row)?);
        }
        Ok(items)
    }

    fn count_grants(&self, id: PermissionId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM member_permissions WHERE permission_id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn delete_permission(&self, id: PermissionId) -> RepoResult<()> {
        let grants = self.count_grants(id)?;
        if grants > 0 {
            return Err(RepoError::Conflict(ConflictKind::PermissionInUse {
                permission_id: id,
                grants,
            }));
        }

        let changed = self
            .conn
            .execute("DELETE FROM permissions WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Permission, id));
        }
        Ok(())
    }

    fn unknown_ids(&self, ids: &[PermissionId]) -> RepoResult<Vec<PermissionId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT EXISTS(SELECT 1 FROM permissions WHERE id = ?1);")?;
        let mut missing = Vec::new();
        for id in ids {
            let exists: i64 = stmt.query_row([id.to_string()], |row| row.get(0))?;
            if exists == 0 {
                missing.push(*id);
            }
        }
        Ok(missing)
    }
}

fn parse_permission_row(row: &Row<'_>) -> RepoResult<Permission> {
    Ok(Permission {
        id: uuid_column(row, "id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    })
}
