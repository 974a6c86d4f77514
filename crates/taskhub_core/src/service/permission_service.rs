//! Permission catalog use-cases.
//!
//! Catalog operations are administrative; they are not gated by the project
//! authorization engine.

use crate::authz::AuthorizationPolicy;
use crate::model::member::{Permission, PermissionDraft, PermissionId};
use crate::repo::permission_repo::{PermissionRepository, SqlitePermissionRepository};
use crate::repo::{ensure_schema_ready, EntityKind};
use crate::service::{begin_write, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;

/// Service facade over the process-wide permission catalog.
pub struct PermissionService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> PermissionService<'conn> {
    /// Creates the service after verifying the schema is migrated.
    pub fn try_new(conn: &'conn mut Connection) -> ServiceResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    /// Registers a new permission name.
    pub fn define(&mut self, name: &str, description: Option<&str>) -> ServiceResult<Permission> {
        let tx = begin_write(self.conn)?;
        let permission = SqlitePermissionRepository::new(&tx)
            .create_permission(&PermissionDraft::new(name, description))?;
        tx.commit()?;
        info!("{}", define_event(&permission));
        Ok(permission)
    }

    /// Lists every permission ordered by name.
    pub fn list(&self) -> ServiceResult<Vec<Permission>> {
        Ok(SqlitePermissionRepository::new(self.conn).list_permissions()?)
    }

    pub fn get(&self, id: PermissionId) -> ServiceResult<Permission> {
        SqlitePermissionRepository::new(self.conn)
            .get_permission(id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: EntityKind::Permission,
                id: id.to_string(),
            })
    }

    pub fn get_by_name(&self, name: &str) -> ServiceResult<Permission> {
        SqlitePermissionRepository::new(self.conn)
            .find_by_name(name.trim())?
            .ok_or_else(|| ServiceError::NotFound {
                entity: EntityKind::Permission,
                id: name.trim().to_string(),
            })
    }

    /// Deletes a permission that no member currently holds.
    pub fn delete(&mut self, id: PermissionId) -> ServiceResult<()> {
        let tx = begin_write(self.conn)?;
        SqlitePermissionRepository::new(&tx).delete_permission(id)?;
        tx.commit()?;
        info!("event=permission_delete module=service status=ok permission_id={id}");
        Ok(())
    }

    /// Defines every permission named by `policy` that is not yet present.
    ///
    /// Returns the number of permissions created.
    pub fn seed_defaults(&mut self, policy: &AuthorizationPolicy) -> ServiceResult<usize> {
        let tx = begin_write(self.conn)?;
        let catalog = SqlitePermissionRepository::new(&tx);
        let mut created = 0;
        for name in policy.permission_names() {
            if catalog.find_by_name(name)?.is_some() {
                continue;
            }
            catalog.create_permission(&PermissionDraft::new(name, None))?;
            created += 1;
        }
        tx.commit()?;
        info!("event=permission_seed module=service status=ok created={created}");
        Ok(created)
    }
}

/// Metadata-only log line; the client-chosen name stays out of logs.
fn define_event(permission: &Permission) -> String {
    format!(
        "event=permission_define module=service status=ok permission_id={}",
        permission.id
    )
}
