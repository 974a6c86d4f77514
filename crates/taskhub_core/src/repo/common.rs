//! Shared repository error type and row-parsing helpers.

use crate::db::migrations::{latest_version, REQUIRED_TABLES};
use crate::db::DbError;
use crate::model::principal::Principal;
use crate::model::validation::ValidationError;
use rusqlite::{Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity names used in not-found and dangling-reference reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Project,
    Stage,
    Task,
    Assignee,
    Member,
    Permission,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Stage => "stage",
            Self::Task => "task",
            Self::Assignee => "assignee",
            Self::Member => "member",
            Self::Permission => "permission",
        }
    }
}

/// Unique-key or referential conflicts detected before a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    DuplicatePermissionName(String),
    /// Permission is still granted to `grants` members (RESTRICT).
    PermissionInUse { permission_id: Uuid, grants: u64 },
    AlreadyMember(Principal),
    DuplicateAssignee(Principal),
}

impl ConflictKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicatePermissionName(_) => "duplicate_permission_name",
            Self::PermissionInUse { .. } => "permission_in_use",
            Self::AlreadyMember(_) => "already_member",
            Self::DuplicateAssignee(_) => "duplicate_assignee",
        }
    }
}

impl Display for ConflictKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicatePermissionName(name) => {
                write!(f, "permission name already registered: {name}")
            }
            Self::PermissionInUse {
                permission_id,
                grants,
            } => write!(
                f,
                "permission {permission_id} is still granted to {grants} member(s)"
            ),
            Self::AlreadyMember(principal) => {
                write!(f, "{principal} is already a member of this project")
            }
            Self::DuplicateAssignee(principal) => {
                write!(f, "{principal} is already assigned to this task")
            }
        }
    }
}

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound { entity: EntityKind, id: Uuid },
    Conflict(ConflictKind),
    /// A write names an id that does not resolve, e.g. an unknown permission.
    DanglingReference { entity: EntityKind, id: Uuid },
    Validation(ValidationError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{} not found: {id}", entity.as_str()),
            Self::Conflict(kind) => write!(f, "{kind}"),
            Self::DanglingReference { entity, id } => {
                write!(f, "reference to unknown {}: {id}", entity.as_str())
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "repository requires table `{table}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl RepoError {
    pub(crate) fn not_found(entity: EntityKind, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

/// Verifies the connection is migrated to the version this binary expects.
pub fn ensure_schema_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in REQUIRED_TABLES {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn uuid_column(row: &Row<'_>, column: &'static str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    parse_uuid(&text, column)
}

pub(crate) fn optional_uuid_column(
    row: &Row<'_>,
    column: &'static str,
) -> RepoResult<Option<Uuid>> {
    row.get::<_, Option<String>>(column)?
        .map(|value| parse_uuid(&value, column))
        .transpose()
}

/// Reads a principal stored as `<prefix>_type` + `<prefix>_id`.
pub(crate) fn principal_columns(
    row: &Row<'_>,
    type_column: &'static str,
    id_column: &'static str,
) -> RepoResult<Principal> {
    let kind: String = row.get(type_column)?;
    let id: String = row.get(id_column)?;
    Principal::parse(&kind, &id).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid principal in {type_column}/{id_column}: {err}"
        ))
    })
}

pub(crate) fn invalid_enum(value: &str, column: &'static str) -> RepoError {
    RepoError::InvalidData(format!("invalid value `{value}` in {column}"))
}
