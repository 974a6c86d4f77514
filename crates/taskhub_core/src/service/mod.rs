//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate authorization and repository calls into use-case APIs.
//! - Map layered errors into one taxonomy an API layer can translate.
//!
//! # Invariants
//! - Every mutating call runs in one `IMMEDIATE` transaction: authorize,
//!   mutate, commit. Any error or denial drops the transaction (rollback).
//! - Services never bypass repository validation.

pub mod membership_service;
pub mod permission_service;
pub mod project_service;
pub mod stage_service;
pub mod task_service;

use crate::authz::{
    Action, AllowBasis, AuthorizationEngine, Decision, DenyReason, SqliteAccessSource,
};
use crate::model::principal::Principal;
use crate::model::project::ProjectId;
use crate::model::validation::ValidationError;
use crate::repo::{ConflictKind, EntityKind, RepoError};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use membership_service::MembershipService;
pub use permission_service::PermissionService;
pub use project_service::ProjectService;
pub use stage_service::StageService;
pub use task_service::TaskService;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Outcome taxonomy for service operations.
#[derive(Debug)]
pub enum ServiceError {
    /// `id` is a uuid, or `TYPE:id` for principal-keyed lookups.
    NotFound { entity: EntityKind, id: String },
    Conflict(ConflictKind),
    AuthorizationDenied { action: Action, reason: DenyReason },
    ValidationFailed(ValidationError),
    DanglingReference { entity: EntityKind, id: String },
    Storage(RepoError),
}

impl ServiceError {
    /// HTTP status an API layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict(_) => 409,
            Self::AuthorizationDenied { .. } => 403,
            Self::ValidationFailed(_) | Self::DanglingReference { .. } => 422,
            Self::Storage(_) => 500,
        }
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict(kind) => kind.code(),
            Self::AuthorizationDenied { reason, .. } => reason.code(),
            Self::ValidationFailed(_) => "validation_failed",
            Self::DanglingReference { .. } => "dangling_reference",
            Self::Storage(_) => "storage_error",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{} not found: {id}", entity.as_str()),
            Self::Conflict(kind) => write!(f, "{kind}"),
            Self::AuthorizationDenied { action, reason } => {
                write!(f, "action `{action}` denied: {reason}")
            }
            Self::ValidationFailed(err) => write!(f, "{err}"),
            Self::DanglingReference { entity, id } => {
                write!(f, "reference to unknown {}: {id}", entity.as_str())
            }
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ValidationFailed(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound {
                entity,
                id: id.to_string(),
            },
            RepoError::Conflict(kind) => Self::Conflict(kind),
            RepoError::DanglingReference { entity, id } => Self::DanglingReference {
                entity,
                id: id.to_string(),
            },
            RepoError::Validation(err) => Self::ValidationFailed(err),
            other => Self::Storage(other),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::ValidationFailed(value)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(RepoError::from(value))
    }
}

/// Opens the write transaction for one mutating call.
pub(crate) fn begin_write(conn: &mut Connection) -> ServiceResult<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// Authorizes through `conn` and turns a denial into an error.
pub(crate) fn require(
    engine: &AuthorizationEngine,
    conn: &Connection,
    actor: &Principal,
    project_id: ProjectId,
    action: Action,
) -> ServiceResult<AllowBasis> {
    match engine.authorize(&SqliteAccessSource::new(conn), actor, project_id, action)? {
        Decision::Allow(basis) => Ok(basis),
        Decision::Deny(reason) => Err(ServiceError::AuthorizationDenied { action, reason }),
    }
}
