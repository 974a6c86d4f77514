//! Core domain logic for TaskHub.
//! This crate is the single source of truth for project, membership and
//! authorization invariants.

pub mod authz;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use authz::{
    AccessSource, Action, AllowBasis, AuthorizationEngine, AuthorizationPolicy, Decision,
    DenyReason, MembershipGrants, PolicyError, SqliteAccessSource,
};
pub use config::CoreConfig;
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::member::{MemberDraft, Permission, PermissionDraft, ProjectMember};
pub use model::principal::{Principal, PrincipalId, PrincipalKind};
pub use model::project::{Project, ProjectDraft, ProjectStatus};
pub use model::stage::{Stage, StageDraft, StageStatus};
pub use model::task::{AssigneeDraft, Task, TaskAssignee, TaskDraft, TaskStatus, TaskUpdate};
pub use model::validation::ValidationError;
pub use repo::project_repo::ProjectListQuery;
pub use repo::{ConflictKind, EntityKind, RepoError, RepoResult};
pub use service::{
    MembershipService, PermissionService, ProjectService, ServiceError, ServiceResult,
    StageService, TaskService,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
