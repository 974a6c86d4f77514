//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories borrow a connection (usually a transaction) and never open
//!   or commit transactions of their own; the caller owns the unit of work.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`,
//!   `DanglingReference`) in addition to DB transport errors.
//! - Repositories hold no authorization logic.

pub mod common;
pub mod member_repo;
pub mod permission_repo;
pub mod project_repo;
pub mod stage_repo;
pub mod task_repo;

pub use common::{ensure_schema_ready, ConflictKind, EntityKind, RepoError, RepoResult};
