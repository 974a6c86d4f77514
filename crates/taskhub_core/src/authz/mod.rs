//! Project authorization: actions, policy and the decision engine.
//!
//! # Responsibility
//! - Decide allow/deny for (actor, project, action) from creator identity,
//!   membership and granted permissions.
//! - Keep decision logic out of repositories and entity models.
//!
//! # Invariants
//! - The engine holds no per-request state and caches nothing.
//! - Decisions read through [`AccessSource`] so they observe the caller's
//!   in-flight transaction.

pub mod action;
pub mod engine;
pub mod policy;
pub mod source;

pub use action::Action;
pub use engine::{AllowBasis, AuthorizationEngine, Decision, DenyReason};
pub use policy::{AuthorizationPolicy, PolicyError};
pub use source::{AccessSource, MembershipGrants, SqliteAccessSource};
