//! Domain model for projects, stages, tasks and membership.
//!
//! # Responsibility
//! - Define canonical data structures and client drafts.
//! - Own field validation and status lifecycle rules.
//!
//! # Invariants
//! - Entities are identified by UUID v4; timestamps are epoch milliseconds.
//! - The model layer holds no authorization logic.

pub mod member;
pub mod principal;
pub mod project;
pub mod stage;
pub mod task;
pub mod validation;
