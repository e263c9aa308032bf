//! Role resolution and the permission matrix.
//!
//! # Responsibility
//! - Map a principal onto exactly one contract-management role.
//! - Decide every CRUD and approval action from a static grant table.
//!
//! # Invariants
//! - Policy code performs no I/O; callers load an [`matrix::AccessFacts`]
//!   snapshot first.
//! - Evaluation is total and deterministic.

pub mod matrix;
pub mod role;

pub use matrix::{evaluate, grant, AccessFacts, Action, Grant, PermissionSummary};
pub use role::{resolve_role, Role};
