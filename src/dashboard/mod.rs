//! Dashboard views
//!
//! Key registry, per-view query specs and the invalidation surface used after
//! mutations.

pub mod invalidation;
pub mod keys;
pub mod views;

pub use invalidation::{spawn_workflow_invalidation, Invalidator, MutationRules};
pub use views::{DashboardViews, EMPLOYEES_ERROR, EMPLOYEE_STREAMS_ERROR};
