//! Cascade gateway - dashboard cache and workflow trigger for Cascade
//!
//! Cascade streams SPL-token payroll from employer vaults to employees. This
//! gateway sits between the dashboard and its collaborators: the data layer,
//! the workflow orchestration engine and a Solana RPC node.
//!
//! ## Services
//!
//! - **Query cache**: keyed, coalescing, invalidatable cache behind every
//!   dashboard view, with mounted observers that poll and refetch
//! - **Dashboard views**: key registry and freshness policy per view
//! - **Invalidation**: prefix invalidators and per-mutation rules
//! - **Workflows**: alert generation, run in-process or on a remote engine
//! - **Numeric**: canonical decimal strings for on-chain amount fields

pub mod actions;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod logging;
pub mod models;
pub mod numeric;
pub mod query;
pub mod routes;
pub mod rpc;
pub mod server;
pub mod types;
pub mod workflow;

pub use config::Args;
pub use server::{run, serve, AppState};
pub use types::{GatewayError, Result};
