//! Alert-generation workflow
//!
//! The workflow body, the orchestrator boundary it runs behind, and the
//! trigger callers use to start it.

pub mod alert_generation;
pub mod local;
pub mod orchestrator;
pub mod trigger;

pub use alert_generation::{evaluate_stream, AlertGenerationResult, AlertGenerationWorkflow};
pub use local::{LocalOrchestrator, WorkflowError, WorkflowHandler};
pub use orchestrator::{
    HttpOrchestrator, Orchestrator, OrchestratorError, RunRecord, RunStatus, WorkflowDefinition,
    WorkflowRun, GENERATE_ALERTS,
};
pub use trigger::{trigger_alert_generation, TriggerResult};
