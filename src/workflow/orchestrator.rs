//! Workflow orchestrator boundary
//!
//! `start` hands a workflow to the orchestration engine and returns as soon as
//! the engine accepts it. The run itself continues independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the alert-generation workflow
pub const GENERATE_ALERTS: &str = "generate-alerts";

/// Identifies a workflow known to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowDefinition {
    pub name: String,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn generate_alerts() -> Self {
        Self::new(GENERATE_ALERTS)
    }
}

/// Handle to an accepted run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub run_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Status record for a run tracked in-process
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub workflow: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// The engine refused the run
    #[error("{0}")]
    Rejected(String),

    /// The engine could not be reached
    #[error("{0}")]
    Transport(String),

    /// Failure without a usable message
    #[error("Unknown error")]
    Opaque,
}

impl OrchestratorError {
    /// Human-readable message, if the failure carried one
    pub fn message(&self) -> Option<&str> {
        match self {
            OrchestratorError::Rejected(msg) | OrchestratorError::Transport(msg) if !msg.is_empty() => {
                Some(msg.as_str())
            }
            _ => None,
        }
    }
}

#[async_trait::async_trait]
pub trait Orchestrator: Send + Sync {
    /// Start one run of `workflow` and return once it is accepted
    async fn start(
        &self,
        workflow: &WorkflowDefinition,
        args: Vec<Value>,
    ) -> Result<WorkflowRun, OrchestratorError>;

    /// Status of a run, when this orchestrator tracks runs locally
    fn run_status(&self, _run_id: &str) -> Option<RunRecord> {
        None
    }
}

// ============================================================================
// HTTP orchestrator
// ============================================================================

/// Remote orchestration engine reached over HTTP.
///
/// `POST {base}/runs` with `{ workflow, args }`, expecting `{ runId }`.
pub struct HttpOrchestrator {
    base_url: String,
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: Option<String>,
}

impl HttpOrchestrator {
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub fn runs_url(&self) -> String {
        format!("{}/runs", self.base_url)
    }
}

#[async_trait::async_trait]
impl Orchestrator for HttpOrchestrator {
    async fn start(
        &self,
        workflow: &WorkflowDefinition,
        args: Vec<Value>,
    ) -> Result<WorkflowRun, OrchestratorError> {
        let url = self.runs_url();
        debug!(url = %url, workflow = %workflow.name, "Starting remote workflow run");

        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "workflow": workflow.name, "args": args }))
            .send()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("Orchestrator returned {}", status));
            warn!(workflow = %workflow.name, status = status.as_u16(), "Workflow run rejected");
            return Err(OrchestratorError::Rejected(message));
        }

        response
            .json::<WorkflowRun>()
            .await
            .map_err(|_| OrchestratorError::Opaque)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            OrchestratorError::Rejected("quota exceeded".into()).message(),
            Some("quota exceeded")
        );
        assert_eq!(
            OrchestratorError::Transport("connection refused".into()).message(),
            Some("connection refused")
        );
        assert_eq!(OrchestratorError::Rejected(String::new()).message(), None);
        assert_eq!(OrchestratorError::Opaque.message(), None);
        assert_eq!(OrchestratorError::Opaque.to_string(), "Unknown error");
    }

    #[test]
    fn test_runs_url_trims_slash() {
        let orchestrator = HttpOrchestrator::new("http://workflows.local/", Duration::from_secs(1));
        assert_eq!(orchestrator.runs_url(), "http://workflows.local/runs");
    }

    #[test]
    fn test_run_wire_format() {
        let run: WorkflowRun = serde_json::from_str(r#"{"runId": "run-1"}"#).unwrap();
        assert_eq!(run.run_id, "run-1");
        assert_eq!(
            serde_json::to_value(RunStatus::Completed).unwrap(),
            serde_json::json!("completed")
        );
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_transport_error() {
        // Port 9 (discard) on localhost is almost never listening
        let orchestrator = HttpOrchestrator::new("http://127.0.0.1:9", Duration::from_secs(2));
        let err = orchestrator
            .start(&WorkflowDefinition::generate_alerts(), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Transport(_)));
    }
}
