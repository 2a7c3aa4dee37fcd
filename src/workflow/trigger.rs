//! Alert-generation trigger
//!
//! The one entry point callers use to kick off alert generation. It never
//! fails outright: every outcome is folded into a [`TriggerResult`].

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{error, info};

use super::orchestrator::{Orchestrator, WorkflowDefinition};

const UNKNOWN_ERROR: &str = "Unknown error";

/// Outcome of a trigger attempt.
///
/// Serializes as `{"ok": true, "runId": ...}` or `{"ok": false, "error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerResult {
    Started { run_id: String },
    Failed { error: String },
}

impl TriggerResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, TriggerResult::Started { .. })
    }

    pub fn run_id(&self) -> Option<&str> {
        match self {
            TriggerResult::Started { run_id } => Some(run_id.as_str()),
            TriggerResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TriggerResult::Started { .. } => None,
            TriggerResult::Failed { error } => Some(error.as_str()),
        }
    }
}

impl Serialize for TriggerResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            TriggerResult::Started { run_id } => {
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("runId", run_id)?;
            }
            TriggerResult::Failed { error } => {
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}

/// Start one run of the alert-generation workflow with no arguments.
///
/// Waits only for the orchestrator to accept the run, never for the run to
/// finish. Each call starts an independent run.
pub async fn trigger_alert_generation(orchestrator: &dyn Orchestrator) -> TriggerResult {
    match orchestrator
        .start(&WorkflowDefinition::generate_alerts(), Vec::new())
        .await
    {
        Ok(run) => {
            info!(run_id = %run.run_id, "Alert generation workflow started");
            TriggerResult::Started { run_id: run.run_id }
        }
        Err(e) => {
            error!(error = %e, "Failed to start alert generation workflow");
            TriggerResult::Failed {
                error: e.message().unwrap_or(UNKNOWN_ERROR).to_string(),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::workflow::orchestrator::{OrchestratorError, WorkflowRun};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Orchestrator double that records calls and replays a fixed outcome
    pub(crate) struct MockOrchestrator {
        outcome: Result<String, OrchestratorError>,
        pub calls: AtomicUsize,
        pub last_call: Mutex<Option<(String, Vec<Value>)>>,
    }

    impl MockOrchestrator {
        pub(crate) fn accepting(run_id: &str) -> Self {
            Self {
                outcome: Ok(run_id.to_string()),
                calls: AtomicUsize::new(0),
                last_call: Mutex::new(None),
            }
        }

        pub(crate) fn failing(error: OrchestratorError) -> Self {
            Self {
                outcome: Err(error),
                calls: AtomicUsize::new(0),
                last_call: Mutex::new(None),
            }
        }
    }

    #[async_trait::async_trait]
    impl Orchestrator for MockOrchestrator {
        async fn start(
            &self,
            workflow: &WorkflowDefinition,
            args: Vec<Value>,
        ) -> Result<WorkflowRun, OrchestratorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_call.lock().unwrap() = Some((workflow.name.clone(), args));
            self.outcome.clone().map(|run_id| WorkflowRun {
                // Successive runs get distinct ids
                run_id: if n == 0 { run_id } else { format!("{}-{}", run_id, n) },
            })
        }
    }

    #[tokio::test]
    async fn test_started() {
        let orchestrator = MockOrchestrator::accepting("run_123");
        let result = trigger_alert_generation(&orchestrator).await;

        assert_eq!(result, TriggerResult::Started { run_id: "run_123".into() });
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"ok": true, "runId": "run_123"})
        );

        let (workflow, args) = orchestrator.last_call.lock().unwrap().clone().unwrap();
        assert_eq!(workflow, "generate-alerts");
        assert!(args.is_empty());
    }

    #[tokio::test]
    async fn test_failure_with_message() {
        let orchestrator =
            MockOrchestrator::failing(OrchestratorError::Transport("connection refused".into()));
        let result = trigger_alert_generation(&orchestrator).await;

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"ok": false, "error": "connection refused"})
        );
    }

    #[tokio::test]
    async fn test_failure_without_message() {
        let orchestrator = MockOrchestrator::failing(OrchestratorError::Opaque);
        let result = trigger_alert_generation(&orchestrator).await;
        assert_eq!(result.error(), Some("Unknown error"));
        assert!(!result.is_ok());
    }

    #[tokio::test]
    async fn test_each_call_starts_a_run() {
        let orchestrator = MockOrchestrator::accepting("run");
        let first = trigger_alert_generation(&orchestrator).await;
        let second = trigger_alert_generation(&orchestrator).await;

        assert_eq!(orchestrator.calls.load(Ordering::SeqCst), 2);
        assert_ne!(first.run_id(), second.run_id());
    }

    #[test]
    fn test_resolves_immediately_on_acceptance() {
        let orchestrator = MockOrchestrator::accepting("run_1");
        let mut task = tokio_test::task::spawn(trigger_alert_generation(&orchestrator));
        let result = tokio_test::assert_ready!(task.poll());
        assert!(result.is_ok());
    }
}
