//! In-process orchestrator
//!
//! Runs registered workflows as tokio tasks. `start` returns once the run is
//! recorded and spawned; its status is then queryable by run id, and every
//! finished run is published to subscribers.

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info};
use uuid::Uuid;

use super::orchestrator::{
    Orchestrator, OrchestratorError, RunRecord, RunStatus, WorkflowDefinition, WorkflowRun,
};

/// Finished runs kept for status queries
const DEFAULT_RUN_HISTORY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// Unrecoverable failure; the run ends as failed
    #[error("{0}")]
    Fatal(String),
}

/// Body of a workflow the local orchestrator can run
#[async_trait::async_trait]
pub trait WorkflowHandler: Send + Sync {
    async fn run(&self, args: Vec<Value>) -> Result<Value, WorkflowError>;
}

pub struct LocalOrchestrator {
    workflows: DashMap<String, Arc<dyn WorkflowHandler>>,
    runs: Arc<DashMap<String, RunRecord>>,
    completions: broadcast::Sender<RunRecord>,
    max_history: usize,
}

impl LocalOrchestrator {
    pub fn new() -> Self {
        let (completions, _) = broadcast::channel(64);
        Self {
            workflows: DashMap::new(),
            runs: Arc::new(DashMap::new()),
            completions,
            max_history: DEFAULT_RUN_HISTORY,
        }
    }

    pub fn register(&self, name: &str, handler: Arc<dyn WorkflowHandler>) {
        info!(workflow = name, "Registered local workflow");
        self.workflows.insert(name.to_string(), handler);
    }

    /// Receive every run as it completes or fails
    pub fn subscribe(&self) -> broadcast::Receiver<RunRecord> {
        self.completions.subscribe()
    }

    pub fn get_run(&self, run_id: &str) -> Option<RunRecord> {
        self.runs.get(run_id).map(|r| r.clone())
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Drop the oldest finished runs beyond the history limit
    fn prune(&self) {
        let excess = self.runs.len().saturating_sub(self.max_history);
        if excess == 0 {
            return;
        }

        let mut finished: Vec<(String, chrono::DateTime<Utc>)> = self
            .runs
            .iter()
            .filter(|r| matches!(r.status, RunStatus::Completed | RunStatus::Failed))
            .map(|r| (r.run_id.clone(), r.started_at))
            .collect();
        finished.sort_by_key(|(_, started)| *started);

        for (run_id, _) in finished.into_iter().take(excess) {
            self.runs.remove(&run_id);
        }
    }
}

impl Default for LocalOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn update_run(runs: &DashMap<String, RunRecord>, run_id: &str, f: impl FnOnce(&mut RunRecord)) -> Option<RunRecord> {
    runs.get_mut(run_id).map(|mut record| {
        f(&mut record);
        record.clone()
    })
}

#[async_trait::async_trait]
impl Orchestrator for LocalOrchestrator {
    async fn start(
        &self,
        workflow: &WorkflowDefinition,
        args: Vec<Value>,
    ) -> Result<WorkflowRun, OrchestratorError> {
        let handler = self
            .workflows
            .get(&workflow.name)
            .map(|h| Arc::clone(h.value()))
            .ok_or_else(|| OrchestratorError::Rejected(format!("Unknown workflow: {}", workflow.name)))?;

        self.prune();

        let run_id = Uuid::new_v4().to_string();
        self.runs.insert(
            run_id.clone(),
            RunRecord {
                run_id: run_id.clone(),
                workflow: workflow.name.clone(),
                status: RunStatus::Pending,
                output: None,
                error: None,
                started_at: Utc::now(),
                finished_at: None,
            },
        );

        let runs = Arc::clone(&self.runs);
        let completions = self.completions.clone();
        let id = run_id.clone();
        let name = workflow.name.clone();

        tokio::spawn(async move {
            update_run(&runs, &id, |r| r.status = RunStatus::Running);

            let outcome = handler.run(args).await;
            let finished = update_run(&runs, &id, |r| {
                r.finished_at = Some(Utc::now());
                match outcome {
                    Ok(output) => {
                        r.status = RunStatus::Completed;
                        r.output = Some(output);
                    }
                    Err(e) => {
                        r.status = RunStatus::Failed;
                        r.error = Some(e.to_string());
                    }
                }
            });

            if let Some(record) = finished {
                match record.status {
                    RunStatus::Failed => error!(
                        run_id = %id,
                        workflow = %name,
                        error = record.error.as_deref().unwrap_or_default(),
                        "Workflow run failed"
                    ),
                    _ => info!(run_id = %id, workflow = %name, "Workflow run completed"),
                }
                // No subscribers is fine
                let _ = completions.send(record);
            }
        });

        Ok(WorkflowRun { run_id })
    }

    fn run_status(&self, run_id: &str) -> Option<RunRecord> {
        self.get_run(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait::async_trait]
    impl WorkflowHandler for Echo {
        async fn run(&self, args: Vec<Value>) -> Result<Value, WorkflowError> {
            Ok(json!({ "args": args }))
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl WorkflowHandler for Broken {
        async fn run(&self, _args: Vec<Value>) -> Result<Value, WorkflowError> {
            Err(WorkflowError::Fatal("Failed to fetch dashboard streams".into()))
        }
    }

    #[tokio::test]
    async fn test_run_completes() {
        let orchestrator = LocalOrchestrator::new();
        orchestrator.register("echo", Arc::new(Echo));
        let mut completions = orchestrator.subscribe();

        let run = orchestrator
            .start(&WorkflowDefinition::new("echo"), vec![json!(1)])
            .await
            .unwrap();
        assert!(Uuid::parse_str(&run.run_id).is_ok());

        let record = completions.recv().await.unwrap();
        assert_eq!(record.run_id, run.run_id);
        assert_eq!(record.status, RunStatus::Completed);
        assert_eq!(record.output, Some(json!({ "args": [1] })));

        let status = orchestrator.run_status(&run.run_id).unwrap();
        assert_eq!(status.status, RunStatus::Completed);
        assert!(status.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_run_is_recorded() {
        let orchestrator = LocalOrchestrator::new();
        orchestrator.register("broken", Arc::new(Broken));
        let mut completions = orchestrator.subscribe();

        // Acceptance succeeds even though the run will fail
        let run = orchestrator
            .start(&WorkflowDefinition::new("broken"), Vec::new())
            .await
            .unwrap();

        let record = completions.recv().await.unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("Failed to fetch dashboard streams"));
        assert_eq!(orchestrator.get_run(&run.run_id).unwrap().status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_workflow_rejected() {
        let orchestrator = LocalOrchestrator::new();
        let err = orchestrator
            .start(&WorkflowDefinition::generate_alerts(), Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.message(), Some("Unknown workflow: generate-alerts"));
        assert_eq!(orchestrator.run_count(), 0);
    }

    #[tokio::test]
    async fn test_distinct_run_ids() {
        let orchestrator = LocalOrchestrator::new();
        orchestrator.register("echo", Arc::new(Echo));
        let def = WorkflowDefinition::new("echo");

        let a = orchestrator.start(&def, Vec::new()).await.unwrap();
        let b = orchestrator.start(&def, Vec::new()).await.unwrap();
        assert_ne!(a.run_id, b.run_id);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let mut orchestrator = LocalOrchestrator::new();
        orchestrator.max_history = 2;
        orchestrator.register("echo", Arc::new(Echo));
        let mut completions = orchestrator.subscribe();
        let def = WorkflowDefinition::new("echo");

        for _ in 0..4 {
            orchestrator.start(&def, Vec::new()).await.unwrap();
            completions.recv().await.unwrap();
        }
        assert!(orchestrator.run_count() <= 3);
    }
}
