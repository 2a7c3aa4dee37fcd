//! Workflow routes
//!
//! `POST /api/workflows/generate-alerts` starts one alert-generation run and
//! answers only 200 or 500. `GET /api/workflows/runs/{id}` reports a run
//! tracked by the in-process orchestrator.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;

use super::json_response;
use crate::workflow::{trigger_alert_generation, Orchestrator, TriggerResult};

const STARTED_MESSAGE: &str = "Alert generation workflow started";
const FAILED_MESSAGE: &str = "Failed to start alert generation workflow";

/// Handle POST /api/workflows/generate-alerts
///
/// The request body is ignored.
pub async fn handle_generate_alerts(orchestrator: &dyn Orchestrator) -> Response<Full<Bytes>> {
    match trigger_alert_generation(orchestrator).await {
        TriggerResult::Started { run_id } => json_response(
            StatusCode::OK,
            &json!({
                "success": true,
                "message": STARTED_MESSAGE,
                "runId": run_id,
            }),
        ),
        TriggerResult::Failed { error } => json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &json!({
                "success": false,
                "message": FAILED_MESSAGE,
                "error": error,
            }),
        ),
    }
}

/// Handle GET /api/workflows/runs/{id}
pub fn handle_run_status(orchestrator: &dyn Orchestrator, run_id: &str) -> Response<Full<Bytes>> {
    match orchestrator.run_status(run_id) {
        Some(record) => json_response(StatusCode::OK, &record),
        None => json_response(
            StatusCode::NOT_FOUND,
            &json!({
                "error": "Run not found",
                "runId": run_id,
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::trigger::tests::MockOrchestrator;
    use crate::workflow::{LocalOrchestrator, OrchestratorError, WorkflowError, WorkflowHandler};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::Arc;

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_started_response() {
        let orchestrator = MockOrchestrator::accepting("run_123");
        let response = handle_generate_alerts(&orchestrator).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "success": true,
                "message": "Alert generation workflow started",
                "runId": "run_123",
            })
        );
    }

    #[tokio::test]
    async fn test_failed_response() {
        let orchestrator = MockOrchestrator::failing(OrchestratorError::Rejected("quota exceeded".into()));
        let response = handle_generate_alerts(&orchestrator).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({
                "success": false,
                "message": "Failed to start alert generation workflow",
                "error": "quota exceeded",
            })
        );
    }

    #[tokio::test]
    async fn test_opaque_failure_reports_unknown_error() {
        let orchestrator = MockOrchestrator::failing(OrchestratorError::Opaque);
        let response = handle_generate_alerts(&orchestrator).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Unknown error");
    }

    #[tokio::test]
    async fn test_remote_orchestrator_has_no_run_status() {
        let orchestrator = MockOrchestrator::accepting("run_1");
        let response = handle_run_status(&orchestrator, "run_1");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    struct Noop;

    #[async_trait::async_trait]
    impl WorkflowHandler for Noop {
        async fn run(&self, _args: Vec<Value>) -> Result<Value, WorkflowError> {
            Ok(json!({ "ok": true }))
        }
    }

    #[tokio::test]
    async fn test_local_run_status() {
        let orchestrator = LocalOrchestrator::new();
        orchestrator.register(crate::workflow::GENERATE_ALERTS, Arc::new(Noop));
        let mut completions = orchestrator.subscribe();

        let response = handle_generate_alerts(&orchestrator).await;
        let run_id = body_json(response).await["runId"].as_str().unwrap().to_string();
        completions.recv().await.unwrap();

        let response = handle_run_status(&orchestrator, &run_id);
        assert_eq!(response.status(), StatusCode::OK);
        let record = body_json(response).await;
        assert_eq!(record["runId"], run_id.as_str());
        assert_eq!(record["workflow"], "generate-alerts");
        assert_eq!(record["status"], "completed");
    }
}
