//! Alert-generation workflow
//!
//! Scans every dashboard stream and raises alerts for low runway, long
//! inactivity, suspension and empty vaults. Alert creation is idempotent on
//! the data layer side (an open alert of the same type for the same stream
//! is reported as a duplicate), so the workflow can run as often as needed.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::local::{WorkflowError, WorkflowHandler};
use crate::actions::DashboardActions;
use crate::domain::{AlertSeverity, AlertType, StreamState};
use crate::models::{CreateAlertInput, CreateAlertOutcome, DashboardStream};
use crate::numeric::to_numeric_string;

/// Runway at or below this many hours raises a low-runway alert
pub const LOW_RUNWAY_HOURS: f64 = 72.0;

/// Hours without activity before an active stream is flagged
pub const INACTIVITY_HOURS: i64 = 24 * 25;

const UNKNOWN_EMPLOYEE: &str = "Unknown Employee";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertGenerationResult {
    pub ok: bool,
    pub alerts_created: usize,
    pub alerts_checked: usize,
}

pub struct AlertGenerationWorkflow {
    actions: Arc<dyn DashboardActions>,
}

impl AlertGenerationWorkflow {
    pub fn new(actions: Arc<dyn DashboardActions>) -> Self {
        Self { actions }
    }

    pub async fn execute(&self) -> Result<AlertGenerationResult, WorkflowError> {
        let streams = self.actions.get_dashboard_streams().await.map_err(|e| {
            error!(error = %e, "Failed to fetch dashboard streams");
            WorkflowError::Fatal("Failed to fetch dashboard streams".to_string())
        })?;

        if streams.is_empty() {
            return Ok(AlertGenerationResult {
                ok: true,
                alerts_created: 0,
                alerts_checked: 0,
            });
        }

        let now = Utc::now();
        let to_create: Vec<CreateAlertInput> = streams
            .iter()
            .flat_map(|stream| evaluate_stream(stream, now))
            .collect();
        let alerts_checked = to_create.len();

        let outcomes = join_all(to_create.into_iter().map(|input| self.create_alert_step(input))).await;
        let alerts_created = outcomes
            .iter()
            .filter(|outcome| outcome.ok && !outcome.duplicate)
            .count();

        info!(
            streams = streams.len(),
            alerts_checked = alerts_checked,
            alerts_created = alerts_created,
            "Alert generation finished"
        );

        Ok(AlertGenerationResult {
            ok: true,
            alerts_created,
            alerts_checked,
        })
    }

    /// A failed create is reported, never propagated
    async fn create_alert_step(&self, input: CreateAlertInput) -> CreateAlertOutcome {
        let stream_id = input.stream_id.clone();
        match self.actions.create_alert(input).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(stream_id = ?stream_id, error = %e, "Failed to create alert");
                CreateAlertOutcome {
                    ok: false,
                    alert_id: None,
                    duplicate: false,
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl WorkflowHandler for AlertGenerationWorkflow {
    async fn run(&self, _args: Vec<Value>) -> Result<Value, WorkflowError> {
        let result = self.execute().await?;
        serde_json::to_value(result).map_err(|e| WorkflowError::Fatal(e.to_string()))
    }
}

fn employee_name(stream: &DashboardStream) -> &str {
    if stream.employee_name.is_empty() {
        UNKNOWN_EMPLOYEE
    } else {
        &stream.employee_name
    }
}

/// Accepts RFC 3339, a naive timestamp (read as UTC) or a bare date
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Amounts go to the data layer's numeric columns as decimal strings
fn amount(value: f64) -> Value {
    to_numeric_string(value).map(Value::String).unwrap_or(Value::Null)
}

fn runway_severity(runway_hours: f64) -> AlertSeverity {
    if runway_hours <= 24.0 {
        AlertSeverity::Critical
    } else if runway_hours <= 48.0 {
        AlertSeverity::High
    } else {
        AlertSeverity::Medium
    }
}

/// Alerts one stream warrants at `now`, in rule order
pub fn evaluate_stream(stream: &DashboardStream, now: DateTime<Utc>) -> Vec<CreateAlertInput> {
    let mut alerts = Vec::new();
    let name = employee_name(stream);
    let active = stream.status == StreamState::Active;

    let alert = |alert_type, severity, title: &str, description: String, metadata: Value| CreateAlertInput {
        alert_type,
        severity,
        title: title.to_string(),
        description: Some(description),
        stream_id: Some(stream.id.clone()),
        employee_id: stream.employee_id.clone(),
        metadata,
    };

    if active && stream.hourly_rate > 0.0 {
        let runway_hours = stream.vault_balance / stream.hourly_rate;
        if runway_hours.is_finite() && runway_hours > 0.0 && runway_hours <= LOW_RUNWAY_HOURS {
            alerts.push(alert(
                AlertType::LowRunway,
                runway_severity(runway_hours),
                "Low runway warning",
                format!(
                    "Stream for {} has only {} hours of funding remaining.",
                    name,
                    runway_hours.round() as i64
                ),
                json!({
                    "runwayHours": runway_hours,
                    "vaultBalance": amount(stream.vault_balance),
                    "hourlyRate": amount(stream.hourly_rate),
                    "streamAddress": stream.stream_address,
                }),
            ));
        }
    }

    if let Some(last_activity) = stream.last_activity_at.as_deref().filter(|_| active) {
        match parse_timestamp(last_activity) {
            Some(at) => {
                let hours_since = (now - at).num_hours();
                if hours_since >= INACTIVITY_HOURS {
                    alerts.push(alert(
                        AlertType::Inactivity,
                        AlertSeverity::High,
                        "Stream inactive",
                        format!(
                            "Stream for {} has been inactive for {} days.",
                            name,
                            (hours_since as f64 / 24.0).round() as i64
                        ),
                        json!({
                            "hoursSinceActivity": hours_since,
                            "lastActivityAt": last_activity,
                            "streamAddress": stream.stream_address,
                        }),
                    ));
                }
            }
            None => {
                warn!(stream_id = %stream.id, value = %last_activity, "Failed to parse lastActivityAt");
            }
        }
    }

    if stream.status == StreamState::Suspended {
        alerts.push(alert(
            AlertType::SuspendedStream,
            AlertSeverity::Medium,
            "Stream suspended",
            format!("Payment stream for {} is currently suspended.", name),
            json!({
                "streamAddress": stream.stream_address,
                "suspendedAt": stream.deactivated_at,
            }),
        ));
    }

    if active && stream.vault_balance == 0.0 {
        alerts.push(alert(
            AlertType::TokenAccount,
            AlertSeverity::Critical,
            "Empty vault",
            format!("Stream for {} has zero balance. Top up immediately.", name),
            json!({
                "streamAddress": stream.stream_address,
                "vaultAddress": stream.vault_address,
            }),
        ));
    }

    alerts
}
