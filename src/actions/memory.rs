//! In-process data layer
//!
//! Used when the gateway runs in dev mode without a data API, and by tests
//! that need a real [`DashboardActions`] without a network.

use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::DashboardActions;
use crate::domain::{
    ActorType, AlertSeverity, AlertStatus, AlertStatusFilter, EmployeeState, StreamEventType,
    StreamState,
};
use crate::models::{
    ActionResult, ActivityLogEntry, AuditTrailEntry, CreateAlertInput, CreateAlertOutcome,
    DashboardAlert, DashboardStream, EmployeeDashboardOverview, EmployeeStreamSummary,
    EmployeeSummary, EmployeeWithdrawal, NotificationCounts, StreamActivity,
};
use crate::query::FetchError;

#[derive(Default)]
struct Store {
    alerts: Vec<DashboardAlert>,
    employees: Vec<EmployeeSummary>,
    streams: Vec<DashboardStream>,
    overview: EmployeeDashboardOverview,
    withdrawals: Vec<EmployeeWithdrawal>,
    activity: Vec<ActivityLogEntry>,
    stream_activity: HashMap<String, Vec<StreamActivity>>,
    employee_streams: HashMap<String, Vec<EmployeeStreamSummary>>,
    audit_trail: HashMap<String, Vec<AuditTrailEntry>>,
    pending_invitations: u64,
    /// When set, every read fails with this message
    failure: Option<String>,
}

#[derive(Default)]
pub struct InMemoryDashboardActions {
    store: RwLock<Store>,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl InMemoryDashboardActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_streams(&self, streams: Vec<DashboardStream>) {
        self.store.write().await.streams = streams;
    }

    pub async fn set_employees(&self, employees: Vec<EmployeeSummary>) {
        self.store.write().await.employees = employees;
    }

    pub async fn set_alerts(&self, alerts: Vec<DashboardAlert>) {
        self.store.write().await.alerts = alerts;
    }

    pub async fn set_activity(&self, activity: Vec<ActivityLogEntry>) {
        self.store.write().await.activity = activity;
    }

    pub async fn set_stream_activity(&self, stream_id: &str, activity: Vec<StreamActivity>) {
        self.store
            .write()
            .await
            .stream_activity
            .insert(stream_id.to_string(), activity);
    }

    pub async fn set_employee_streams(&self, employee_id: &str, streams: Vec<EmployeeStreamSummary>) {
        self.store
            .write()
            .await
            .employee_streams
            .insert(employee_id.to_string(), streams);
    }

    pub async fn set_audit_trail(&self, organization_id: &str, entries: Vec<AuditTrailEntry>) {
        self.store
            .write()
            .await
            .audit_trail
            .insert(organization_id.to_string(), entries);
    }

    pub async fn set_overview(&self, overview: EmployeeDashboardOverview) {
        self.store.write().await.overview = overview;
    }

    pub async fn set_withdrawals(&self, withdrawals: Vec<EmployeeWithdrawal>) {
        self.store.write().await.withdrawals = withdrawals;
    }

    pub async fn set_pending_invitations(&self, count: u64) {
        self.store.write().await.pending_invitations = count;
    }

    /// Make every subsequent read fail (`None` restores normal behavior)
    pub async fn set_failure(&self, message: Option<&str>) {
        self.store.write().await.failure = message.map(str::to_string);
    }

    /// Change a stored alert's status. Returns false if the id is unknown.
    pub async fn set_alert_status(&self, alert_id: &str, status: AlertStatus) -> bool {
        let mut store = self.store.write().await;
        match store.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                let now = now_rfc3339();
                match status {
                    AlertStatus::Acknowledged => alert.acknowledged_at = Some(now),
                    AlertStatus::Resolved | AlertStatus::Dismissed => alert.resolved_at = Some(now),
                    AlertStatus::Open => {}
                }
                alert.status = status;
                true
            }
            None => false,
        }
    }

    /// Every stored alert regardless of status
    pub async fn all_alerts(&self) -> Vec<DashboardAlert> {
        self.store.read().await.alerts.clone()
    }

    async fn check_failure(&self) -> Result<(), FetchError> {
        match &self.store.read().await.failure {
            Some(message) => Err(FetchError::new(message.clone())),
            None => Ok(()),
        }
    }

    /// A small organization with one healthy, one nearly drained and one
    /// suspended stream.
    pub async fn with_demo_data() -> Self {
        let actions = Self::new();
        let created = (Utc::now() - ChronoDuration::days(40)).to_rfc3339_opts(SecondsFormat::Millis, true);
        let recent = (Utc::now() - ChronoDuration::days(2)).to_rfc3339_opts(SecondsFormat::Millis, true);

        let employee = |id: &str, name: &str, status: EmployeeState| EmployeeSummary {
            id: id.to_string(),
            name: name.to_string(),
            email: Some(format!("{}@example.com", id)),
            status,
            department: Some("Engineering".to_string()),
            location: None,
            employment_type: Some("full_time".to_string()),
            primary_wallet: None,
            hourly_rate_usd: Some(45.0),
            linked_streams: 1,
            invited_at: None,
            created_at: created.clone(),
            tags: Vec::new(),
        };

        let stream = |id: &str, employee_id: &str, name: &str, balance: f64, status: StreamState| {
            DashboardStream {
                id: id.to_string(),
                employee_id: Some(employee_id.to_string()),
                employee_name: name.to_string(),
                employee_wallet: None,
                stream_address: format!("stream-{}", id),
                vault_address: format!("vault-{}", id),
                employer_wallet: "employer-wallet".to_string(),
                employer_token_account: "employer-ata".to_string(),
                mint_address: "demo-mint".to_string(),
                mint_label: "USDC".to_string(),
                hourly_rate: 45.0,
                total_deposited: 10_000.0,
                withdrawn_amount: 10_000.0 - balance,
                vault_balance: balance,
                available_to_withdraw: 0.0,
                status,
                cluster: "devnet".to_string(),
                created_at: created.clone(),
                last_activity_at: Some(recent.clone()),
                deactivated_at: None,
                closed_at: None,
            }
        };

        actions
            .set_employees(vec![
                employee("emp-1", "Ada Lovelace", EmployeeState::Ready),
                employee("emp-2", "Grace Hopper", EmployeeState::Ready),
                employee("emp-3", "Alan Turing", EmployeeState::Invited),
            ])
            .await;
        actions
            .set_streams(vec![
                stream("s-1", "emp-1", "Ada Lovelace", 9_000.0, StreamState::Active),
                stream("s-2", "emp-2", "Grace Hopper", 900.0, StreamState::Active),
                stream("s-3", "emp-3", "Alan Turing", 4_000.0, StreamState::Suspended),
            ])
            .await;
        actions
            .set_activity(vec![ActivityLogEntry {
                id: "act-1".to_string(),
                title: "Stream created".to_string(),
                description: Some("Payment stream created for Ada Lovelace".to_string()),
                activity_type: StreamEventType::StreamCreated,
                actor_type: ActorType::Employer,
                actor_address: Some("employer-wallet".to_string()),
                occurred_at: created.clone(),
                metadata: serde_json::json!({}),
            }])
            .await;
        actions.set_pending_invitations(1).await;
        actions
    }
}

#[async_trait::async_trait]
impl DashboardActions for InMemoryDashboardActions {
    async fn get_dashboard_alerts(
        &self,
        status: Option<AlertStatusFilter>,
    ) -> Result<Vec<DashboardAlert>, FetchError> {
        self.check_failure().await?;
        let wanted = status.and_then(|filter| filter.status());

        let store = self.store.read().await;
        let mut alerts: Vec<DashboardAlert> = store
            .alerts
            .iter()
            .filter(|alert| match wanted {
                Some(status) => alert.status == status,
                None => matches!(alert.status, AlertStatus::Open | AlertStatus::Acknowledged),
            })
            .cloned()
            .collect();
        // RFC 3339 timestamps in one format sort lexically
        alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(alerts)
    }

    async fn list_dashboard_employees(&self) -> Result<ActionResult<Vec<EmployeeSummary>>, FetchError> {
        let store = self.store.read().await;
        if let Some(message) = &store.failure {
            return Ok(ActionResult::failure(message.clone()));
        }
        Ok(ActionResult::success(store.employees.clone()))
    }

    async fn get_dashboard_streams(&self) -> Result<Vec<DashboardStream>, FetchError> {
        self.check_failure().await?;
        Ok(self.store.read().await.streams.clone())
    }

    async fn get_employee_dashboard_overview(&self) -> Result<EmployeeDashboardOverview, FetchError> {
        self.check_failure().await?;
        Ok(self.store.read().await.overview.clone())
    }

    async fn get_employee_withdrawal_history(&self) -> Result<Vec<EmployeeWithdrawal>, FetchError> {
        self.check_failure().await?;
        Ok(self.store.read().await.withdrawals.clone())
    }

    async fn get_activity_log(&self, limit: u32) -> Result<Vec<ActivityLogEntry>, FetchError> {
        self.check_failure().await?;
        let store = self.store.read().await;
        Ok(store.activity.iter().take(limit as usize).cloned().collect())
    }

    async fn get_stream_activity(&self, stream_id: &str) -> Result<Vec<StreamActivity>, FetchError> {
        self.check_failure().await?;
        let store = self.store.read().await;
        Ok(store.stream_activity.get(stream_id).cloned().unwrap_or_default())
    }

    async fn get_notification_counts(&self) -> Result<NotificationCounts, FetchError> {
        self.check_failure().await?;
        let store = self.store.read().await;
        let draft_streams = store
            .streams
            .iter()
            .filter(|s| s.status == StreamState::Draft)
            .count() as u64;
        let unread_audit_items = store
            .alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Open && a.severity != AlertSeverity::Low)
            .count() as u64;

        Ok(NotificationCounts {
            draft_streams,
            pending_invitations: store.pending_invitations,
            unread_audit_items,
        })
    }

    async fn get_employee_streams(
        &self,
        employee_id: &str,
    ) -> Result<ActionResult<Vec<EmployeeStreamSummary>>, FetchError> {
        let store = self.store.read().await;
        if let Some(message) = &store.failure {
            return Ok(ActionResult::failure(message.clone()));
        }
        Ok(ActionResult::success(
            store.employee_streams.get(employee_id).cloned().unwrap_or_default(),
        ))
    }

    async fn get_audit_trail(
        &self,
        organization_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditTrailEntry>, FetchError> {
        self.check_failure().await?;
        let store = self.store.read().await;
        Ok(store
            .audit_trail
            .get(organization_id)
            .map(|entries| entries.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn create_alert(&self, input: CreateAlertInput) -> Result<CreateAlertOutcome, FetchError> {
        self.check_failure().await?;
        let mut store = self.store.write().await;

        if let Some(existing) = store.alerts.iter().find(|a| {
            a.alert_type == input.alert_type
                && a.status == AlertStatus::Open
                && a.stream_id == input.stream_id
        }) {
            debug!(alert_id = %existing.id, alert_type = %input.alert_type, "Duplicate open alert");
            return Ok(CreateAlertOutcome {
                ok: true,
                alert_id: Some(existing.id.clone()),
                duplicate: true,
            });
        }

        let id = Uuid::new_v4().to_string();
        store.alerts.push(DashboardAlert {
            id: id.clone(),
            alert_type: input.alert_type,
            severity: input.severity,
            status: AlertStatus::Open,
            title: input.title,
            description: input.description,
            stream_id: input.stream_id,
            employee_id: input.employee_id,
            triggered_at: now_rfc3339(),
            acknowledged_at: None,
            resolved_at: None,
            metadata: input.metadata,
        });

        Ok(CreateAlertOutcome {
            ok: true,
            alert_id: Some(id),
            duplicate: false,
        })
    }
}
