//! Dashboard data-access hooks
//!
//! One constructor per view. Each binds the view's key, its fetch function
//! on the action or RPC boundary, and its freshness policy. Mount the result
//! with [`QueryObserver::mount`](crate::query::QueryObserver::mount) or read
//! it once with [`QuerySpec::fetch_through`].

use std::sync::Arc;
use std::time::Duration;

use super::keys;
use crate::actions::{DashboardActions, DEFAULT_ACTIVITY_LIMIT, DEFAULT_AUDIT_LIMIT};
use crate::domain::AlertStatusFilter;
use crate::models::{
    AccountInfo, ActivityLogEntry, AuditTrailEntry, DashboardAlert, DashboardStream,
    EmployeeDashboardOverview, EmployeeStreamSummary, EmployeeSummary, EmployeeWithdrawal,
    NotificationCounts, StreamActivity, TokenAccount,
};
use crate::query::{QueryPolicy, QuerySpec, RefetchOnMount};
use crate::rpc::SolanaRpc;

pub const EMPLOYEES_ERROR: &str = "Failed to load employees";
pub const EMPLOYEE_STREAMS_ERROR: &str = "Failed to load streams.";

/// Builds query specs for every dashboard view
#[derive(Clone)]
pub struct DashboardViews {
    actions: Arc<dyn DashboardActions>,
    rpc: Arc<dyn SolanaRpc>,
}

impl DashboardViews {
    pub fn new(actions: Arc<dyn DashboardActions>, rpc: Arc<dyn SolanaRpc>) -> Self {
        Self { actions, rpc }
    }

    pub fn actions(&self) -> &Arc<dyn DashboardActions> {
        &self.actions
    }

    /// Polled every minute, fresh for 30 seconds
    pub fn alerts(&self, status: Option<AlertStatusFilter>) -> QuerySpec<Vec<DashboardAlert>> {
        let actions = Arc::clone(&self.actions);
        QuerySpec::new(keys::alerts(status), move || {
            let actions = Arc::clone(&actions);
            async move { actions.get_dashboard_alerts(status).await }
        })
        .with_policy(
            QueryPolicy::default()
                .stale_time(Duration::from_secs(30))
                .refetch_interval(Duration::from_secs(60)),
        )
    }

    /// Always refetched on mount; `ok: false` surfaces as an error
    pub fn employees(&self) -> QuerySpec<Vec<EmployeeSummary>> {
        let actions = Arc::clone(&self.actions);
        QuerySpec::new(keys::employees(), move || {
            let actions = Arc::clone(&actions);
            async move {
                actions
                    .list_dashboard_employees()
                    .await?
                    .into_fetch_result(EMPLOYEES_ERROR)
            }
        })
        .with_policy(QueryPolicy::default().refetch_on_mount(RefetchOnMount::Always))
    }

    pub fn streams(&self) -> QuerySpec<Vec<DashboardStream>> {
        let actions = Arc::clone(&self.actions);
        QuerySpec::new(keys::streams(), move || {
            let actions = Arc::clone(&actions);
            async move { actions.get_dashboard_streams().await }
        })
    }

    pub fn employee_overview(&self) -> QuerySpec<EmployeeDashboardOverview> {
        let actions = Arc::clone(&self.actions);
        QuerySpec::new(keys::employee_overview(), move || {
            let actions = Arc::clone(&actions);
            async move { actions.get_employee_dashboard_overview().await }
        })
    }

    pub fn employee_withdrawals(&self) -> QuerySpec<Vec<EmployeeWithdrawal>> {
        let actions = Arc::clone(&self.actions);
        QuerySpec::new(keys::employee_withdrawals(), move || {
            let actions = Arc::clone(&actions);
            async move { actions.get_employee_withdrawal_history().await }
        })
    }

    /// `limit` defaults to 10. Server-rendered rows hydrate the cache.
    pub fn activity_log(
        &self,
        limit: Option<u32>,
        initial_data: Option<Vec<ActivityLogEntry>>,
    ) -> QuerySpec<Vec<ActivityLogEntry>> {
        let limit = limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
        let actions = Arc::clone(&self.actions);
        let spec = QuerySpec::new(keys::activity_log(limit), move || {
            let actions = Arc::clone(&actions);
            async move { actions.get_activity_log(limit).await }
        });
        match initial_data {
            Some(rows) => spec.with_initial_data(rows),
            None => spec,
        }
    }

    /// Disabled while no stream is selected
    pub fn stream_activity(&self, stream_id: &str) -> QuerySpec<Vec<StreamActivity>> {
        let actions = Arc::clone(&self.actions);
        let id = stream_id.to_string();
        QuerySpec::new(keys::stream_activity(stream_id), move || {
            let actions = Arc::clone(&actions);
            let id = id.clone();
            async move { actions.get_stream_activity(&id).await }
        })
        .with_policy(
            QueryPolicy::default()
                .stale_time(Duration::from_secs(30))
                .refetch_interval(Duration::from_secs(60))
                .enabled(!stream_id.is_empty()),
        )
    }

    /// Sidebar badges, polled every 30 seconds
    pub fn notification_counts(&self) -> QuerySpec<NotificationCounts> {
        let actions = Arc::clone(&self.actions);
        QuerySpec::new(keys::notification_counts(), move || {
            let actions = Arc::clone(&actions);
            async move { actions.get_notification_counts().await }
        })
        .with_policy(
            QueryPolicy::default()
                .stale_time(Duration::from_secs(20))
                .refetch_interval(Duration::from_secs(30)),
        )
    }

    pub fn employee_streams(
        &self,
        employee_id: Option<&str>,
        enabled: bool,
    ) -> QuerySpec<Vec<EmployeeStreamSummary>> {
        let has_id = employee_id.is_some_and(|id| !id.is_empty());
        let actions = Arc::clone(&self.actions);
        let id = employee_id.unwrap_or_default().to_string();
        QuerySpec::new(keys::employee_streams(employee_id), move || {
            let actions = Arc::clone(&actions);
            let id = id.clone();
            async move {
                actions
                    .get_employee_streams(&id)
                    .await?
                    .into_fetch_result(EMPLOYEE_STREAMS_ERROR)
            }
        })
        .with_policy(QueryPolicy::default().enabled(has_id && enabled))
    }

    /// `limit` defaults to 100
    pub fn audit_trail(&self, organization_id: &str, limit: Option<u32>) -> QuerySpec<Vec<AuditTrailEntry>> {
        let limit = limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
        let actions = Arc::clone(&self.actions);
        let org = organization_id.to_string();
        QuerySpec::new(keys::audit_trail(organization_id, limit), move || {
            let actions = Arc::clone(&actions);
            let org = org.clone();
            async move { actions.get_audit_trail(&org, limit).await }
        })
        .with_policy(
            QueryPolicy::default()
                .stale_time(Duration::from_secs(30))
                .enabled(!organization_id.is_empty()),
        )
    }

    pub fn balance(&self, address: &str, enabled: bool) -> QuerySpec<u64> {
        let rpc = Arc::clone(&self.rpc);
        let addr = address.to_string();
        QuerySpec::new(keys::balance(self.rpc.cluster(), address), move || {
            let rpc = Arc::clone(&rpc);
            let addr = addr.clone();
            async move { rpc.get_balance(&addr).await }
        })
        .with_policy(QueryPolicy::default().enabled(enabled && !address.is_empty()))
    }

    pub fn account_info(&self, address: &str) -> QuerySpec<Option<AccountInfo>> {
        let rpc = Arc::clone(&self.rpc);
        let addr = address.to_string();
        QuerySpec::new(keys::account_info(self.rpc.cluster(), address), move || {
            let rpc = Arc::clone(&rpc);
            let addr = addr.clone();
            async move { rpc.get_account_info(&addr).await }
        })
        .with_policy(QueryPolicy::default().enabled(!address.is_empty()))
    }

    pub fn token_accounts(&self, owner: &str) -> QuerySpec<Vec<TokenAccount>> {
        let rpc = Arc::clone(&self.rpc);
        let addr = owner.to_string();
        QuerySpec::new(keys::token_accounts(self.rpc.cluster(), owner), move || {
            let rpc = Arc::clone(&rpc);
            let addr = addr.clone();
            async move { rpc.get_token_accounts(&addr).await }
        })
        .with_policy(QueryPolicy::default().enabled(!owner.is_empty()))
    }
}
