//! Server action boundary
//!
//! The data layer that backs every dashboard view. The gateway never owns
//! these records; it reads them through [`DashboardActions`] and caches the
//! results under deterministic keys.
//!
//! Two implementations:
//! - [`HttpDashboardActions`]: JSON over HTTP against `DATA_API_URL`
//! - [`InMemoryDashboardActions`]: seeded in-process store for dev mode and tests

pub mod http;
pub mod memory;

pub use http::HttpDashboardActions;
pub use memory::InMemoryDashboardActions;

use crate::domain::AlertStatusFilter;
use crate::models::{
    ActionResult, ActivityLogEntry, AuditTrailEntry, CreateAlertInput, CreateAlertOutcome,
    DashboardAlert, DashboardStream, EmployeeDashboardOverview, EmployeeStreamSummary,
    EmployeeSummary, EmployeeWithdrawal, NotificationCounts, StreamActivity,
};
use crate::query::FetchError;

/// Default page size for the activity log
pub const DEFAULT_ACTIVITY_LIMIT: u32 = 10;

/// Default page size for the audit trail
pub const DEFAULT_AUDIT_LIMIT: u32 = 100;

/// Reads (and the single alert write) the dashboards depend on.
///
/// Methods returning a plain value report transport failures as `Err`.
/// Methods returning [`ActionResult`] may also report `ok: false`; callers
/// convert that into an error with a view-specific fallback message.
#[async_trait::async_trait]
pub trait DashboardActions: Send + Sync {
    /// Alerts for the current organization. `None` and `All` both mean open
    /// and acknowledged alerts.
    async fn get_dashboard_alerts(
        &self,
        status: Option<AlertStatusFilter>,
    ) -> Result<Vec<DashboardAlert>, FetchError>;

    async fn list_dashboard_employees(&self) -> Result<ActionResult<Vec<EmployeeSummary>>, FetchError>;

    async fn get_dashboard_streams(&self) -> Result<Vec<DashboardStream>, FetchError>;

    async fn get_employee_dashboard_overview(&self) -> Result<EmployeeDashboardOverview, FetchError>;

    async fn get_employee_withdrawal_history(&self) -> Result<Vec<EmployeeWithdrawal>, FetchError>;

    async fn get_activity_log(&self, limit: u32) -> Result<Vec<ActivityLogEntry>, FetchError>;

    async fn get_stream_activity(&self, stream_id: &str) -> Result<Vec<StreamActivity>, FetchError>;

    async fn get_notification_counts(&self) -> Result<NotificationCounts, FetchError>;

    async fn get_employee_streams(
        &self,
        employee_id: &str,
    ) -> Result<ActionResult<Vec<EmployeeStreamSummary>>, FetchError>;

    async fn get_audit_trail(
        &self,
        organization_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditTrailEntry>, FetchError>;

    /// Create an alert unless an open one of the same type already exists
    /// for the stream
    async fn create_alert(&self, input: CreateAlertInput) -> Result<CreateAlertOutcome, FetchError>;
}
