//! Query key registry
//!
//! The one place that decides how each dashboard view is keyed. Every key
//! starts with its view name so a single-segment prefix invalidates all
//! filter variants of a view.

use serde_json::json;

use crate::domain::AlertStatusFilter;
use crate::query::QueryKey;

pub const DASHBOARD_ALERTS: &str = "dashboard-alerts";
pub const DASHBOARD_EMPLOYEES: &str = "dashboard-employees";
pub const DASHBOARD_STREAMS: &str = "dashboard-streams";
pub const DASHBOARD_ACTIVITY: &str = "dashboard-activity";
pub const DASHBOARD_AUDIT_TRAIL: &str = "dashboard-audit-trail";
pub const EMPLOYEE_DASHBOARD: &str = "employee-dashboard";
pub const STREAM_ACTIVITY: &str = "stream-activity";
pub const NOTIFICATION_COUNTS: &str = "notification-counts";
pub const PAYMENT_STREAM: &str = "payment-stream";
pub const GET_BALANCE: &str = "get-balance";
pub const GET_ACCOUNT_INFO: &str = "get-account-info";
pub const GET_TOKEN_ACCOUNTS: &str = "get-token-accounts";

/// Key segment used when no alert status filter is given
pub const DEFAULT_ALERT_SEGMENT: &str = "active";

/// `[dashboard-alerts, <status | "all" | "active">]`
pub fn alerts(status: Option<AlertStatusFilter>) -> QueryKey {
    let segment = status.map(|s| s.as_str()).unwrap_or(DEFAULT_ALERT_SEGMENT);
    QueryKey::new(DASHBOARD_ALERTS).with(segment)
}

pub fn employees() -> QueryKey {
    QueryKey::new(DASHBOARD_EMPLOYEES)
}

pub fn streams() -> QueryKey {
    QueryKey::new(DASHBOARD_STREAMS)
}

pub fn employee_overview() -> QueryKey {
    QueryKey::from_parts(&[EMPLOYEE_DASHBOARD, "overview"])
}

pub fn employee_withdrawals() -> QueryKey {
    QueryKey::from_parts(&[EMPLOYEE_DASHBOARD, "withdrawals"])
}

pub fn activity_log(limit: u32) -> QueryKey {
    QueryKey::new(DASHBOARD_ACTIVITY).with(limit)
}

pub fn stream_activity(stream_id: &str) -> QueryKey {
    QueryKey::new(STREAM_ACTIVITY).with(stream_id)
}

pub fn notification_counts() -> QueryKey {
    QueryKey::new(NOTIFICATION_COUNTS)
}

/// `[payment-stream, employee-streams, <employee id | null>]`
pub fn employee_streams(employee_id: Option<&str>) -> QueryKey {
    QueryKey::from_parts(&[PAYMENT_STREAM, "employee-streams"]).with(employee_id)
}

pub fn audit_trail(organization_id: &str, limit: u32) -> QueryKey {
    QueryKey::new(DASHBOARD_AUDIT_TRAIL)
        .with(organization_id)
        .with(limit)
}

pub fn balance(cluster: &str, address: &str) -> QueryKey {
    QueryKey::new(GET_BALANCE).with(cluster).with(address)
}

pub fn account_info(cluster: &str, address: &str) -> QueryKey {
    QueryKey::new(GET_ACCOUNT_INFO).with(cluster).with(address)
}

/// `[get-token-accounts, {cluster, address}]`
pub fn token_accounts(cluster: &str, address: &str) -> QueryKey {
    QueryKey::new(GET_TOKEN_ACCOUNTS).with_params(&json!({
        "cluster": cluster,
        "address": address,
    }))
}
