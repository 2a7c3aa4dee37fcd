//! Read models returned by the data layer
//!
//! The gateway only ever requests these (read) or marks them stale
//! (invalidate). Each refetch supersedes the previous snapshot wholesale.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    ActorType, AlertSeverity, AlertStatus, AlertType, EmployeeState, StreamEventType, StreamState,
};
use crate::query::FetchError;

// ============================================================================
// Action results
// ============================================================================

/// Discriminated `{ ok, data?, error? }` result used by some server actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult<T> {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ActionResult<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Convert into a fetch result.
    ///
    /// `ok: false` always becomes an error, using `fallback` when the action
    /// supplied no message. A successful result without data is the empty value.
    pub fn into_fetch_result(self, fallback: &str) -> Result<T, FetchError>
    where
        T: Default,
    {
        if !self.ok {
            let message = self
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| fallback.to_string());
            return Err(FetchError::new(message));
        }
        Ok(self.data.unwrap_or_default())
    }
}

// ============================================================================
// Employer views
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub status: EmployeeState,
    pub department: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub primary_wallet: Option<String>,
    pub hourly_rate_usd: Option<f64>,
    pub linked_streams: u32,
    pub invited_at: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStream {
    pub id: String,
    pub employee_id: Option<String>,
    pub employee_name: String,
    pub employee_wallet: Option<String>,
    pub stream_address: String,
    pub vault_address: String,
    pub employer_wallet: String,
    pub employer_token_account: String,
    pub mint_address: String,
    pub mint_label: String,
    pub hourly_rate: f64,
    pub total_deposited: f64,
    pub withdrawn_amount: f64,
    pub vault_balance: f64,
    pub available_to_withdraw: f64,
    pub status: StreamState,
    pub cluster: String,
    pub created_at: String,
    pub last_activity_at: Option<String>,
    pub deactivated_at: Option<String>,
    pub closed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAlert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub title: String,
    pub description: Option<String>,
    pub stream_id: Option<String>,
    pub employee_id: Option<String>,
    pub triggered_at: String,
    pub acknowledged_at: Option<String>,
    pub resolved_at: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

/// Input for creating an alert from the alert-generation workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertInput {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

/// Outcome of a create-alert call. `duplicate` is set when an open alert of
/// the same type already exists for the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertOutcome {
    pub ok: bool,
    #[serde(default)]
    pub alert_id: Option<String>,
    #[serde(default)]
    pub duplicate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationCounts {
    pub draft_streams: u64,
    pub pending_invitations: u64,
    pub unread_audit_items: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub activity_type: StreamEventType,
    pub actor_type: ActorType,
    pub actor_address: Option<String>,
    pub occurred_at: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamActivity {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub activity_type: String,
    pub actor_address: Option<String>,
    pub occurred_at: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Employee,
    Stream,
    Organization,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTrailEntry {
    pub id: String,
    pub timestamp: String,
    pub action: String,
    pub performed_by: String,
    pub details: String,
    pub category: AuditCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

// ============================================================================
// Employee views
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStreamSummary {
    pub id: String,
    pub stream_address: String,
    pub vault_address: String,
    pub mint_address: String,
    pub status: String,
    pub hourly_rate: Option<f64>,
    pub total_deposited: Option<f64>,
    pub withdrawn_amount: Option<f64>,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeWithdrawal {
    pub id: String,
    pub stream_id: Option<String>,
    pub amount: f64,
    pub occurred_at: Option<String>,
    pub signature: Option<String>,
    pub employer_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    pub total_earned: f64,
    pub available_to_withdraw: f64,
    pub active_streams: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewActivity {
    pub last_activity_at: Option<String>,
    pub days_until_employer_withdrawal: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStream {
    pub id: String,
    pub employer_name: Option<String>,
    pub employer_wallet: Option<String>,
    pub stream_address: String,
    pub vault_address: String,
    pub mint_address: Option<String>,
    pub status: String,
    pub hourly_rate: f64,
    pub total_earned: f64,
    pub withdrawn_amount: f64,
    pub available_balance: f64,
    pub created_at: Option<String>,
    pub last_activity_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentWithdrawal {
    pub id: String,
    pub stream_id: Option<String>,
    pub amount: f64,
    pub occurred_at: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDashboardOverview {
    pub organization: Option<NamedRef>,
    pub employee: Option<NamedRef>,
    pub stats: OverviewStats,
    pub activity: OverviewActivity,
    #[serde(default)]
    pub streams: Vec<OverviewStream>,
    #[serde(default)]
    pub recent_withdrawals: Vec<RecentWithdrawal>,
}

// ============================================================================
// On-chain views
// ============================================================================

/// Subset of an RPC `getAccountInfo` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub lamports: u64,
    pub owner: String,
    pub executable: bool,
    #[serde(default)]
    pub rent_epoch: u64,
    #[serde(default)]
    pub data: Value,
}

/// One entry of a `getTokenAccountsByOwner` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAccount {
    pub pubkey: String,
    pub account: AccountInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_result_failure_uses_message() {
        let result: ActionResult<Vec<EmployeeSummary>> = ActionResult::failure("db offline");
        let err = result.into_fetch_result("Failed to load employees").unwrap_err();
        assert_eq!(err.message(), "db offline");
    }

    #[test]
    fn test_action_result_failure_without_message() {
        let result: ActionResult<Vec<EmployeeSummary>> =
            serde_json::from_str(r#"{"ok": false}"#).unwrap();
        let err = result.into_fetch_result("Failed to load employees").unwrap_err();
        assert_eq!(err.message(), "Failed to load employees");
    }

    #[test]
    fn test_action_result_success_without_data_is_empty() {
        let result: ActionResult<Vec<EmployeeSummary>> =
            serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(result.into_fetch_result("unused").unwrap().is_empty());
    }

    #[test]
    fn test_alert_wire_format() {
        let json = serde_json::json!({
            "id": "a1",
            "type": "low_runway",
            "severity": "critical",
            "status": "open",
            "title": "Low runway warning",
            "description": null,
            "streamId": "s1",
            "employeeId": null,
            "triggeredAt": "2026-01-01T00:00:00Z",
            "acknowledgedAt": null,
            "resolvedAt": null,
            "metadata": {"runwayHours": 12.0}
        });
        let alert: DashboardAlert = serde_json::from_value(json).unwrap();
        assert_eq!(alert.alert_type, AlertType::LowRunway);
        assert_eq!(alert.stream_id.as_deref(), Some("s1"));
    }
}
