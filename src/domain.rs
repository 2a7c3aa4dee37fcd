//! Lifecycle enumerations shared with the data layer
//!
//! Values serialize exactly as the data layer stores them (`snake_case`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Parse failure for any of the closed enumerations below
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All variants in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// Employer account onboarding progress
    AccountState("account state") {
        NewAccount => "new_account",
        Onboarding => "onboarding",
        WalletConnected => "wallet_connected",
        FirstStreamCreated => "first_stream_created",
        FullyOperating => "fully_operating",
    }
}

string_enum! {
    /// Payroll stream lifecycle
    StreamState("stream state") {
        Active => "active",
        Suspended => "suspended",
        Closed => "closed",
        Draft => "draft",
    }
}

string_enum! {
    /// Employee lifecycle
    EmployeeState("employee state") {
        Draft => "draft",
        Invited => "invited",
        Ready => "ready",
        Archived => "archived",
    }
}

string_enum! {
    /// Stored alert status
    AlertStatus("alert status") {
        Open => "open",
        Acknowledged => "acknowledged",
        Resolved => "resolved",
        Dismissed => "dismissed",
    }
}

string_enum! {
    AlertSeverity("alert severity") {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

string_enum! {
    AlertType("alert type") {
        LowRunway => "low_runway",
        Inactivity => "inactivity",
        PendingAction => "pending_action",
        SuspendedStream => "suspended_stream",
        TokenAccount => "token_account",
        Custom => "custom",
    }
}

string_enum! {
    /// Activity recorded against a stream
    StreamEventType("stream event type") {
        StreamCreated => "stream_created",
        StreamTopUp => "stream_top_up",
        StreamWithdrawn => "stream_withdrawn",
        StreamRefreshActivity => "stream_refresh_activity",
        StreamEmergencyWithdraw => "stream_emergency_withdraw",
        StreamClosed => "stream_closed",
        StreamReactivated => "stream_reactivated",
    }
}

string_enum! {
    ActorType("actor type") {
        Employer => "employer",
        Employee => "employee",
        System => "system",
    }
}

/// Query-time alert filter.
///
/// `All` is never a stored status. The data layer treats it the same as
/// "no filter", which yields open and acknowledged alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertStatusFilter {
    Status(AlertStatus),
    All,
}

impl AlertStatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatusFilter::Status(status) => status.as_str(),
            AlertStatusFilter::All => "all",
        }
    }

    /// The stored status this filter restricts to, if any
    pub fn status(&self) -> Option<AlertStatus> {
        match self {
            AlertStatusFilter::Status(status) => Some(*status),
            AlertStatusFilter::All => None,
        }
    }
}

impl From<AlertStatus> for AlertStatusFilter {
    fn from(status: AlertStatus) -> Self {
        AlertStatusFilter::Status(status)
    }
}

impl fmt::Display for AlertStatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatusFilter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(AlertStatusFilter::All);
        }
        s.parse::<AlertStatus>()
            .map(AlertStatusFilter::Status)
            .map_err(|_| UnknownVariant {
                kind: "alert status filter",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_state_round_trip() {
        for state in StreamState::ALL {
            assert_eq!(state.as_str().parse::<StreamState>().unwrap(), *state);
        }
        assert_eq!(
            serde_json::to_string(&StreamState::Suspended).unwrap(),
            r#""suspended""#
        );
    }

    #[test]
    fn test_unknown_variant() {
        let err = "paused".parse::<StreamState>().unwrap_err();
        assert_eq!(err.kind, "stream state");
        assert_eq!(err.to_string(), "Unknown stream state value: paused");
    }

    #[test]
    fn test_account_state_serde() {
        let state: AccountState = serde_json::from_str(r#""first_stream_created""#).unwrap();
        assert_eq!(state, AccountState::FirstStreamCreated);
    }

    #[test]
    fn test_alert_filter_parsing() {
        assert_eq!("all".parse::<AlertStatusFilter>().unwrap(), AlertStatusFilter::All);
        assert_eq!(
            "dismissed".parse::<AlertStatusFilter>().unwrap(),
            AlertStatusFilter::Status(AlertStatus::Dismissed)
        );
        assert!("everything".parse::<AlertStatusFilter>().is_err());
        assert!("all".parse::<AlertStatus>().is_err());
    }

    #[test]
    fn test_alert_filter_status() {
        assert_eq!(AlertStatusFilter::All.status(), None);
        assert_eq!(
            AlertStatusFilter::from(AlertStatus::Open).status(),
            Some(AlertStatus::Open)
        );
    }
}
