//! HTTP client for the data API
//!
//! Every view maps to one JSON endpoint under `DATA_API_URL`. Non-2xx
//! responses and undecodable bodies become [`FetchError`]s.

use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use super::DashboardActions;
use crate::domain::AlertStatusFilter;
use crate::models::{
    ActionResult, ActivityLogEntry, AuditTrailEntry, CreateAlertInput, CreateAlertOutcome,
    DashboardAlert, DashboardStream, EmployeeDashboardOverview, EmployeeStreamSummary,
    EmployeeSummary, EmployeeWithdrawal, NotificationCounts, StreamActivity,
};
use crate::query::FetchError;
use crate::types::{GatewayError, Result};

pub struct HttpDashboardActions {
    base: Url,
    http_client: reqwest::Client,
}

impl HttpDashboardActions {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| GatewayError::Config(format!("Invalid DATA_API_URL {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(GatewayError::Config(format!(
                "DATA_API_URL must be an http(s) base URL: {}",
                base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("cascade-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Ok(Self { base, http_client })
    }

    /// Append percent-encoded path segments to the base URL
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> std::result::Result<T, FetchError> {
        let url = self.endpoint(segments);
        debug!(url = %url, "Data API request");

        let response = self
            .http_client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        decode(&url, response).await
    }

    async fn post_json<B: serde::Serialize + Sync, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> std::result::Result<T, FetchError> {
        let url = self.endpoint(segments);
        debug!(url = %url, "Data API request");

        let response = self
            .http_client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        decode(&url, response).await
    }
}

fn transport_error(url: &Url, e: reqwest::Error) -> FetchError {
    warn!(url = %url, error = %e, "Data API unreachable");
    FetchError::new(format!("Data API request failed: {}", e))
}

async fn decode<T: DeserializeOwned>(url: &Url, response: reqwest::Response) -> std::result::Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
        warn!(url = %url, status = status.as_u16(), "Data API returned error status");
        return Err(FetchError::new(format!("Data API returned {} for {}", status, url.path())));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| FetchError::new(format!("Invalid data API response from {}: {}", url.path(), e)))
}

#[async_trait::async_trait]
impl DashboardActions for HttpDashboardActions {
    async fn get_dashboard_alerts(
        &self,
        status: Option<AlertStatusFilter>,
    ) -> std::result::Result<Vec<DashboardAlert>, FetchError> {
        let query: Vec<(&str, String)> = status
            .map(|s| vec![("status", s.as_str().to_string())])
            .unwrap_or_default();
        self.get_json(&["alerts"], &query).await
    }

    async fn list_dashboard_employees(
        &self,
    ) -> std::result::Result<ActionResult<Vec<EmployeeSummary>>, FetchError> {
        self.get_json(&["employees"], &[]).await
    }

    async fn get_dashboard_streams(&self) -> std::result::Result<Vec<DashboardStream>, FetchError> {
        self.get_json(&["streams"], &[]).await
    }

    async fn get_employee_dashboard_overview(
        &self,
    ) -> std::result::Result<EmployeeDashboardOverview, FetchError> {
        self.get_json(&["employee", "overview"], &[]).await
    }

    async fn get_employee_withdrawal_history(
        &self,
    ) -> std::result::Result<Vec<EmployeeWithdrawal>, FetchError> {
        self.get_json(&["employee", "withdrawals"], &[]).await
    }

    async fn get_activity_log(&self, limit: u32) -> std::result::Result<Vec<ActivityLogEntry>, FetchError> {
        self.get_json(&["activity"], &[("limit", limit.to_string())]).await
    }

    async fn get_stream_activity(
        &self,
        stream_id: &str,
    ) -> std::result::Result<Vec<StreamActivity>, FetchError> {
        self.get_json(&["streams", stream_id, "activity"], &[]).await
    }

    async fn get_notification_counts(&self) -> std::result::Result<NotificationCounts, FetchError> {
        self.get_json(&["notification-counts"], &[]).await
    }

    async fn get_employee_streams(
        &self,
        employee_id: &str,
    ) -> std::result::Result<ActionResult<Vec<EmployeeStreamSummary>>, FetchError> {
        self.get_json(&["employees", employee_id, "streams"], &[]).await
    }

    async fn get_audit_trail(
        &self,
        organization_id: &str,
        limit: u32,
    ) -> std::result::Result<Vec<AuditTrailEntry>, FetchError> {
        self.get_json(
            &["organizations", organization_id, "audit-trail"],
            &[("limit", limit.to_string())],
        )
        .await
    }

    async fn create_alert(
        &self,
        input: CreateAlertInput,
    ) -> std::result::Result<CreateAlertOutcome, FetchError> {
        self.post_json(&["alerts"], &input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    /// Serve canned responses keyed by "path?query"
    async fn stub_server(
        routes: Vec<(&'static str, StatusCode, &'static str)>,
    ) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = std::sync::Arc::new(routes);

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let routes = std::sync::Arc::clone(&routes);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let routes = std::sync::Arc::clone(&routes);
                        async move {
                            let target = req
                                .uri()
                                .path_and_query()
                                .map(|pq| pq.as_str().to_string())
                                .unwrap_or_default();
                            let (status, body) = routes
                                .iter()
                                .find(|(path, _, _)| *path == target)
                                .map(|(_, status, body)| (*status, *body))
                                .unwrap_or((StatusCode::NOT_FOUND, "{}"));
                            Ok::<_, hyper::Error>(
                                Response::builder()
                                    .status(status)
                                    .header("Content-Type", "application/json")
                                    .body(Full::new(Bytes::from(body)))
                                    .unwrap(),
                            )
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        addr
    }

    fn client(addr: SocketAddr) -> HttpDashboardActions {
        HttpDashboardActions::new(&format!("http://{}/api", addr), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(HttpDashboardActions::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpDashboardActions::new("mailto:ops@example.com", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let actions = HttpDashboardActions::new("http://data.local/api/", Duration::from_secs(1)).unwrap();
        let url = actions.endpoint(&["streams", "a/b c", "activity"]);
        assert_eq!(url.as_str(), "http://data.local/api/streams/a%2Fb%20c/activity");
    }

    #[tokio::test]
    async fn test_alerts_status_query() {
        let addr = stub_server(vec![
            ("/api/alerts?status=all", StatusCode::OK, "[]"),
            ("/api/alerts", StatusCode::OK, "[]"),
        ])
        .await;
        let actions = client(addr);

        assert!(actions
            .get_dashboard_alerts(Some(AlertStatusFilter::All))
            .await
            .unwrap()
            .is_empty());
        assert!(actions.get_dashboard_alerts(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_action_result_passthrough() {
        let addr = stub_server(vec![(
            "/api/employees",
            StatusCode::OK,
            r#"{"ok": false, "error": "Organization not found"}"#,
        )])
        .await;

        let result = client(addr).list_dashboard_employees().await.unwrap();
        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("Organization not found"));
    }

    #[tokio::test]
    async fn test_error_status_is_fetch_error() {
        let addr = stub_server(vec![(
            "/api/notification-counts",
            StatusCode::INTERNAL_SERVER_ERROR,
            "{}",
        )])
        .await;

        let err = client(addr).get_notification_counts().await.unwrap_err();
        assert!(err.message().contains("500"));
    }

    #[tokio::test]
    async fn test_decodes_counts() {
        let addr = stub_server(vec![(
            "/api/notification-counts",
            StatusCode::OK,
            r#"{"draftStreams": 2, "pendingInvitations": 1, "unreadAuditItems": 4}"#,
        )])
        .await;

        let counts = client(addr).get_notification_counts().await.unwrap();
        assert_eq!(counts.draft_streams, 2);
        assert_eq!(counts.unread_audit_items, 4);
    }
}
