//! Dashboard routes
//!
//! Read-only views served through the shared [`QueryCache`], plus the
//! mutation endpoint that turns a mutation performed elsewhere into cache
//! invalidations.
//!
//! - GET /api/dashboard/alerts?status=
//! - GET /api/dashboard/employees
//! - GET /api/dashboard/employees/{id}/streams
//! - GET /api/dashboard/streams
//! - GET /api/dashboard/streams/{id}/activity
//! - GET /api/dashboard/activity?limit=
//! - GET /api/dashboard/notification-counts
//! - GET /api/dashboard/employee/overview
//! - GET /api/dashboard/employee/withdrawals
//! - GET /api/dashboard/organizations/{id}/audit-trail?limit=
//! - POST /api/dashboard/mutations/{action}
//! - GET /api/cache/stats

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{bad_request_response, json_response, not_found_response, parse_query};
use crate::domain::AlertStatusFilter;
use crate::query::{QueryCache, QuerySpec};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
struct AlertsQuery {
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LimitQuery {
    limit: Option<u32>,
}

/// Read a view through the cache. Fetch failures become 502.
async fn serve_view<T>(cache: &QueryCache, spec: QuerySpec<T>) -> Response<Full<Bytes>>
where
    T: Serialize + Send + Sync + 'static,
{
    match spec.fetch_through(cache).await {
        Ok(data) => json_response(StatusCode::OK, &*data),
        Err(e) => {
            warn!(key = %spec.key, error = %e, "Dashboard view fetch failed");
            json_response(StatusCode::BAD_GATEWAY, &json!({ "error": e.message() }))
        }
    }
}

/// Handle GET /api/dashboard/{view}
///
/// `view` is the path after `/api/dashboard/`.
pub async fn handle_dashboard_request(
    state: Arc<AppState>,
    view: &str,
    query: Option<&str>,
) -> Response<Full<Bytes>> {
    let segments: Vec<&str> = view.trim_matches('/').split('/').collect();
    let cache = state.cache.as_ref();
    let views = &state.views;

    match segments.as_slice() {
        ["alerts"] => {
            let params: AlertsQuery = match parse_query(query) {
                Ok(p) => p,
                Err(e) => return bad_request_response(&e),
            };
            let status = match params.status.as_deref().map(str::parse::<AlertStatusFilter>) {
                None => None,
                Some(Ok(filter)) => Some(filter),
                Some(Err(e)) => return bad_request_response(&e.to_string()),
            };
            serve_view(cache, views.alerts(status)).await
        }
        ["employees"] => serve_view(cache, views.employees()).await,
        ["employees", id, "streams"] if !id.is_empty() => {
            serve_view(cache, views.employee_streams(Some(*id), true)).await
        }
        ["streams"] => serve_view(cache, views.streams()).await,
        ["streams", id, "activity"] if !id.is_empty() => {
            serve_view(cache, views.stream_activity(id)).await
        }
        ["activity"] => match parse_query::<LimitQuery>(query) {
            Ok(params) => serve_view(cache, views.activity_log(params.limit, None)).await,
            Err(e) => bad_request_response(&e),
        },
        ["notification-counts"] => serve_view(cache, views.notification_counts()).await,
        ["employee", "overview"] => serve_view(cache, views.employee_overview()).await,
        ["employee", "withdrawals"] => serve_view(cache, views.employee_withdrawals()).await,
        ["organizations", id, "audit-trail"] if !id.is_empty() => {
            match parse_query::<LimitQuery>(query) {
                Ok(params) => serve_view(cache, views.audit_trail(id, params.limit)).await,
                Err(e) => bad_request_response(&e),
            }
        }
        _ => not_found_response(&format!("/api/dashboard/{}", view)),
    }
}

/// Handle POST /api/dashboard/mutations/{action}
pub fn handle_mutation(state: Arc<AppState>, mutation: &str) -> Response<Full<Bytes>> {
    match state.rules.apply(&state.cache, mutation) {
        Some(prefixes) => {
            let invalidated: Vec<String> = prefixes.iter().map(|p| p.to_storage_key()).collect();
            debug!(mutation = mutation, invalidated = ?invalidated, "Mutation reported");
            json_response(
                StatusCode::ACCEPTED,
                &json!({
                    "mutation": mutation,
                    "invalidated": invalidated,
                }),
            )
        }
        None => json_response(
            StatusCode::NOT_FOUND,
            &json!({
                "error": "Unknown mutation",
                "mutation": mutation,
                "known": state.rules.mutations(),
            }),
        ),
    }
}

/// Handle GET /api/cache/stats
pub fn cache_stats(state: Arc<AppState>) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &state.cache.stats())
}
