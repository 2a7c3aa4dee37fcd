//! HTTP routes for the gateway

pub mod dashboard;
pub mod health;
pub mod solana;
pub mod workflows;

pub use dashboard::{cache_stats, handle_dashboard_request, handle_mutation};
pub use health::{health_check, version_info};
pub use solana::handle_solana_request;
pub use workflows::{handle_generate_alerts, handle_run_status};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// JSON response with the gateway's standard headers
pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(body)
        .unwrap_or_else(|_| br#"{"error":"Serialization failed"}"#.to_vec());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Not found response
pub fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "error": "Not Found",
            "path": path,
        }),
    )
}

/// Bad request response
pub fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::BAD_REQUEST,
        &serde_json::json!({
            "error": "Bad Request",
            "message": message,
        }),
    )
}

/// Parse an optional query string into `T`
pub(crate) fn parse_query<T: serde::de::DeserializeOwned>(query: Option<&str>) -> Result<T, String> {
    serde_urlencoded::from_str(query.unwrap_or("")).map_err(|e| format!("Invalid query string: {}", e))
}
