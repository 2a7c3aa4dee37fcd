//! On-chain read routes
//!
//! - GET /api/solana/{address}/balance
//! - GET /api/solana/{address}/account
//! - GET /api/solana/{address}/token-accounts
//!
//! Served through the cache with stale time zero, so every request reads the
//! node once and concurrent identical reads share that call.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use super::{json_response, not_found_response};
use crate::query::FetchError;
use crate::server::AppState;

fn rpc_error(address: &str, e: &FetchError) -> Response<Full<Bytes>> {
    warn!(address = address, error = %e, "On-chain read failed");
    json_response(StatusCode::BAD_GATEWAY, &json!({ "error": e.message() }))
}

/// Handle GET /api/solana/{address}/{resource}
pub async fn handle_solana_request(state: Arc<AppState>, rest: &str) -> Response<Full<Bytes>> {
    let (address, resource) = match rest.trim_matches('/').split_once('/') {
        Some((address, resource)) if !address.is_empty() => (address, resource),
        _ => return not_found_response(&format!("/api/solana/{}", rest)),
    };
    let cache = state.cache.as_ref();
    let cluster = state.args.solana_cluster.as_str();

    match resource {
        "balance" => match state.views.balance(address, true).fetch_through(cache).await {
            Ok(lamports) => json_response(
                StatusCode::OK,
                &json!({ "address": address, "cluster": cluster, "lamports": *lamports }),
            ),
            Err(e) => rpc_error(address, &e),
        },
        "account" => match state.views.account_info(address).fetch_through(cache).await {
            Ok(account) => json_response(StatusCode::OK, &*account),
            Err(e) => rpc_error(address, &e),
        },
        "token-accounts" => match state.views.token_accounts(address).fetch_through(cache).await {
            Ok(accounts) => json_response(StatusCode::OK, &*accounts),
            Err(e) => rpc_error(address, &e),
        },
        _ => not_found_response(&format!("/api/solana/{}", rest)),
    }
}
