//! On-chain RPC boundary
//!
//! Balance, account and token-account reads against a Solana JSON-RPC node.
//! Reads are never retried; a failure surfaces once as a [`FetchError`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{AccountInfo, TokenAccount};
use crate::query::FetchError;

/// SPL token program id used for token-account lookups
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

#[async_trait::async_trait]
pub trait SolanaRpc: Send + Sync {
    /// Cluster name used in cache keys (`devnet`, `mainnet-beta`, ...)
    fn cluster(&self) -> &str;

    /// Lamport balance of an address
    async fn get_balance(&self, address: &str) -> Result<u64, FetchError>;

    /// Account info, `None` when the account does not exist
    async fn get_account_info(&self, address: &str) -> Result<Option<AccountInfo>, FetchError>;

    /// SPL token accounts owned by an address
    async fn get_token_accounts(&self, owner: &str) -> Result<Vec<TokenAccount>, FetchError>;
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// `{ context, value }` wrapper used by most account methods
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

pub struct HttpSolanaRpc {
    url: String,
    cluster: String,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpSolanaRpc {
    pub fn new(url: &str, cluster: &str, request_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();

        Self {
            url: url.to_string(),
            cluster: cluster.to_string(),
            http_client,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, FetchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method = method, id = id, cluster = %self.cluster, "RPC call");

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(method = method, error = %e, "RPC request failed");
                FetchError::new(format!("RPC request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(FetchError::new(format!(
                "RPC node returned {} for {}",
                response.status(),
                method
            )));
        }

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| FetchError::new(format!("Invalid RPC response for {}: {}", method, e)))?;

        parse_rpc_response(method, parsed)
    }
}

fn parse_rpc_response<T>(method: &str, response: RpcResponse<T>) -> Result<T, FetchError> {
    if let Some(err) = response.error {
        return Err(FetchError::new(format!("RPC error {}: {}", err.code, err.message)));
    }
    response
        .result
        .ok_or_else(|| FetchError::new(format!("RPC response for {} has no result", method)))
}

#[async_trait::async_trait]
impl SolanaRpc for HttpSolanaRpc {
    fn cluster(&self) -> &str {
        &self.cluster
    }

    async fn get_balance(&self, address: &str) -> Result<u64, FetchError> {
        let result: WithContext<u64> = self
            .call("getBalance", json!([address, {"commitment": "confirmed"}]))
            .await?;
        Ok(result.value)
    }

    async fn get_account_info(&self, address: &str) -> Result<Option<AccountInfo>, FetchError> {
        let result: WithContext<Option<AccountInfo>> = self
            .call("getAccountInfo", json!([address, {"encoding": "base64"}]))
            .await?;
        Ok(result.value)
    }

    async fn get_token_accounts(&self, owner: &str) -> Result<Vec<TokenAccount>, FetchError> {
        let result: WithContext<Vec<TokenAccount>> = self
            .call(
                "getTokenAccountsByOwner",
                json!([owner, {"programId": TOKEN_PROGRAM_ID}, {"encoding": "jsonParsed"}]),
            )
            .await?;
        Ok(result.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_wins() {
        let response: RpcResponse<WithContext<u64>> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32602, "message": "Invalid param: WrongSize"}
        }))
        .unwrap();

        let err = parse_rpc_response("getBalance", response).unwrap_err();
        assert_eq!(err.message(), "RPC error -32602: Invalid param: WrongSize");
    }

    #[test]
    fn test_balance_result() {
        let response: RpcResponse<WithContext<u64>> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"context": {"slot": 1}, "value": 1_500_000_000u64}
        }))
        .unwrap();

        assert_eq!(parse_rpc_response("getBalance", response).unwrap().value, 1_500_000_000);
    }

    #[test]
    fn test_missing_account_is_none() {
        let response: RpcResponse<WithContext<Option<AccountInfo>>> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"context": {"slot": 1}, "value": null}
        }))
        .unwrap();

        assert!(parse_rpc_response("getAccountInfo", response).unwrap().value.is_none());
    }

    #[test]
    fn test_account_info_decodes() {
        let response: RpcResponse<WithContext<Option<AccountInfo>>> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"context": {"slot": 1}, "value": {
                "lamports": 2039280u64,
                "owner": TOKEN_PROGRAM_ID,
                "executable": false,
                "rentEpoch": 361u64,
                "data": ["", "base64"]
            }}
        }))
        .unwrap();

        let info = parse_rpc_response("getAccountInfo", response).unwrap().value.unwrap();
        assert_eq!(info.lamports, 2039280);
        assert_eq!(info.owner, TOKEN_PROGRAM_ID);
    }

    #[test]
    fn test_cluster_name() {
        let rpc = HttpSolanaRpc::new("http://127.0.0.1:8899", "devnet", Duration::from_secs(1));
        assert_eq!(rpc.cluster(), "devnet");
    }
}
