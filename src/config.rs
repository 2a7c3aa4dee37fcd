//! Configuration for the gateway
//!
//! CLI arguments with environment variable fallbacks using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::logging::LogFormat;
use crate::query::QueryCacheConfig;

/// Cascade gateway - dashboard cache and alert-generation workflow trigger
#[derive(Parser, Debug, Clone)]
#[command(name = "cascade-gateway")]
#[command(about = "Dashboard cache and workflow gateway for Cascade streaming payroll")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Enable development mode (seeded in-memory data layer)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Base URL of the data layer's dashboard API
    /// (e.g., "http://localhost:3000/api/internal")
    #[arg(long, env = "DATA_API_URL")]
    pub data_api_url: Option<String>,

    /// Base URL of the workflow orchestration engine.
    /// When unset, workflows run in-process.
    #[arg(long, env = "WORKFLOW_URL")]
    pub workflow_url: Option<String>,

    /// Solana JSON-RPC endpoint
    #[arg(long, env = "SOLANA_RPC_URL", default_value = "https://api.devnet.solana.com")]
    pub solana_rpc_url: String,

    /// Solana cluster name, used in on-chain query keys
    #[arg(long, env = "SOLANA_CLUSTER", default_value = "devnet")]
    pub solana_cluster: String,

    /// Request timeout in milliseconds for outbound calls
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Maximum cached query entries
    #[arg(long, env = "CACHE_MAX_ENTRIES", default_value = "1000")]
    pub cache_max_entries: usize,

    /// Seconds an unobserved query entry is kept
    #[arg(long, env = "CACHE_GC_SECS", default_value = "300")]
    pub cache_gc_secs: u64,

    /// Seconds between cache cleanup sweeps
    #[arg(long, env = "CACHE_CLEANUP_SECS", default_value = "60")]
    pub cache_cleanup_secs: u64,
}

impl Args {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cache_cleanup_secs)
    }

    pub fn cache_config(&self) -> QueryCacheConfig {
        QueryCacheConfig {
            gc_time: Duration::from_secs(self.cache_gc_secs),
            max_entries: self.cache_max_entries,
            ..QueryCacheConfig::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.data_api_url.is_none() {
            return Err("DATA_API_URL is required in production mode".to_string());
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.cache_max_entries == 0 {
            return Err("CACHE_MAX_ENTRIES must be greater than zero".to_string());
        }

        if self.cache_cleanup_secs == 0 {
            return Err("CACHE_CLEANUP_SECS must be greater than zero".to_string());
        }

        Ok(())
    }
}
