//! Cascade gateway - dashboard cache and workflow trigger for Cascade

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use cascade_gateway::{
    actions::{DashboardActions, HttpDashboardActions, InMemoryDashboardActions},
    config::Args,
    logging,
    rpc::{HttpSolanaRpc, SolanaRpc},
    server::{self, AppState},
    workflow::{AlertGenerationWorkflow, HttpOrchestrator, LocalOrchestrator, GENERATE_ALERTS},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init_tracing(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Cascade Gateway");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Data API: {}", args.data_api_url.as_deref().unwrap_or("in-memory"));
    info!("Workflows: {}", args.workflow_url.as_deref().unwrap_or("in-process"));
    info!("Solana RPC: {} ({})", args.solana_rpc_url, args.solana_cluster);
    info!("======================================");

    let actions: Arc<dyn DashboardActions> = match args.data_api_url.as_deref() {
        Some(url) => Arc::new(HttpDashboardActions::new(url, args.request_timeout())?),
        None => {
            warn!("DATA_API_URL not set (dev mode), serving seeded demo data");
            Arc::new(InMemoryDashboardActions::with_demo_data().await)
        }
    };

    let rpc: Arc<dyn SolanaRpc> = Arc::new(HttpSolanaRpc::new(
        &args.solana_rpc_url,
        &args.solana_cluster,
        args.request_timeout(),
    ));

    let state = match args.workflow_url.clone() {
        Some(url) => {
            let orchestrator = Arc::new(HttpOrchestrator::new(&url, args.request_timeout()));
            info!("Remote orchestrator: {}", orchestrator.runs_url());
            AppState::new(args, actions, rpc, orchestrator)
        }
        None => {
            let local = Arc::new(LocalOrchestrator::new());
            local.register(
                GENERATE_ALERTS,
                Arc::new(AlertGenerationWorkflow::new(Arc::clone(&actions))),
            );
            AppState::with_local_orchestrator(args, actions, rpc, local)
        }
    };

    if let Err(e) = server::run(Arc::new(state)).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
