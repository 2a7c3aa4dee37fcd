//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one task per connection.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::actions::DashboardActions;
use crate::config::Args;
use crate::dashboard::{spawn_workflow_invalidation, DashboardViews, MutationRules};
use crate::query::{spawn_cleanup_task, QueryCache};
use crate::routes;
use crate::rpc::SolanaRpc;
use crate::types::Result;
use crate::workflow::{LocalOrchestrator, Orchestrator};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Process-wide query cache shared by every view
    pub cache: Arc<QueryCache>,
    pub views: DashboardViews,
    /// Mutation name → invalidated prefixes
    pub rules: MutationRules,
    /// Where `generate-alerts` runs are started
    pub orchestrator: Arc<dyn Orchestrator>,
    /// Set when workflows run in-process; its completions drive invalidation
    pub local_orchestrator: Option<Arc<LocalOrchestrator>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        args: Args,
        actions: Arc<dyn DashboardActions>,
        rpc: Arc<dyn SolanaRpc>,
        orchestrator: Arc<dyn Orchestrator>,
    ) -> Self {
        let cache = Arc::new(QueryCache::new(args.cache_config()));
        Self {
            args,
            cache,
            views: DashboardViews::new(actions, rpc),
            rules: MutationRules::default(),
            orchestrator,
            local_orchestrator: None,
            started_at: Instant::now(),
        }
    }

    /// State whose workflows run on an in-process orchestrator
    pub fn with_local_orchestrator(
        args: Args,
        actions: Arc<dyn DashboardActions>,
        rpc: Arc<dyn SolanaRpc>,
        local: Arc<LocalOrchestrator>,
    ) -> Self {
        let orchestrator: Arc<dyn Orchestrator> = local.clone();
        let mut state = Self::new(args, actions, rpc, orchestrator);
        state.local_orchestrator = Some(local);
        state
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;
    info!("Cascade gateway listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled - serving seeded in-memory data");
    }

    serve(listener, state).await
}

/// Serve connections from an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    spawn_cleanup_task(Arc::clone(&state.cache), state.args.cache_cleanup_interval());
    info!(
        "Query cache enabled (max {} entries, gc after {:?})",
        state.cache.config().max_entries,
        state.cache.config().gc_time
    );

    if let Some(ref local) = state.local_orchestrator {
        spawn_workflow_invalidation(local.subscribe(), Arc::clone(&state.cache), state.rules.clone());
        info!("Workflows run in-process");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        (Method::GET, "/version") => routes::version_info(),

        (Method::POST, "/api/workflows/generate-alerts") => {
            routes::handle_generate_alerts(state.orchestrator.as_ref()).await
        }

        (Method::GET, p) if p.starts_with("/api/workflows/runs/") => {
            let run_id = &p["/api/workflows/runs/".len()..];
            routes::handle_run_status(state.orchestrator.as_ref(), run_id)
        }

        (Method::POST, p) if p.starts_with("/api/dashboard/mutations/") => {
            let mutation = &p["/api/dashboard/mutations/".len()..];
            routes::handle_mutation(Arc::clone(&state), mutation)
        }

        (Method::GET, p) if p.starts_with("/api/dashboard/") => {
            let view = &p["/api/dashboard/".len()..];
            routes::handle_dashboard_request(Arc::clone(&state), view, query.as_deref()).await
        }

        (Method::GET, p) if p.starts_with("/api/solana/") => {
            let rest = &p["/api/solana/".len()..];
            routes::handle_solana_request(Arc::clone(&state), rest).await
        }

        (Method::GET, "/api/cache/stats") => routes::cache_stats(Arc::clone(&state)),

        (Method::OPTIONS, _) => preflight_response(),

        _ => routes::not_found_response(&path),
    };

    Ok(to_boxed(response))
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}
