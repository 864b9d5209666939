mod aggregate;
mod config;
mod error;
mod lease;
mod router;
mod routes;
mod state;
mod store;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swarm-registry", about = "Swarm model registry and distributed token router")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value = "7500", env = "SWARM_PORT")]
    port: u16,

    /// Base URL this registry is reachable at (used for its own fallback entry)
    #[arg(long, env = "SWARM_PUBLIC_URL")]
    public_url: Option<String>,

    /// Seconds a peer stays listed after its last registration
    #[arg(long, default_value = "60", env = "SWARM_LIVENESS_SECS")]
    liveness_secs: u64,

    /// Serve lease lifetime in seconds
    #[arg(long, default_value = "60", env = "SWARM_LEASE_TTL_SECS")]
    lease_ttl_secs: u64,

    /// Timeout for one next-token round, in milliseconds
    #[arg(long, default_value = "8000", env = "SWARM_ROUND_TIMEOUT_MS")]
    round_timeout_ms: u64,

    /// Overall deadline for one generate call, in seconds
    #[arg(long, default_value = "120", env = "SWARM_GENERATE_DEADLINE_SECS")]
    generate_deadline_secs: u64,

    /// Local model manifest (JSON) listed while no peer is registered
    #[arg(long, env = "SWARM_MANIFEST")]
    manifest: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::Config {
        port: cli.port,
        public_url: cli.public_url.unwrap_or_else(|| format!("http://127.0.0.1:{}", cli.port)),
        liveness_window: Duration::from_secs(cli.liveness_secs),
        lease_ttl: Duration::from_secs(cli.lease_ttl_secs),
        round_timeout: Duration::from_millis(cli.round_timeout_ms),
        generate_deadline: Duration::from_secs(cli.generate_deadline_secs),
        manifest: cli.manifest,
    };
    tracing::info!(
        port = cfg.port,
        liveness_secs = cli.liveness_secs,
        lease_ttl_secs = cli.lease_ttl_secs,
        manifest = ?cfg.manifest,
        "Starting swarm registry"
    );

    let addr = format!("0.0.0.0:{}", cfg.port);
    let state = state::AppState::new(cfg);
    let app = routes::create_router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Registry shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.ok(); };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => { stream.recv().await; }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
