mod announce;
mod backend;
mod config;
mod server;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use swarm_protocol::RegistryClient;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swarm-node", about = "Swarm inference node: advertises local models to a registry")]
struct Cli {
    /// Registry URL (e.g. http://registry:7500)
    #[arg(long, env = "SWARM_REGISTRY")]
    registry: String,

    /// Peer id; a random one is generated when omitted
    #[arg(long, env = "SWARM_PEER_ID")]
    peer_id: Option<String>,

    /// Base URL other nodes reach this node at
    #[arg(long, env = "SWARM_NODE_PUBLIC_URL")]
    public_url: Option<String>,

    /// Port for the next-token API
    #[arg(long, default_value = "7600", env = "SWARM_NODE_PORT")]
    port: u16,

    /// Model manifest written by the local model manager
    #[arg(long, default_value = "./models.json", env = "SWARM_MANIFEST")]
    manifest: PathBuf,

    /// OpenAI-compatible inference backend
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "SWARM_BACKEND")]
    backend: String,

    /// Seconds between registrations (keep well under the registry liveness window)
    #[arg(long, default_value = "20", env = "SWARM_REGISTER_INTERVAL_SECS")]
    register_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::Config {
        registry_url: cli.registry,
        peer_id: cli.peer_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        public_url: cli.public_url.unwrap_or_else(|| format!("http://127.0.0.1:{}", cli.port)),
        port: cli.port,
        manifest: cli.manifest,
        backend_url: cli.backend,
        register_interval_secs: cli.register_interval,
    };
    tracing::info!(
        peer_id = %cfg.peer_id,
        registry = %cfg.registry_url,
        public_url = %cfg.public_url,
        backend = %cfg.backend_url,
        "Starting swarm node"
    );

    let client = RegistryClient::new(&cfg.registry_url);
    let state = server::NodeState::new(cfg.clone());

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Next-token API listening on {addr}");
    let app = server::create_router(state.clone());

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            server_shutdown.changed().await.ok();
        });
        if let Err(e) = serve.await {
            tracing::error!("Node API server error: {e}");
        }
    });

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let interval = std::time::Duration::from_secs(cfg.register_interval_secs);
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match announce::announce(&client, &state).await {
            Ok(count) => tracing::debug!(models = count, "Registered with registry"),
            Err(e) => tracing::warn!("Registration failed: {e:#}"),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.changed() => {}
        }
    }

    tracing::info!("Shutting down gracefully");
    announce::release_all(&client, &state).await;
    server.await.ok();
    tracing::info!("Node shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async { signal::ctrl_c().await.ok(); };
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
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
