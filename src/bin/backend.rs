#![forbid(unsafe_code)]

//! HTTP entry point: loads configuration, wires the TMDB client and the
//! response cache into the router and serves until Ctrl+C.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use cinewrap::{
    config::{self, BackendConfig},
    server::{self, AppState},
    tmdb::TmdbClient,
};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "backend", about = "TMDB proxy and frontend server")]
struct Args {
    /// Env-style file with TMDB_API_KEY, PORT, CACHE_TTL_MS, ...
    #[arg(long, default_value = config::DEFAULT_ENV_FILE)]
    env_file: PathBuf,
    /// Overrides HOST.
    #[arg(long)]
    host: Option<String>,
    /// Overrides PORT.
    #[arg(long)]
    port: Option<u16>,
    /// Overrides CACHE_TTL_MS.
    #[arg(long)]
    cache_ttl_ms: Option<u64>,
    /// Overrides FRONTEND_ROOT.
    #[arg(long)]
    frontend_root: Option<PathBuf>,
    /// Only serve the API.
    #[arg(long)]
    no_frontend: bool,
}

impl Args {
    fn apply(self, mut config: BackendConfig) -> BackendConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ttl) = self.cache_ttl_ms {
            config.cache_ttl = Duration::from_millis(ttl);
        }
        if let Some(root) = self.frontend_root {
            config.frontend_root = root;
        }
        if self.no_frontend {
            config.serve_frontend = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let env_file = args.env_file.clone();
    let config = config::load_backend_config_from(&env_file, |key| std::env::var(key).ok())
        .with_context(|| format!("loading configuration from {}", env_file.display()))?;
    let config = args.apply(config);

    let client = TmdbClient::new(config.tmdb_api_key.clone(), config.tmdb_base_url.clone());
    if !client.has_credential() {
        tracing::warn!(
            "TMDB_API_KEY is not set; every TMDB-backed route will answer with HTTP 500"
        );
    }

    let mut state = AppState::new(Arc::new(client), config.cache_ttl);
    if config.serve_frontend {
        tracing::info!(root = %config.frontend_root.display(), "serving frontend bundle");
        state = state.with_frontend(config.frontend_root.clone());
    }
    let app = server::build_router(state);

    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("parsing HOST {}", config.host))?,
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!(
        ttl_ms = config.cache_ttl.as_millis() as u64,
        "backend listening on http://{}",
        addr
    );
    for route in server::ROUTES {
        tracing::info!("  GET {route}");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", err);
    }
}
