//! `embed-server` — daemon binary wiring together the cache, worker pool,
//! facade, client registry, auto-shutdown controller and HTTP surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use embed_cache::Cache;
use embed_core::config::ServerConfig;
use embed_facade::Facade;
use embed_observability::ObservabilityEngine;
use embed_pool::Pool;
use embed_registry::{AutoShutdownController, ClientRegistry};
use embed_server::{build_router, AppState};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Centralized code embedding service", long_about = None)]
struct Args {
    /// Path to a TOML config file. Missing fields take their default.
    #[clap(long)]
    config: Option<PathBuf>,

    /// HTTP port, overriding config/`EMBED_PORT`.
    #[clap(short, long)]
    port: Option<u16>,

    /// Directory the on-disk cache shard lives under, overriding
    /// config/`EMBED_CACHE_DIR`.
    #[clap(long)]
    cache_dir: Option<PathBuf>,
}

fn load_config(args: &Args) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            ServerConfig::from_toml_str(&raw)?
        }
        None => ServerConfig::default(),
    }
    .apply_env_overrides();

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    Ok(config)
}

fn default_cache_dir() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    home.join(".cache").join("embed-service")
}

fn cache_shard_path(config: &ServerConfig) -> PathBuf {
    let dir = config.cache_dir.clone().unwrap_or_else(default_cache_dir);
    dir.join(format!("{}.cache", config.model_id))
}

/// Clients that crash without calling `/deregister-client` would otherwise
/// sit in the registry forever, keeping the auto-shutdown controller in
/// `Active`. Reap anyone idle for twice the configured idle timeout on a
/// slow tick, independent of the shutdown controller's own polling.
fn spawn_stale_reaper(registry: Arc<ClientRegistry>, idle_timeout: Duration) {
    let threshold = chrono::Duration::from_std(idle_timeout * 2).unwrap_or(chrono::Duration::hours(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(embed_server::handlers::reap_interval());
        interval.tick().await;
        loop {
            interval.tick().await;
            let reaped = registry.reap_stale(threshold);
            if reaped > 0 {
                info!(reaped, "reaped stale clients");
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    embed_observability::tracing_setup::init_tracing();

    let args = Args::parse();
    let config = Arc::new(load_config(&args)?);
    info!(port = config.port, max_workers = config.max_workers, "starting embedding service");

    let shard_path = cache_shard_path(&config);
    if let Some(parent) = shard_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating cache directory {}", parent.display()))?;
    }
    let cache = Cache::open(&shard_path, config.cache_capacity, config.dim, &config.model_id)
        .context("opening embedding cache")?;

    let pool = Pool::start(config.clone());
    let facade = Arc::new(Facade::new(cache, pool, config.clone()));

    let registry = Arc::new(ClientRegistry::new());
    let shutdown = AutoShutdownController::new(
        Duration::from_millis(config.no_clients_timeout_ms),
        Duration::from_millis(config.idle_timeout_ms),
    );
    shutdown.clone().spawn(registry.clone(), Duration::from_secs(5));
    spawn_stale_reaper(registry.clone(), Duration::from_millis(config.idle_timeout_ms));

    let observability = Arc::new(Mutex::new(ObservabilityEngine::new()));

    let state = AppState {
        facade: facade.clone(),
        registry: registry.clone(),
        shutdown: shutdown.clone(),
        observability,
        started_at: Instant::now(),
    };

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port).parse::<std::net::SocketAddr>()?;
    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    let mut drain_rx = shutdown.subscribe_drain();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = drain_rx.changed().await;
                info!("auto-shutdown controller requested drain, refusing new connections");
            })
            .await
            .expect("HTTP server failed");
    });
    server.await.context("HTTP server task panicked")?;

    match Arc::try_unwrap(facade) {
        Ok(facade) => facade.shutdown(Duration::from_secs(10)).await,
        Err(_) => {
            tracing::warn!("facade still has outstanding references at shutdown, skipping final persist")
        }
    }

    Ok(())
}
