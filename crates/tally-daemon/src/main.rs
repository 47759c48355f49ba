//! tally-daemon entry point.
//!
//! Loads settings, builds the store and reconcile engine, primes the local
//! counter with one reconcile attempt, then serves HTTP. Route handlers live
//! in `routes.rs`; shared state and background tasks live in `state.rs`.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::Method;
use clap::Parser;
use tally_config::{Backend, Settings};
use tally_daemon::{routes, state};
use tally_reconcile::{CounterBoundary, LocalCounter, ReconcileEngine};
use tally_store::{CounterStore, FileStore, MemoryStore, PostgresStore};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "tally-daemon", about = "Distributed click counter node")]
struct Args {
    /// YAML config layer; repeat to merge several (later wins).
    #[arg(long = "config", value_name = "PATH")]
    config: Vec<PathBuf>,

    /// Listen address; overrides config and TALLY_ADDR.
    #[arg(long)]
    addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let args = Args::parse();
    let paths: Vec<&str> = args
        .config
        .iter()
        .map(|p| p.to_str().context("config path is not valid UTF-8"))
        .collect::<anyhow::Result<_>>()?;
    let loaded = tally_config::load(&paths, |k| std::env::var(k).ok())?;
    let mut settings = loaded.settings;
    if let Some(addr) = args.addr {
        settings.server.addr = addr;
    }
    info!(
        config_hash = %loaded.config_hash,
        layers = paths.len(),
        backend = %settings.store.backend,
        key = %settings.reconcile.key,
        interval_ms = settings.reconcile.interval.as_millis() as u64,
        "configuration loaded"
    );

    let store = build_store(&settings).await?;
    let counter = Arc::new(LocalCounter::new());
    let boundary = CounterBoundary::new(Arc::clone(&counter), settings.limits.max_increment);
    let shared = Arc::new(state::AppState::new(
        boundary,
        settings.reconcile.key.clone(),
        store.backend_name(),
    ));

    let mut engine = ReconcileEngine::new(store, settings.reconcile.key.clone(), counter);
    let primed = state::run_tick(&shared, &mut engine).await;
    if primed.is_published() {
        info!(total = engine.watermark(), "primed local counter from shared record");
    } else {
        warn!(outcome = primed.label(), "priming attempt failed; starting from 0");
    }

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_reconcile_loop(Arc::clone(&shared), engine, settings.reconcile.interval);

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_any_origin());

    let addr = settings.server.addr;
    info!(node_id = %shared.node_id, "tally-daemon listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn CounterStore>> {
    let store: Arc<dyn CounterStore> = match settings.store.backend {
        Backend::Memory => Arc::new(MemoryStore::new()),
        Backend::File => Arc::new(FileStore::new(&settings.store.file_path)),
        Backend::Postgres => {
            let url = settings
                .store
                .database_url
                .as_deref()
                .context("postgres backend selected without a database URL")?;
            let pool = tally_store::connect(url)?;
            // An unreachable database must not keep the node from serving;
            // reads fail as Unavailable until it comes back.
            if let Err(e) = tally_store::migrate(&pool).await {
                warn!(error = %format!("{e:#}"), "migrations not applied");
            }
            Arc::new(PostgresStore::new(pool))
        }
    };
    Ok(store)
}

/// Any origin may read and bump the counter.
fn cors_any_origin() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
