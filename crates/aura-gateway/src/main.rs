use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use aura_core::config::{AuraConfig, StoreBackend};
use aura_penalty::{PenaltySweep, PenaltyWeights};
use aura_scheduler::{Schedule, SchedulerEngine};
use aura_store::{HistoryLog, KvStore, MemoryHistory, MemoryStore, SqliteHistory, SqliteStore};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::{info, warn};

mod app;
mod auth;
mod error;
mod http;
mod job;

#[derive(Parser, Debug)]
#[command(author, version, about = "Aura penalty engine and operator API")]
struct Cli {
    /// Path to aura.toml (falls back to AURA_CONFIG, then ~/.aura/aura.toml).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API and the background scheduler (default).
    Serve,
    /// Run one penalty sweep and print the report as JSON.
    Sweep {
        /// Date to evaluate against (YYYY-MM-DD). Defaults to today in UTC.
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aura_gateway=info,aura_penalty=info,aura_scheduler=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > AURA_CONFIG env > ~/.aura/aura.toml
    let config_path = cli.config.or_else(|| std::env::var("AURA_CONFIG").ok());
    let config = AuraConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        AuraConfig::default()
    });

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");
    let db = Connection::open(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    drop(db);

    let (store, history) = open_store(&config, &db_path).await?;
    let sweep = PenaltySweep::new(store.clone(), PenaltyWeights::from(config.penalty))
        .with_history(history.clone());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Sweep { today } => run_sweep_once(&config, &db_path, sweep, today).await,
        Command::Serve => serve(config, &db_path, store, history, sweep).await,
    }
}

async fn serve(
    config: AuraConfig,
    db_path: &str,
    store: Arc<dyn KvStore>,
    history: Arc<dyn HistoryLog>,
    sweep: PenaltySweep,
) -> anyhow::Result<()> {
    let scheduler = Arc::new(SchedulerEngine::new(Connection::open(db_path)?)?);
    scheduler.register(
        job::SWEEP_JOB_ID,
        job::SWEEP_JOB_NAME,
        Schedule::from(&config.scheduler.sweep),
        Arc::new(job::SweepJob::new(sweep)),
    )?;
    let engine_task = if config.scheduler.enabled {
        Some(scheduler.start())
    } else {
        info!("scheduler disabled; jobs run only on manual trigger");
        None
    };

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port)
        .parse()
        .context("invalid gateway bind address")?;
    if config.gateway.operator_token.is_none() {
        warn!("no operator_token configured; /jobs and /players endpoints are unauthenticated");
    }

    let state = Arc::new(app::AppState::new(config, store, history, scheduler));
    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Aura gateway listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = engine_task {
        task.stop().await;
    }
    info!("Aura gateway stopped");
    Ok(())
}

/// Run one sweep under the same run lease a serving gateway takes, so the
/// two never overlap on one database.
async fn run_sweep_once(
    config: &AuraConfig,
    db_path: &str,
    sweep: PenaltySweep,
    today: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let scheduler = SchedulerEngine::new(Connection::open(db_path)?)?;
    let mut job = job::SweepJob::new(sweep);
    if let Some(today) = today {
        job = job.on_date(today);
    }
    let outcome = scheduler
        .run_once(
            job::SWEEP_JOB_ID,
            job::SWEEP_JOB_NAME,
            &Schedule::from(&config.scheduler.sweep),
            Arc::new(job),
        )
        .await
        .context("penalty sweep not started")?;

    if !outcome.success {
        anyhow::bail!(
            "penalty sweep failed: {}",
            outcome.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    let report = outcome.output.unwrap_or_default();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Build the document store and the history log for the configured backend.
async fn open_store(
    config: &AuraConfig,
    db_path: &str,
) -> anyhow::Result<(Arc<dyn KvStore>, Arc<dyn HistoryLog>)> {
    let store: Arc<dyn KvStore> = match config.store.backend {
        StoreBackend::Memory => {
            warn!("memory store selected; players, items and history are lost on exit");
            return Ok((Arc::new(MemoryStore::new()), Arc::new(MemoryHistory::new())));
        }
        StoreBackend::Sqlite => Arc::new(SqliteStore::new(Connection::open(db_path)?)?),
        StoreBackend::Redis => open_redis(config).await?,
    };
    // History is relational and always lives in SQLite next to the jobs table.
    let history: Arc<dyn HistoryLog> = Arc::new(SqliteHistory::new(Connection::open(db_path)?)?);
    info!(backend = ?config.store.backend, "store ready");
    Ok((store, history))
}

#[cfg(feature = "redis")]
async fn open_redis(config: &AuraConfig) -> anyhow::Result<Arc<dyn KvStore>> {
    let url = config
        .store
        .redis_url
        .as_deref()
        .context("store.backend = \"redis\" needs store.redis_url")?;
    let store = aura_store::RedisStore::connect(url).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn open_redis(_config: &AuraConfig) -> anyhow::Result<Arc<dyn KvStore>> {
    anyhow::bail!("store.backend = \"redis\" requires building aura-gateway with --features redis")
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
