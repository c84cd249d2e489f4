//! examprep-import - RBAC bulk import service
//!
//! `serve` (default) runs the HTTP import endpoint; `apply <FILE>` imports a
//! payload file straight into the configured database and prints the report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use examprep_common::config::{
    config_path_is_explicit, load_toml_config, resolve_config_path, ConfigOverrides,
    ServiceConfig,
};
use examprep_common::db::init_database;
use examprep_import::importer::{ImportOptions, Importer};
use examprep_import::store::{RowStore, SqliteRowStore};
use examprep_import::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};

/// Command-line arguments for examprep-import
#[derive(Parser, Debug)]
#[command(name = "examprep-import")]
#[command(about = "Bulk RBAC data import service for the exam-prep platform")]
#[command(version)]
struct Args {
    /// TOML config file (defaults to EXAMPREP_CONFIG, then the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, global = true, env = "EXAMPREP_DATABASE")]
    database: Option<PathBuf>,

    /// HTTP bind address
    #[arg(short, long, global = true, env = "EXAMPREP_BIND")]
    bind: Option<String>,

    /// Service key required by the import endpoint
    #[arg(long, global = true, env = "EXAMPREP_SERVICE_KEY", hide_env_values = true)]
    service_key: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP import service
    Serve,
    /// Import a payload file and print the report as JSON
    Apply {
        /// JSON file shaped like `{ "data": { "tables": { ... } } }`
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts because it carries the log level
    let config_path = resolve_config_path(args.config.as_deref());
    let required = config_path_is_explicit(args.config.as_deref());
    let toml = load_toml_config(config_path.as_deref(), required)?;
    let config = ServiceConfig::resolve(
        toml,
        ConfigOverrides {
            database_path: args.database,
            bind: args.bind,
            service_key: args.service_key,
        },
    )?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "Starting examprep-import v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        Some(path) => warn!("Config file not found at {}, using defaults", path.display()),
        None => warn!("No config directory available, using defaults"),
    }
    info!("Database path: {}", config.database_path.display());

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open database")?;
    let store: Arc<dyn RowStore> = Arc::new(SqliteRowStore::new(pool));
    let options = ImportOptions {
        row_concurrency: config.row_concurrency,
        unknown_tables: config.unknown_tables,
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store, options).await,
        Command::Apply { file } => apply(&file, store, options).await,
    }
}

async fn serve(
    config: ServiceConfig,
    store: Arc<dyn RowStore>,
    options: ImportOptions,
) -> Result<()> {
    if config.service_key.is_some() {
        info!("Service key authentication enabled");
    } else {
        warn!("No service key configured - import endpoint is unauthenticated");
    }

    let state = AppState::new(store, options)
        .with_service_key(config.service_key)
        .with_max_body_bytes(config.max_body_bytes);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("examprep-import listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn apply(file: &Path, store: Arc<dyn RowStore>, options: ImportOptions) -> Result<()> {
    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let importer = Importer::new(store, options);
    let payload = importer
        .parse(&body)
        .with_context(|| format!("Rejected {}", file.display()))?;
    info!(
        "Applying {} rows from {}",
        payload.row_count(),
        file.display()
    );

    let report = importer.run(&payload).await.context("Import failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.results.is_empty() {
        warn!("{} has no rows for any known table", file.display());
    }

    if report.total_errors() > 0 {
        warn!("{} rows failed to import", report.total_errors());
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
