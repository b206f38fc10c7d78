use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use parcel_tally::{
    AppState, build_app,
    config::AppConfig,
    db::DbPool,
    events, observability,
    retention::{RetentionRunner, start_retention_worker},
    services::RepairService,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

const DEFAULT_CONFIG_PATH: &str = "parcel-tally.toml";

/// CLI arguments for the parcel-tally server
#[derive(Parser, Debug)]
#[command(version, about = "Delivery statistics backend", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./parcel-tally.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the HTTP server and retention worker (default)
    Serve,
    /// Run one retention pass and exit
    Cleanup {
        /// Count expired records without deleting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Set username := openid for every user missing one, then exit
    FixUsernames,
    /// Run database migrations and exit
    Migrate,
    /// Write a default configuration file
    Init {
        /// Path to create the config file (defaults to ./parcel-tally.toml)
        #[arg(short, long)]
        output: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Init { output, force }) => run_init(output, force),
        Some(Command::Cleanup { dry_run }) => run_cleanup(args.config.as_deref(), dry_run).await,
        Some(Command::FixUsernames) => run_fix_usernames(args.config.as_deref()).await,
        Some(Command::Migrate) => run_migrate(args.config.as_deref()).await,
        Some(Command::Serve) | None => run_server(args.config.as_deref()).await,
    }
}

fn run_init(output: Option<String>, force: bool) {
    let path = PathBuf::from(output.unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string()));

    if path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            path.display()
        );
        std::process::exit(1);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(&path, AppConfig::default_toml()) {
        eprintln!("Failed to write config to {}: {}", path.display(), e);
        std::process::exit(1);
    }

    println!("Created configuration at: {}", path.display());
}

/// Load the config and initialise logging. Exits the process on failure.
fn load_config(explicit_path: Option<&str>) -> AppConfig {
    let path = explicit_path.unwrap_or(DEFAULT_CONFIG_PATH);

    let config = if explicit_path.is_none() && !std::path::Path::new(path).exists() {
        AppConfig::default()
    } else {
        match AppConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {}", path, e);
                std::process::exit(1);
            }
        }
    };

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Failed to initialize tracing: {e}");
        std::process::exit(1);
    }

    config
}

async fn connect(config: &AppConfig) -> Arc<DbPool> {
    match DbPool::from_config(&config.database).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        }
    }
}

async fn run_migrate(config_path: Option<&str>) {
    let config = load_config(config_path);
    let db = connect(&config).await;

    if let Err(e) = db.run_migrations().await {
        tracing::error!(error = %e, "Migrations failed");
        std::process::exit(1);
    }
    tracing::info!("Migrations complete");
}

async fn run_cleanup(config_path: Option<&str>, dry_run: bool) {
    let mut config = load_config(config_path);
    config.retention.dry_run |= dry_run;
    let db = connect(&config).await;

    let runner = RetentionRunner::new(db.clone(), config.retention.clone());
    let result = runner.run_once().await;
    db.close().await;

    match result {
        Ok(report) => {
            for result in &report.results {
                println!(
                    "{}: deleted {} of {} ({} batches)",
                    result.collection, result.deleted, result.total, result.batches
                );
            }
            println!(
                "Cutoff {}; {} records removed in {} ms{}",
                report.cutoff,
                report.total_deleted(),
                report.execution_time_ms,
                if report.dry_run { " (dry run)" } else { "" }
            );
        }
        Err(e) => {
            eprintln!("Cleanup failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_fix_usernames(config_path: Option<&str>) {
    let config = load_config(config_path);
    let db = connect(&config).await;

    let result = RepairService::new(db.users()).repair_usernames().await;
    db.close().await;

    match result {
        Ok(report) => {
            for outcome in report.results.iter().filter(|r| !r.success) {
                eprintln!(
                    "{}: {}",
                    outcome.user_id,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
            println!("{}", report.message());
            if report.failure_count > 0 {
                std::process::exit(2);
            }
        }
        Err(e) => {
            eprintln!("Username repair failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_server(config_path: Option<&str>) {
    let config = load_config(config_path);

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics: {e}");
    }

    tracing::info!(
        config_file = config_path.unwrap_or(DEFAULT_CONFIG_PATH),
        version = env!("CARGO_PKG_VERSION"),
        "Starting parcel-tally"
    );

    let state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application state");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    state
        .task_tracker
        .spawn(events::log_events(state.event_bus.subscribe(), shutdown.clone()));
    if let Some(services) = &state.services {
        state
            .task_tracker
            .spawn(start_retention_worker(services.retention.clone(), shutdown.clone()));
    }

    let task_tracker = state.task_tracker.clone();
    let db = state.db.clone();
    let app = build_app(&config, state);

    let bind_addr = config.server.socket_addr();
    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on http://{}", bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(task_tracker, shutdown))
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    if let Some(db) = db {
        db.close().await;
    }
}

async fn shutdown_signal(task_tracker: TaskTracker, shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received, waiting for background tasks to complete...");

    shutdown.cancel();
    task_tracker.close();

    let wait_result =
        tokio::time::timeout(std::time::Duration::from_secs(30), task_tracker.wait()).await;

    match wait_result {
        Ok(()) => tracing::info!("All background tasks completed"),
        Err(_) => {
            tracing::warn!("Timeout waiting for background tasks, some may not have completed")
        }
    }

    tracing::info!("Shutdown complete");
}
