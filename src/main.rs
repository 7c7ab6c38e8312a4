//! Shellbox Server — short-lived remote-shell box provisioner
//!
//! Main entry point that wires all crates together and runs the
//! provisioning services and the background worker.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use shellbox_core::config::AppConfig;
use shellbox_core::error::AppError;
use shellbox_core::traits::{SchedulerClient, TaskQueue};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("SHELLBOX_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        "Starting Shellbox v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );

    // ── Step 1: Database connection + migrations ─────────────────
    let db = shellbox_database::connection::DatabasePool::connect(&config.database).await?;
    shellbox_database::migration::run_migrations(db.pool()).await?;

    // ── Step 2: Task queue ───────────────────────────────────────
    let worker_id = format!("worker-{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let task_repo = Arc::new(shellbox_database::repositories::TaskRepository::new(
        db.pool().clone(),
    ));
    let queue = Arc::new(shellbox_worker::DbTaskQueue::new(
        Arc::clone(&task_repo),
        worker_id.clone(),
    ));

    // ── Step 3: Scheduler client + launcher ──────────────────────
    let discovery = Arc::new(shellbox_nomad::DnsDiscovery::new(
        config.cluster.scheduler_port,
    ));
    let scheduler_client: Arc<dyn SchedulerClient> = Arc::new(shellbox_nomad::NomadClient::new(
        discovery,
        config.cluster.clone(),
    ));
    let launcher = Arc::new(shellbox_nomad::BoxLauncher::new(
        Arc::clone(&scheduler_client),
        config.cluster.clone(),
        config.is_production(),
    ));

    // ── Step 4: Provisioning services ────────────────────────────
    let store: Arc<dyn shellbox_database::store::ProvisionStore> = Arc::new(
        shellbox_database::store::PgProvisionStore::new(db.pool().clone()),
    );
    let allocator = Arc::new(shellbox_service::SlotAllocator::new(Arc::clone(&store)));
    let box_service = Arc::new(shellbox_service::BoxService::new(
        Arc::clone(&store),
        Arc::clone(&queue) as Arc<dyn TaskQueue>,
        Arc::clone(&launcher),
        Arc::clone(&allocator),
    ));

    tracing::info!("Provisioning services initialized");

    // ── Step 5: Background worker ────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker_handle = if config.worker.enabled {
        let mut executor = shellbox_worker::TaskExecutor::new();
        executor.register(Arc::new(shellbox_worker::jobs::CleanupTaskHandler::new(
            Arc::clone(&launcher),
            Arc::clone(&queue) as Arc<dyn TaskQueue>,
            config.cluster.cleanup_retry_hours,
        )));
        executor.register(Arc::new(shellbox_worker::jobs::ExpiryTaskHandler::new(
            Arc::clone(&store),
            Arc::clone(&box_service),
        )));
        executor.register(Arc::new(shellbox_worker::jobs::ReconcileTaskHandler::new(
            Arc::clone(&scheduler_client),
            Arc::clone(&store),
            Arc::clone(&queue) as Arc<dyn TaskQueue>,
            config.cluster.job_name.clone(),
        )));

        let runner = shellbox_worker::WorkerRunner::new(
            Arc::clone(&queue),
            Arc::new(executor),
            config.worker.clone(),
            worker_id,
        );

        let worker_cancel = shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            runner.run(worker_cancel).await;
        });

        tracing::info!("Background worker started");
        Some(handle)
    } else {
        tracing::info!("Background worker disabled");
        None
    };

    // ── Step 6: Cron scheduler ───────────────────────────────────
    let mut cron =
        shellbox_worker::CronScheduler::new(Arc::clone(&queue) as Arc<dyn TaskQueue>).await?;
    cron.register_default_tasks().await?;
    cron.start().await?;

    tracing::info!("Shellbox is running");

    // ── Step 7: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping background work...");
    let _ = shutdown_tx.send(true);

    cron.shutdown().await?;
    if let Some(handle) = worker_handle {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(30), handle).await;
    }
    db.close().await;

    tracing::info!("Shellbox shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
