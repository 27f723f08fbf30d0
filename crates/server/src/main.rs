mod api;
mod metrics;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aqueduct_core::{
    create_audit_system, load_config, validate_config, AuditEvent, AuditStore, ChangeNotifier,
    DatasetLocation, ExecutionStore, FsObjectStore, HttpTrainingRuntime, JobRunner, JobStore,
    ObjectStore, PipelineOrchestrator, SqliteAuditStore, SqliteExecutionStore, SqliteJobStore,
    TrainingRuntime,
};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("AQUEDUCT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Store root: {:?}", config.store.root);
    info!("Database path: {:?}", config.database.path);

    // Compute config hash for audit
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    // Create the object store
    let store = Arc::new(
        FsObjectStore::new(config.store.root.clone())
            .await
            .context("Failed to create object store")?,
    );
    info!("Object store initialized");

    // Create SQLite-backed stores
    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    let job_store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    let execution_store: Arc<dyn ExecutionStore> = Arc::new(
        SqliteExecutionStore::new(&config.database.path)
            .context("Failed to create execution store")?,
    );
    info!("Stores initialized");

    // Create audit system
    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);

    // Spawn audit writer task
    let writer_handle = tokio::spawn(audit_writer.run());

    // Emit ServiceStarted event
    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;

    // Create the job runner
    let runner = Arc::new(
        JobRunner::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&job_store),
            config.transform.clone(),
        )
        .with_audit(audit_handle.clone()),
    );
    info!("Job runner initialized");

    // Create training runtime client if configured
    let runtime: Option<Arc<dyn TrainingRuntime>> = match &config.runtime {
        Some(runtime_config) => {
            info!("Initializing training runtime client at {}", runtime_config.url);
            match HttpTrainingRuntime::new(runtime_config.clone()) {
                Ok(runtime) => Some(Arc::new(runtime)),
                Err(e) => {
                    error!("Failed to initialize training runtime client: {}", e);
                    None
                }
            }
        }
        None => {
            info!("No training runtime configured");
            None
        }
    };

    // Create the orchestrator whenever a runtime is available; the signal
    // loop only runs when enabled, manual starts work either way.
    let orchestrator = runtime.as_ref().map(|rt| {
        Arc::new(
            PipelineOrchestrator::new(
                config.orchestrator.clone(),
                Arc::clone(&execution_store),
                Arc::clone(rt),
                DatasetLocation::new(store.root().display().to_string()),
            )
            .with_audit(audit_handle.clone()),
        )
    });

    // Wire the change notifier to the orchestrator when enabled
    let notifier = if config.orchestrator.enabled {
        match &orchestrator {
            Some(orch) => {
                info!("Initializing pipeline orchestrator");
                orch.start().await;

                let notifier = ChangeNotifier::new(store.subscribe(), orch.signal_sender())
                    .with_audit(audit_handle.clone());
                notifier.start().await;
                info!("Change notifier started");
                Some(notifier)
            }
            None => {
                error!("Orchestrator enabled but no training runtime available");
                None
            }
        }
    } else {
        info!("Orchestrator disabled in config");
        None
    };

    // Create app state
    let app_state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&store),
        job_store,
        execution_store,
        audit_handle.clone(),
        audit_store,
        runner,
        orchestrator.clone(),
    ));

    // Create router
    let app = create_router(app_state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop notifier and orchestrator if running
    if let Some(ref notifier) = notifier {
        notifier.stop().await;
        info!("Change notifier stopped");
    }
    if config.orchestrator.enabled {
        if let Some(ref orch) = orchestrator {
            orch.stop().await;
            info!("Orchestrator stopped");
        }
    }

    // Emit ServiceStopped event
    info!("Server shutting down...");
    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // Drop all holders of AuditHandle so the writer's channel closes.
    // Order matters: we emit the final event BEFORE dropping handles.
    drop(orchestrator);
    drop(notifier);
    drop(audit_handle);

    // Wait for writer to finish processing remaining events
    let _ = writer_handle.await;
    info!("Audit writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
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
