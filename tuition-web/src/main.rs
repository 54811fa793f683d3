//! tuition-web - Tuition payment ledger service
//!
//! Startup order: config, root folder, optional restore from the sync
//! remote, database, roster file, sync worker, HTTP server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tuition_common::auth::AdminCredentials;
use tuition_common::config::{resolve_root_folder, RootFolder, TomlConfig, ROOT_FOLDER_ENV};
use tuition_common::db::init_database;
use tuition_common::roster::RosterFile;
use tuition_common::sync::{self, GitBackend, RetryPolicy, SnapshotFile, SnapshotSource, SyncHandle};
use tuition_common::Ledger;
use tuition_web::{build_router, AppState};

/// Command-line arguments for tuition-web
#[derive(Parser, Debug)]
#[command(name = "tuition-web")]
#[command(about = "Tuition payment ledger service")]
#[command(version)]
struct Args {
    /// Root folder holding the database, roster and tuition.toml
    #[arg(short, long, env = "TUITION_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Configuration file (defaults to tuition.toml in the root folder)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "TUITION_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides the config file)
    #[arg(long)]
    bind: Option<String>,

    /// Admin password for basic authentication
    #[arg(long, env = "TUITION_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,

    /// Bearer token for the sync remote
    #[arg(long, env = "TUITION_SYNC_TOKEN", hide_env_values = true)]
    sync_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // An explicit --config may name the root folder; otherwise the file
    // lives inside the resolved root folder
    let explicit_config = match &args.config {
        Some(path) => Some(TomlConfig::load(path).context("Failed to load configuration")?),
        None => None,
    };
    let root = RootFolder::new(resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        explicit_config.as_ref().and_then(|c| c.root_folder.as_deref()),
    ));

    let config_path = args.config.clone().unwrap_or_else(|| root.config_path());
    let config_exists = config_path.exists();
    let mut config = match explicit_config {
        Some(config) => config,
        None if config_exists => {
            TomlConfig::load(&config_path).context("Failed to load configuration")?
        }
        None => TomlConfig::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "tuition_web={level},tuition_common={level},tower_http=info",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting tuition-web v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if config_exists {
        info!("Configuration: {}", config_path.display());
    } else {
        warn!(
            "Config file {} not found, using built-in defaults",
            config_path.display()
        );
    }

    if let Some(password) = args.admin_password {
        config.admin.password = Some(password);
    }
    if let Some(token) = args.sync_token {
        config.sync.token = Some(token);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    config.validate().context("Invalid configuration")?;

    root.ensure_exists().context("Failed to create root folder")?;
    info!("Root folder: {}", root.path().display());

    let db_path = root.database_path();
    let roster_path = root.roster_path();

    let backend = if config.sync.enabled {
        let backend = GitBackend::from_config(&config.sync, root.sync_work_dir())
            .context("Invalid sync configuration")?;
        info!("Sync enabled: {:?}", backend);

        // Restore before the database is created, otherwise a fresh empty
        // database would shadow the replicated one
        let targets = [
            SnapshotFile {
                name: tuition_common::config::DATABASE_FILE_NAME.to_string(),
                path: db_path.clone(),
            },
            SnapshotFile {
                name: tuition_common::config::ROSTER_FILE_NAME.to_string(),
                path: roster_path.clone(),
            },
        ];
        if let Err(e) = sync::restore_missing(&backend, &targets).await {
            warn!("Could not restore from sync remote, starting from local state: {}", e);
        }
        Some(Arc::new(backend))
    } else {
        info!("Sync disabled");
        None
    };

    let pool = init_database(&db_path, &config.ledger.default_settings())
        .await
        .context("Failed to initialize database")?;

    let roster = RosterFile::new(&roster_path);
    roster
        .ensure_exists()
        .await
        .context("Failed to create roster file")?;

    let (sync_handle, worker) = match backend {
        Some(backend) => {
            let source = SnapshotSource::new(
                pool.clone(),
                &db_path,
                &roster_path,
                root.sync_staging_dir(),
            );
            let (handle, worker) = sync::spawn(
                backend,
                source,
                RetryPolicy::from_config(&config.sync),
                config.sync.queue_capacity,
            );
            (handle, Some(worker))
        }
        None => (SyncHandle::disabled(), None),
    };

    let credentials = AdminCredentials::new(
        config.admin.username.clone(),
        config.admin.password.as_deref(),
    );
    if !credentials.is_usable() {
        warn!(
            "No usable admin password configured (empty or default_pass); every API request will be rejected. Set TUITION_ADMIN_PASSWORD."
        );
    }

    let ledger = Ledger::new(pool.clone(), roster, config.ledger.options());
    let app = build_router(AppState::new(ledger, credentials, sync_handle));

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("tuition-web listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(worker) = worker {
        worker.shutdown().await;
    }
    pool.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
