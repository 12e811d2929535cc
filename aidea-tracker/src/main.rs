//! aidea-tracker - Activity tracking service
//!
//! Accepts free-text work activity descriptions, categorizes them against
//! rules held in Weaviate, and exports them to Jira/Tempo on request.

use std::path::PathBuf;
use std::sync::Arc;

use aidea_common::config::{ensure_directory_exists, locate_config_file};
use aidea_tracker::config::{CliOverrides, TrackerConfig, CONFIG_FILE_NAME};
use aidea_tracker::service::{ActivityService, Collaborators, ServiceSettings};
use aidea_tracker::store::ActivityLog;
use aidea_tracker::upstream::{HttpTempoPoster, OllamaClient, WeaviateClient};
use aidea_tracker::{build_router, AppState};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for aidea-tracker
#[derive(Parser, Debug)]
#[command(name = "aidea-tracker")]
#[command(about = "Work activity tracker with automatic categorization")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "TRACKER_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long)]
    bind: Option<String>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding the daily activity files
    #[arg(short, long, env = "AIDEA_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aidea_tracker=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting aidea-tracker v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config_path = locate_config_file(args.config.as_deref(), "AIDEA_CONFIG", CONFIG_FILE_NAME);
    let config = TrackerConfig::load(
        config_path.as_deref(),
        CliOverrides {
            port: args.port,
            bind: args.bind,
            data_dir: args.data_dir,
        },
    )
    .context("Failed to load configuration")?;

    ensure_directory_exists(&config.data_dir).context("Failed to prepare data folder")?;
    info!("Data folder: {}", config.data_dir.display());

    let weaviate = Arc::new(
        WeaviateClient::new(config.weaviate.clone(), config.upstream_timeout)
            .context("Failed to create Weaviate client")?,
    );
    let ollama = OllamaClient::new(config.ollama.clone(), config.upstream_timeout)
        .context("Failed to create Ollama client")?;
    let tempo = HttpTempoPoster::new(config.tempo_endpoint.clone(), config.upstream_timeout)
        .context("Failed to create Tempo client")?;
    if config.tempo_endpoint.is_none() {
        warn!("JIRA_TEMPO_ENDPOINT not set, exports will fail until configured");
    }

    let collaborators = Collaborators {
        search: weaviate.clone(),
        rules: weaviate.clone(),
        generator: Arc::new(ollama),
        tempo: Arc::new(tempo),
    };
    let settings = ServiceSettings {
        accepted_grades: config.accepted_grades.clone(),
        search_limit: config.search_limit,
        projects: config.projects.clone(),
    };
    let store = Arc::new(ActivityLog::new(&config.data_dir, config.file_prefix.clone()));
    let service = ActivityService::new(store, collaborators, settings);

    info!("Checking for rule collection '{}'", weaviate.class());
    match service.ensure_rule_collection().await {
        Ok(true) => info!("Rule collection created"),
        Ok(false) => {}
        Err(e) => warn!("Rule collection check failed, continuing: {}", e),
    }

    let app = build_router(AppState::new(service));

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("aidea-tracker listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
