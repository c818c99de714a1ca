//! Heatforge - heatmap-driven website generation and optimization
//!
//! Entry point for the HTTP service and the maintenance commands that operate
//! directly on the site store.

use anyhow::Context;
use clap::{Parser, Subcommand};
use heatforge_core::{
    api::{ApiServer, AppState},
    config::AppConfig,
    markup::tracker_script_url,
    AnalyticsService, ConnectionMode, ContentGenerator, LibsqlStore, LlmService, MemoryStore,
    Optimizer, ScraperQuery, SiteStore, UnavailableGenerator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(name = "heatforge")]
#[command(about = "AI website generator with heatmap-driven optimization", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set log level
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "HEATFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Database path (overrides the configured storage.database_path)
    #[arg(long, global = true)]
    db_path: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Listen address (overrides server.addr)
        #[arg(long)]
        addr: Option<String>,

        /// Keep all data in memory
        #[arg(long)]
        in_memory: bool,
    },

    /// Optimize a site from its collected heatmap
    Optimize {
        /// Site to optimize
        site_id: String,

        /// Bypass the minimum-data and cooldown checks
        #[arg(long)]
        force: bool,
    },

    /// Print a site's aggregated heatmap as JSON
    Heatmap {
        /// Site to inspect
        site_id: String,
    },

    /// Print a site's engagement statistics as JSON
    Stats {
        /// Site to inspect
        site_id: String,
    },

    /// Create the database and run migrations
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Use the requested level for heatforge, but WARN for noisy dependencies
    let filter = EnvFilter::new(format!(
        "heatforge={},heatforge_core={},tower_http=warn,libsql=warn",
        level.as_str().to_lowercase(),
        level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("Heatforge v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = cli.db_path.clone() {
        config.storage.database_path = path;
    }

    match cli.command {
        Commands::Serve { addr, in_memory } => {
            if let Some(addr) = addr {
                config.server.addr = addr;
            }
            if in_memory {
                config.storage.in_memory = true;
            }
            let addr = config.server.socket_addr()?;

            let store = open_store(&config).await;
            let state = AppState::new(
                store,
                build_generator(&config),
                Arc::new(ScraperQuery::new()),
                &config,
            );

            ApiServer::new(addr, state).serve().await?;
            Ok(())
        }
        Commands::Optimize { site_id, force } => {
            let store = open_persistent_store(&config.storage.database_path).await?;
            let optimizer = Optimizer::new(
                store,
                build_generator(&config),
                Arc::new(ScraperQuery::new()),
                config.optimizer.clone(),
                tracker_script_url(&config.server.public_base_url),
            );

            let outcome = optimizer.optimize(&site_id, force).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Commands::Heatmap { site_id } => {
            let store = open_persistent_store(&config.storage.database_path).await?;
            let points = AnalyticsService::new(store).heatmap(&site_id).await?;
            println!("{}", serde_json::to_string_pretty(&points)?);
            Ok(())
        }
        Commands::Stats { site_id } => {
            let store = open_persistent_store(&config.storage.database_path).await?;
            let stats = AnalyticsService::new(store)
                .site_stats(
                    &site_id,
                    config.optimizer.click_threshold,
                    config.optimizer.click_element_limit,
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Commands::Init => {
            let db_path = &config.storage.database_path;
            debug!("Initializing database at {}", db_path);

            // Opening the store creates the file and runs migrations
            let _store = LibsqlStore::new(ConnectionMode::Local(db_path.clone())).await?;

            println!("✓ Database initialized: {}", db_path);
            Ok(())
        }
    }
}

/// Open the store for the HTTP server
///
/// A database that cannot be opened degrades to the in-memory store so the
/// service still starts; nothing recorded in that mode survives a restart.
async fn open_store(config: &AppConfig) -> Arc<dyn SiteStore> {
    if config.storage.in_memory {
        info!("Using in-memory store");
        return Arc::new(MemoryStore::new());
    }

    match open_persistent_store(&config.storage.database_path).await {
        Ok(store) => store,
        Err(e) => {
            warn!(
                "Could not open database at {} ({:#}); falling back to in-memory store",
                config.storage.database_path, e
            );
            Arc::new(MemoryStore::new())
        }
    }
}

async fn open_persistent_store(db_path: &str) -> anyhow::Result<Arc<dyn SiteStore>> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let store = LibsqlStore::new(ConnectionMode::Local(db_path.to_string())).await?;
    Ok(Arc::new(store))
}

/// Build the content generator, degrading to one that always reports unavailable
fn build_generator(config: &AppConfig) -> Arc<dyn ContentGenerator> {
    match LlmService::new(config.generator.clone()) {
        Ok(service) => {
            info!("Content generator ready (model: {})", service.model());
            Arc::new(service)
        }
        Err(e) => {
            warn!("Content generator unavailable: {}", e);
            Arc::new(UnavailableGenerator::new(e.to_string()))
        }
    }
}
