//! Heatforge - Heatmap-Driven Website Generation and Optimization
//!
//! Generates single-page websites with an LLM, captures visitor interactions
//! through an embedded script, and feeds the resulting click heatmaps back to
//! the model to produce optimized derivatives of each site.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//! - **Types**: Core data structures (Site, InteractionEvent, HeatmapPoint, etc.)
//! - **Storage**: Site and interaction stores (LibSQL, in-memory)
//! - **Analytics**: Heatmap aggregation, click elements, engagement statistics
//! - **Markup / Protection**: HTML queries, protected-section detection and repair
//! - **Services**: LLM integration and website generation
//! - **Optimizer**: The optimization state machine and orchestrator
//! - **API**: axum HTTP surface and the capture script
//!
//! # Example
//!
//! ```ignore
//! use heatforge_core::{AppConfig, MemoryStore, Optimizer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load(None)?;
//!     let store = Arc::new(MemoryStore::new());
//!     let generator = Arc::new(LlmService::new(config.generator.clone())?);
//!     let optimizer = Optimizer::new(
//!         store,
//!         generator,
//!         Arc::new(ScraperQuery::new()),
//!         config.optimizer.clone(),
//!         tracker_script_url(&config.server.public_base_url),
//!     );
//!
//!     let outcome = optimizer.optimize("site-1", false).await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod markup;
pub mod optimizer;
pub mod protection;
pub mod services;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use analytics::{AnalyticsService, SiteStats};
pub use config::AppConfig;
pub use error::{HeatforgeError, Result};
pub use markup::{MarkupQuery, ScraperQuery};
pub use optimizer::{OptimizationOutcome, OptimizationState, Optimizer};
pub use services::{ContentGenerator, LlmService, UnavailableGenerator, WebsiteService};
pub use storage::{ConnectionMode, LibsqlStore, MemoryStore, SiteStore};
pub use types::{
    ClickElement, EventKind, HeatmapPoint, InteractionEvent, ProtectedSection, SectionKind, Site,
};
