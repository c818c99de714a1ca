//! HTTP API for interaction capture, heatmaps and optimization
//!
//! Provides:
//! - Interaction ingestion and the capture script
//! - Heatmap, reset and statistics endpoints
//! - Website generation, viewing and preview
//! - Optimization trigger and status

pub mod error;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{build_router, ApiServer, TRACKER_SCRIPT};
pub use state::AppState;
