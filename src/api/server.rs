//! HTTP API server for tracking, heatmaps, generation and optimization

use super::{error::ApiError, state::AppState};
use crate::analytics::SiteStats;
use crate::error::{HeatforgeError, Result};
use crate::optimizer::{OptimizationOutcome, OptimizationState};
use crate::services::SiteView;
use crate::types::{HeatmapPoint, InteractionEvent, Site};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

/// Client-side capture script
pub const TRACKER_SCRIPT: &str = include_str!("../../assets/heatmap-tracker.js");

/// Build router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Capture
        .route("/heatmap-tracker.js", get(tracker_handler))
        .route("/track-interaction", post(track_interaction_handler))
        // Heatmaps and stats
        .route("/get-heatmap-data/:site_id", get(heatmap_handler))
        .route("/reset-heatmap-data/:site_id", post(reset_heatmap_handler))
        .route("/website-stats/:site_id", get(stats_handler))
        // Generation and serving
        .route("/enhance-prompt", post(enhance_prompt_handler))
        .route("/generate-website", post(generate_website_handler))
        .route("/website/:site_id", get(website_handler))
        .route("/preview/:site_id", get(preview_handler))
        // Optimization
        .route("/optimize/:site_id", post(optimize_handler))
        .route("/optimization-status/:site_id", get(optimization_status_handler))
        // Health check
        .route("/health", get(health_handler))
        // State
        .with_state(state)
        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    addr: SocketAddr,
    state: AppState,
}

impl ApiServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }

    /// Start serving with dynamic port allocation
    ///
    /// Tries the configured address first, then the next ten ports if it is
    /// already in use.
    pub async fn serve(self) -> Result<()> {
        let router = build_router(self.state.clone());

        let base_port = self.addr.port();
        for offset in 0..=10u16 {
            let addr = SocketAddr::new(self.addr.ip(), base_port.saturating_add(offset));
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    info!(
                        "Heatforge API [{}] listening on http://{} (store: {})",
                        self.state.instance_id,
                        addr,
                        self.state.store.backend_name()
                    );
                    axum::serve(listener, router).await?;
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                    debug!("Port {} in use, trying next port", addr.port());
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(HeatforgeError::Other(format!(
            "All ports ({}-{}) are in use",
            base_port,
            base_port.saturating_add(10)
        )))
    }
}

/// Capture script handler
async fn tracker_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        TRACKER_SCRIPT,
    )
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

/// Interaction ingestion handler
///
/// A click that lands the site's counter on the optimization threshold
/// starts a background optimization; the response never waits for it.
async fn track_interaction_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<InteractionEvent>, JsonRejection>,
) -> std::result::Result<Json<SuccessResponse>, ApiError> {
    let Json(event) = payload.map_err(|e| {
        HeatforgeError::InvalidInteraction(format!("Malformed interaction: {}", e.body_text()))
    })?;

    let site_id = event.site_id.clone();
    let outcome = state.analytics.record_interaction(event).await?;

    if let Some(count) = outcome.click_count {
        if let Err(e) = state.optimizer.maybe_trigger_on_click(&site_id, count).await {
            warn!("Could not evaluate optimization trigger for {}: {}", site_id, e);
        }
    }

    Ok(Json(SuccessResponse { success: true }))
}

async fn heatmap_handler(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> std::result::Result<Json<Vec<HeatmapPoint>>, ApiError> {
    Ok(Json(state.analytics.heatmap(&site_id).await?))
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    success: bool,
    removed: usize,
}

async fn reset_heatmap_handler(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> std::result::Result<Json<ResetResponse>, ApiError> {
    let removed = state.analytics.reset(&site_id).await?;
    Ok(Json(ResetResponse {
        success: true,
        removed,
    }))
}

async fn stats_handler(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> std::result::Result<Json<SiteStats>, ApiError> {
    let config = state.optimizer.config();
    let stats = state
        .analytics
        .site_stats(&site_id, config.click_threshold, config.click_element_limit)
        .await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnhanceRequest {
    #[serde(default)]
    raw_prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnhanceResponse {
    enhanced_prompt: String,
}

async fn enhance_prompt_handler(
    State(state): State<AppState>,
    Json(req): Json<EnhanceRequest>,
) -> std::result::Result<Json<EnhanceResponse>, ApiError> {
    let enhanced_prompt = state.websites.enhance_prompt(&req.raw_prompt).await?;
    Ok(Json(EnhanceResponse { enhanced_prompt }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(default)]
    enhanced_prompt: String,
}

async fn generate_website_handler(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> std::result::Result<Json<Site>, ApiError> {
    Ok(Json(state.websites.generate_site(&req.enhanced_prompt).await?))
}

#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    #[serde(default)]
    original: bool,
}

async fn website_handler(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    Query(query): Query<ViewQuery>,
) -> std::result::Result<Json<SiteView>, ApiError> {
    Ok(Json(state.websites.view_site(&site_id, query.original).await?))
}

/// Preview document handler
///
/// Redirects to the newest optimized version unless `?original=true`.
async fn preview_handler(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    Query(query): Query<ViewQuery>,
) -> std::result::Result<Response, ApiError> {
    if !query.original {
        if let Some(latest) = state.websites.latest_version_id(&site_id).await? {
            debug!("Redirecting preview of {} to {}", site_id, latest);
            return Ok(Redirect::temporary(&format!("/preview/{}", latest)).into_response());
        }
    }

    let view = state.websites.view_site(&site_id, true).await?;
    Ok(Html(view.site.preview_document).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct OptimizeRequest {
    #[serde(default)]
    force: bool,
}

async fn optimize_handler(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    body: Option<Json<OptimizeRequest>>,
) -> std::result::Result<Json<OptimizationOutcome>, ApiError> {
    let force = body.map(|Json(req)| req.force).unwrap_or(false);
    Ok(Json(state.optimizer.optimize(&site_id, force).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    site_id: String,
    #[serde(flatten)]
    state: OptimizationState,
}

async fn optimization_status_handler(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> Json<StatusResponse> {
    let current = state.optimizer.status(&site_id).await;
    Json(StatusResponse {
        site_id,
        state: current,
    })
}

/// Health check handler
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    version: String,
    instance_id: String,
    backend: String,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        instance_id: state.instance_id.clone(),
        backend: state.store.backend_name().to_string(),
    })
}
