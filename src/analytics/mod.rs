//! Interaction ingestion and aggregation
//!
//! Provides:
//! - Validation and persistence of captured interaction events
//! - Heatmap (coordinate → count) and click-element (DOM path → count) signals
//! - Per-site engagement statistics

pub mod aggregator;
pub mod stats;

pub use aggregator::{aggregate_click_elements, aggregate_heatmap, DEFAULT_CLICK_ELEMENT_LIMIT};
pub use stats::{compute_stats, next_threshold, OptimizationStatus, SiteStats};

use crate::error::{HeatforgeError, Result};
use crate::storage::SiteStore;
use crate::types::{ClickElement, HeatmapPoint, InteractionEvent, MAX_ELEMENT_TEXT_CHARS};
use std::sync::Arc;
use tracing::debug;

/// Result of ingesting one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    /// New click counter of the site, for click events on known sites
    pub click_count: Option<u64>,
}

/// Validate and normalize an incoming event
///
/// Click events must carry finite coordinates so that every stored click is
/// represented in the heatmap. Element text is truncated to 100 characters.
pub fn normalize_event(mut event: InteractionEvent) -> Result<InteractionEvent> {
    event.site_id = event.site_id.trim().to_string();
    if event.site_id.is_empty() {
        return Err(HeatforgeError::InvalidInteraction(
            "siteId is required".to_string(),
        ));
    }

    if event.is_click() {
        match (event.x, event.y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {}
            _ => {
                return Err(HeatforgeError::InvalidInteraction(
                    "click events require finite x and y coordinates".to_string(),
                ))
            }
        }
    }

    if let Some(text) = event.element_text.take() {
        let text = text.trim();
        if !text.is_empty() {
            event.element_text = Some(text.chars().take(MAX_ELEMENT_TEXT_CHARS).collect());
        }
    }

    if event.dom_path.as_deref().is_some_and(|p| p.trim().is_empty()) {
        event.dom_path = None;
    }

    if let Some(pct) = event.scroll_percentage {
        event.scroll_percentage = Some(pct.clamp(0.0, 100.0));
    }

    Ok(event)
}

/// Ingestion and aggregation over a site store
#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn SiteStore>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn SiteStore>) -> Self {
        Self { store }
    }

    /// Validate, append, and count an interaction event
    pub async fn record_interaction(&self, event: InteractionEvent) -> Result<IngestOutcome> {
        let event = normalize_event(event)?;
        self.store.append_interaction(&event).await?;

        let click_count = if event.is_click() {
            self.store.increment_clicks(&event.site_id).await?
        } else {
            None
        };

        debug!(
            "Recorded {} for site {} (click_count: {:?})",
            event.kind, event.site_id, click_count
        );
        Ok(IngestOutcome { click_count })
    }

    pub async fn heatmap(&self, site_id: &str) -> Result<Vec<HeatmapPoint>> {
        let events = self.store.list_interactions(site_id).await?;
        Ok(aggregate_heatmap(&events))
    }

    pub async fn click_elements(&self, site_id: &str, limit: usize) -> Result<Vec<ClickElement>> {
        let events = self.store.list_interactions(site_id).await?;
        Ok(aggregate_click_elements(&events, limit))
    }

    /// Engagement statistics plus optimization status
    pub async fn site_stats(
        &self,
        site_id: &str,
        threshold: u64,
        click_element_limit: usize,
    ) -> Result<SiteStats> {
        let events = self.store.list_interactions(site_id).await?;
        let site = self.store.get_site(site_id).await?;
        let root_id = site
            .as_ref()
            .map(|s| s.root_id().to_string())
            .unwrap_or_else(|| site_id.to_string());

        let versions = self.store.count_derived(&root_id).await?;
        let latest = self.store.find_latest_derived(&root_id).await?;
        let status = OptimizationStatus::new(
            site.map(|s| s.click_count).unwrap_or(0),
            threshold,
            versions,
            latest.map(|s| s.site_id),
        );

        Ok(compute_stats(site_id, &events, click_element_limit, status))
    }

    /// Delete the interaction history of a site
    pub async fn reset(&self, site_id: &str) -> Result<usize> {
        let removed = self.store.delete_interactions(site_id).await?;
        debug!("Reset {} interactions for site {}", removed, site_id);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::{EventKind, Site};

    #[test]
    fn test_normalize_rejects_click_without_coordinates() {
        let event = InteractionEvent::new("S", EventKind::Click);
        assert!(matches!(
            normalize_event(event),
            Err(HeatforgeError::InvalidInteraction(_))
        ));

        let event = InteractionEvent::click("S", f64::NAN, 0.5);
        assert!(normalize_event(event).is_err());

        let event = InteractionEvent::click("  ", 0.5, 0.5);
        assert!(normalize_event(event).is_err());
    }

    #[test]
    fn test_normalize_truncates_text() {
        let long = "x".repeat(250);
        let event = InteractionEvent::click("S", 0.5, 0.5).with_target("p", long);
        let event = normalize_event(event).unwrap();
        assert_eq!(event.element_text.unwrap().chars().count(), MAX_ELEMENT_TEXT_CHARS);
    }

    #[test]
    fn test_normalize_accepts_non_click_without_coordinates() {
        let event = InteractionEvent::new("S", EventKind::Pageload);
        assert!(normalize_event(event).is_ok());
    }

    #[tokio::test]
    async fn test_record_interaction_counts_clicks() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_site(&Site::new_root("S", "<p></p>", "", "", "", vec![]))
            .await
            .unwrap();
        let analytics = AnalyticsService::new(store.clone());

        let outcome = analytics
            .record_interaction(InteractionEvent::click("S", 0.5, 0.5))
            .await
            .unwrap();
        assert_eq!(outcome.click_count, Some(1));

        let outcome = analytics
            .record_interaction(InteractionEvent::new("S", EventKind::Scroll))
            .await
            .unwrap();
        assert_eq!(outcome.click_count, None);

        // Unknown sites still get their events stored
        let outcome = analytics
            .record_interaction(InteractionEvent::click("ghost", 0.1, 0.1))
            .await
            .unwrap();
        assert_eq!(outcome.click_count, None);
        assert_eq!(analytics.heatmap("ghost").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_removes_history() {
        let store = Arc::new(MemoryStore::new());
        let analytics = AnalyticsService::new(store);
        for _ in 0..3 {
            analytics
                .record_interaction(InteractionEvent::click("S", 0.5, 0.5))
                .await
                .unwrap();
        }
        assert_eq!(analytics.reset("S").await.unwrap(), 3);
        assert!(analytics.heatmap("S").await.unwrap().is_empty());
    }
}
