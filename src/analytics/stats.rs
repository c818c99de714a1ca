//! Per-site engagement statistics

use crate::analytics::aggregator::aggregate_click_elements;
use crate::types::{ClickElement, EventKind, InteractionEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Engagement summary for one site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStats {
    pub site_id: String,
    pub unique_visitors: usize,
    pub total_clicks: usize,

    /// Mean time on page in seconds, from page-exit events
    pub average_time_on_page: f64,

    /// Mean scroll depth in percent, from scroll samples
    pub average_scroll_depth: f64,

    /// Epoch milliseconds of the most recent event
    pub last_activity: Option<i64>,

    pub click_elements: Vec<ClickElement>,
    pub optimization_status: OptimizationStatus,
}

/// Where a site stands relative to the optimization threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationStatus {
    pub click_count: u64,
    pub is_optimized: bool,
    pub optimized_versions: usize,

    /// Click count at which the next automatic optimization fires
    pub next_optimization_at: u64,

    pub latest_optimized_id: Option<String>,
}

impl OptimizationStatus {
    pub fn new(
        click_count: u64,
        threshold: u64,
        optimized_versions: usize,
        latest_optimized_id: Option<String>,
    ) -> Self {
        Self {
            click_count,
            is_optimized: optimized_versions > 0,
            optimized_versions,
            next_optimization_at: next_threshold(click_count, threshold),
            latest_optimized_id,
        }
    }
}

/// Smallest positive multiple of `threshold` that is `>= click_count`
pub fn next_threshold(click_count: u64, threshold: u64) -> u64 {
    let threshold = threshold.max(1);
    if click_count == 0 {
        return threshold;
    }
    click_count.div_ceil(threshold) * threshold
}

/// Compute statistics from a site's interaction log
pub fn compute_stats(
    site_id: &str,
    events: &[InteractionEvent],
    click_element_limit: usize,
    status: OptimizationStatus,
) -> SiteStats {
    let sessions: HashSet<&str> = events.iter().filter_map(|e| e.session_id.as_deref()).collect();

    let total_clicks = events.iter().filter(|e| e.is_click()).count();

    let time_samples: Vec<f64> = events
        .iter()
        .filter(|e| e.kind == EventKind::Pageexit)
        .filter_map(|e| e.time_spent_ms)
        .map(|ms| ms as f64 / 1000.0)
        .collect();

    let scroll_samples: Vec<f64> = events
        .iter()
        .filter(|e| e.kind == EventKind::Scroll)
        .filter_map(|e| e.scroll_percentage)
        .collect();

    SiteStats {
        site_id: site_id.to_string(),
        unique_visitors: sessions.len(),
        total_clicks,
        average_time_on_page: mean(&time_samples),
        average_scroll_depth: mean(&scroll_samples),
        last_activity: events.iter().map(|e| e.timestamp).max(),
        click_elements: aggregate_click_elements(events, click_element_limit),
        optimization_status: status,
    }
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_threshold() {
        assert_eq!(next_threshold(0, 50), 50);
        assert_eq!(next_threshold(1, 50), 50);
        assert_eq!(next_threshold(50, 50), 50);
        assert_eq!(next_threshold(51, 50), 100);
    }

    #[test]
    fn test_compute_stats() {
        let mut events = vec![
            InteractionEvent::click("S", 0.1, 0.1)
                .with_session("a")
                .with_target("button#go", "Go"),
            InteractionEvent::click("S", 0.2, 0.2).with_session("b"),
        ];

        let mut exit = InteractionEvent::new("S", EventKind::Pageexit).with_session("a");
        exit.time_spent_ms = Some(4000);
        exit.timestamp = 99;
        events.push(exit);

        let mut exit = InteractionEvent::new("S", EventKind::Pageexit).with_session("b");
        exit.time_spent_ms = Some(2000);
        exit.timestamp = 10;
        events.push(exit);

        let mut scroll = InteractionEvent::new("S", EventKind::Scroll);
        scroll.scroll_percentage = Some(80.0);
        scroll.timestamp = 5;
        events.push(scroll);

        for e in events.iter_mut().take(2) {
            e.timestamp = 1;
        }

        let stats = compute_stats("S", &events, 10, OptimizationStatus::new(2, 50, 0, None));
        assert_eq!(stats.unique_visitors, 2);
        assert_eq!(stats.total_clicks, 2);
        assert_eq!(stats.average_time_on_page, 3.0);
        assert_eq!(stats.average_scroll_depth, 80.0);
        assert_eq!(stats.last_activity, Some(99));
        assert_eq!(stats.click_elements.len(), 1);
        assert!(!stats.optimization_status.is_optimized);
        assert_eq!(stats.optimization_status.next_optimization_at, 50);
    }

    #[test]
    fn test_stats_for_empty_log() {
        let stats = compute_stats("S", &[], 10, OptimizationStatus::new(0, 50, 1, Some("x".into())));
        assert_eq!(stats.unique_visitors, 0);
        assert_eq!(stats.average_time_on_page, 0.0);
        assert_eq!(stats.last_activity, None);
        assert!(stats.optimization_status.is_optimized);
    }
}
