//! Heatmap and click-element aggregation
//!
//! Pure functions over an interaction log. Grouping is exact-match only (no
//! spatial binning) and output order is fully determined by the input order,
//! so aggregating the same log twice yields identical results.

use crate::types::{ClickElement, HeatmapPoint, InteractionEvent};
use std::collections::HashMap;

/// Default number of ranked click elements kept
pub const DEFAULT_CLICK_ELEMENT_LIMIT: usize = 10;

/// Group click events by exact `(x, y)` and count them
///
/// Points are ordered by count descending; ties keep first-seen order.
pub fn aggregate_heatmap(events: &[InteractionEvent]) -> Vec<HeatmapPoint> {
    let mut index: HashMap<(u64, u64), usize> = HashMap::new();
    let mut points: Vec<HeatmapPoint> = Vec::new();

    for event in events.iter().filter(|e| e.is_click()) {
        let (Some(x), Some(y)) = (event.x, event.y) else {
            continue;
        };
        // Bit patterns give exact-match grouping; +0.0 and -0.0 are folded
        let key = ((x + 0.0).to_bits(), (y + 0.0).to_bits());
        match index.get(&key) {
            Some(&i) => points[i].count += 1,
            None => {
                index.insert(key, points.len());
                points.push(HeatmapPoint { x, y, count: 1 });
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts
    points.sort_by(|a, b| b.count.cmp(&a.count));
    points
}

/// Group click events by DOM path, rank by count and keep the top `limit`
///
/// The sample text of each group is the element text of its first event.
pub fn aggregate_click_elements(events: &[InteractionEvent], limit: usize) -> Vec<ClickElement> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut elements: Vec<ClickElement> = Vec::new();

    for event in events.iter().filter(|e| e.is_click()) {
        let Some(path) = event.dom_path.as_deref() else {
            continue;
        };
        match index.get(path) {
            Some(&i) => elements[i].count += 1,
            None => {
                index.insert(path, elements.len());
                elements.push(ClickElement {
                    dom_path: path.to_string(),
                    count: 1,
                    sample_text: event.element_text.clone(),
                });
            }
        }
    }

    elements.sort_by(|a, b| b.count.cmp(&a.count));
    elements.truncate(limit);
    elements
}
