//! Generation request for a heatmap-driven rewrite

use crate::types::{ClickElement, HeatmapPoint, ProtectedSection, Site};
use std::fmt::Write;

/// Everything the generator needs to rewrite one site
#[derive(Debug, Clone)]
pub struct OptimizationRequest<'a> {
    pub site: &'a Site,
    pub click_elements: &'a [ClickElement],
    pub heatmap: &'a [HeatmapPoint],
    pub sections: &'a [ProtectedSection],

    /// Maximum number of heatmap points listed
    pub heatmap_limit: usize,
}

impl OptimizationRequest<'_> {
    /// Render the request as a generator prompt
    pub fn render(&self) -> String {
        let mut prompt = String::with_capacity(
            self.site.markup.len() + self.site.style.len() + self.site.script.len() + 2048,
        );

        prompt.push_str(
            "Optimize this website's UI based on observed user interaction data.\n\n\
             Current website code:\n\n",
        );
        let _ = write!(
            prompt,
            "HTML:\n```html\n{}\n```\n\nCSS:\n```css\n{}\n```\n\nJavaScript:\n```javascript\n{}\n```\n\n",
            self.site.markup, self.site.style, self.site.script
        );

        prompt.push_str("Most clicked elements (most to least clicked):\n");
        if self.click_elements.is_empty() {
            prompt.push_str("No element-specific click data available.\n");
        }
        for element in self.click_elements {
            match element.sample_text.as_deref() {
                Some(text) => {
                    let _ = writeln!(
                        prompt,
                        "- {} (Text: \"{}\"): {} clicks",
                        element.dom_path, text, element.count
                    );
                }
                None => {
                    let _ = writeln!(prompt, "- {}: {} clicks", element.dom_path, element.count);
                }
            }
        }

        prompt.push_str(
            "\nHeatmap data (viewport-normalized coordinates, 0..1, with click counts):\n",
        );
        if self.heatmap.is_empty() {
            prompt.push_str("No heatmap data available.\n");
        }
        for point in self.heatmap.iter().take(self.heatmap_limit) {
            let _ = writeln!(
                prompt,
                "- ({:.4}, {:.4}): {} clicks",
                point.x, point.y, point.count
            );
        }
        if self.heatmap.len() > self.heatmap_limit {
            let _ = writeln!(
                prompt,
                "- ... {} more points with fewer clicks",
                self.heatmap.len() - self.heatmap_limit
            );
        }

        if !self.sections.is_empty() {
            prompt.push_str(
                "\nProtected sections. These must remain in the markup, keep the same selector, \
                 and must not move:\n",
            );
            for section in self.sections {
                let _ = writeln!(
                    prompt,
                    "- {} (selector `{}`): {}. Must not move.",
                    section.name, section.selector_used, section.description
                );
            }
        }

        prompt.push_str(
            "\nGuidelines:\n\
             1. Make the most frequently clicked elements more prominent (larger, better positioned, more visible)\n\
             2. Demote or simplify elements that receive little engagement\n\
             3. Adjust layouts to prioritize high-interaction areas\n\
             4. Preserve all functionality and keep every image from the original design\n\
             5. Keep the layout responsive on all screen sizes\n\n\
             Return only the optimized HTML, CSS, and JavaScript code as separate code blocks \
             with appropriate language identifiers.\n",
        );

        prompt
    }
}
