//! Parser-backed markup queries using `scraper`

use crate::error::{HeatforgeError, Result};
use crate::markup::MarkupQuery;
use scraper::{Html, Selector};

/// `MarkupQuery` over an html5ever parse of the markup
///
/// Fragments are parsed as full documents, so body-level regions of a bare
/// fragment resolve the same way they do inside a complete page.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScraperQuery;

impl ScraperQuery {
    pub fn new() -> Self {
        Self
    }
}

impl MarkupQuery for ScraperQuery {
    fn select_outer(&self, markup: &str, selector: &str) -> Result<Vec<String>> {
        let parsed = Selector::parse(selector).map_err(|e| {
            HeatforgeError::Markup(format!("Invalid selector '{}': {:?}", selector, e))
        })?;

        let document = Html::parse_document(markup);
        Ok(document.select(&parsed).map(|el| el.html()).collect())
    }
}
