//! Extraction of labeled code blocks from generator output

use crate::error::{HeatforgeError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HTML_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```html\b[^\n]*\n?(.*?)```").expect("valid regex")
});

static CSS_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```css\b[^\n]*\n?(.*?)```").expect("valid regex")
});

static SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```(?:javascript|js)\b[^\n]*\n?(.*?)```").expect("valid regex")
});

/// Markup, style and script produced by one generator call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifacts {
    pub markup: String,
    pub style: String,
    pub script: String,
}

fn first_block(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Pull the first html, css and javascript fenced blocks out of `text`
///
/// The markup block is required; style and script default to empty.
pub fn extract_code_blocks(text: &str) -> Result<GeneratedArtifacts> {
    let markup = first_block(&HTML_BLOCK, text)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| {
            HeatforgeError::Extraction(
                "Generator response did not contain an html code block".to_string(),
            )
        })?;

    Ok(GeneratedArtifacts {
        markup,
        style: first_block(&CSS_BLOCK, text).unwrap_or_default(),
        script: first_block(&SCRIPT_BLOCK, text).unwrap_or_default(),
    })
}
