//! Structured-markup handling
//!
//! Provides the `MarkupQuery` capability used by protected-section analysis
//! (a parser-backed implementation and a scripted fake for tests), extraction
//! of labeled code blocks from generator output, and the standalone preview
//! document builder.

pub mod document;
pub mod extract;
pub mod html;
pub mod scripted;

pub use document::{build_preview_document, tracker_script_url};
pub use extract::{extract_code_blocks, GeneratedArtifacts};
pub use html::ScraperQuery;
pub use scripted::ScriptedQuery;

use crate::error::Result;

/// Selector queries against a markup string
///
/// Implementations return the serialized outer markup of every element the
/// CSS selector matches, in document order. An unparseable selector is an
/// error; a selector with no matches is an empty vector.
pub trait MarkupQuery: Send + Sync {
    fn select_outer(&self, markup: &str, selector: &str) -> Result<Vec<String>>;

    /// Number of elements the selector matches
    fn count(&self, markup: &str, selector: &str) -> Result<usize> {
        Ok(self.select_outer(markup, selector)?.len())
    }
}
