//! Scripted `MarkupQuery` for tests
//!
//! Each selector is registered with the fragments it "matches". A query
//! returns the registered fragments that appear verbatim in the markup, so
//! stripping a fragment from a document makes the selector stop matching.

use crate::error::{HeatforgeError, Result};
use crate::markup::MarkupQuery;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct ScriptedQuery {
    rules: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    fail_all: bool,
    calls: AtomicUsize,
}

impl ScriptedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fragment matched by `selector`
    pub fn with_match(mut self, selector: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.rules
            .entry(selector.into())
            .or_default()
            .push(fragment.into());
        self
    }

    /// Make every query for `selector` fail
    pub fn failing_on(mut self, selector: impl Into<String>) -> Self {
        self.failing.insert(selector.into());
        self
    }

    /// Make every query fail, as a broken parser would
    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Number of queries served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MarkupQuery for ScriptedQuery {
    fn select_outer(&self, markup: &str, selector: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_all || self.failing.contains(selector) {
            return Err(HeatforgeError::Markup(format!(
                "scripted failure for selector '{}'",
                selector
            )));
        }

        Ok(self
            .rules
            .get(selector)
            .map(|fragments| {
                fragments
                    .iter()
                    .filter(|f| markup.contains(f.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
