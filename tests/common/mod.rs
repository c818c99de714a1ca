//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use heatforge_core::{
    error::{HeatforgeError, Result},
    ConnectionMode, ContentGenerator, InteractionEvent, LibsqlStore, MemoryStore, Site, SiteStore,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Original page used across the optimization tests
pub const FIXTURE_MARKUP: &str = r#"<!DOCTYPE html><html><head><title>Bakery</title></head><body>
<nav class="navbar"><a href="/">Home</a><a href="/menu">Menu</a></nav>
<section class="hero"><h1>Fresh bread daily</h1><a class="cta" href="/order">Order now</a></section>
<div class="products"><p>Sourdough, rye and baguettes.</p></div>
<form class="contact-form"><input name="email"><button type="submit">Send</button></form>
<footer><p>123 Baker Street</p></footer>
</body></html>"#;

pub const FIXTURE_STYLE: &str = "body { font-family: sans-serif; }";

/// Generator response that keeps every protected region
pub fn intact_response() -> String {
    format!(
        "Here is the improved page.\n```html\n{}\n```\n```css\n.cta {{ font-size: 1.4rem; }}\n```\n```javascript\nconsole.log('v2');\n```",
        FIXTURE_MARKUP.replace("Order now", "Order fresh bread")
    )
}

/// Generator response that drops the navigation and footer
pub fn lossy_response() -> String {
    r#"```html
<!DOCTYPE html><html><head></head><body>
<section class="hero"><h1>Fresh bread daily</h1><a class="cta" href="/order">Order today</a></section>
<div class="products"><p>Now with pastries.</p></div>
<form class="contact-form"><input name="email"><button type="submit">Send</button></form>
</body></html>
```
```css
.cta { background: orange; }
```"#
        .to_string()
}

/// Content generator that replays queued responses and records prompts
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Always answer with `response`
    pub fn fixed(response: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Some(response.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer with each queued result once, then fail as unavailable
    pub fn queued(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            return next;
        }
        self.fallback
            .clone()
            .ok_or_else(|| HeatforgeError::GeneratorUnavailable("script exhausted".to_string()))
    }
}

/// Fixture root site
pub fn fixture_site(site_id: &str) -> Site {
    Site::new_root(
        site_id,
        FIXTURE_MARKUP,
        FIXTURE_STYLE,
        "",
        format!("<html><body>{}</body></html>", site_id),
        vec!["/placeholder-images/placeholder1.png".to_string()],
    )
}

/// In-memory store seeded with the fixture site
pub async fn seeded_memory_store(site_id: &str) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .put_site(&fixture_site(site_id))
        .await
        .expect("Failed to seed site");
    store
}

/// LibSQL store backed by a file in a fresh temp dir
///
/// The `TempDir` must be kept alive for as long as the store is used.
pub async fn create_test_libsql_store() -> (LibsqlStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("heatforge_test.db");
    let store = LibsqlStore::new(ConnectionMode::Local(path.to_string_lossy().to_string()))
        .await
        .expect("Failed to create test store");
    (store, dir)
}

/// Append `n` clicks at distinct coordinates on one button
pub async fn seed_distinct_clicks(store: &dyn SiteStore, site_id: &str, n: usize) {
    for i in 0..n {
        let event = InteractionEvent::click(site_id, (i as f64 + 0.5) / n as f64, 0.25)
            .with_target("section.hero > a.cta", "Order now")
            .with_session(format!("session-{}", i % 3));
        store
            .append_interaction(&event)
            .await
            .expect("Failed to append interaction");
    }
}
